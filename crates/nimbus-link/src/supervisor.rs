// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection supervision.
//!
//! The [`LinkSupervisor`] owns the life of the platform session: it runs the
//! provisioning exchange when only bootstrap credentials are held, connects
//! with unbounded exponential backoff, and watches the link afterwards. A
//! link observed disconnected for a configured number of consecutive checks
//! is torn down and rebuilt from scratch, including a fresh credential
//! exchange.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use nimbus_core::backoff::{ExponentialBackoff, RetryConfig, RetryStrategy};
use nimbus_core::error::{LinkError, LinkResult};
use nimbus_core::types::LinkCredentials;

use crate::link::{CloudLink, CredentialSink, SharedCredentials};
use crate::provision::{ProvisionState, Provisioner};

// ===========================================================================
// Configuration
// ===========================================================================

/// Configuration for the link supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Interval between link health checks.
    #[serde(default = "default_check_interval")]
    #[serde(with = "duration_secs")]
    pub check_interval: Duration,

    /// Consecutive disconnected checks before the link is rebuilt.
    #[serde(default = "default_disconnect_threshold")]
    pub disconnect_threshold: u32,

    /// Interval between credential requests during provisioning.
    #[serde(default = "default_request_interval")]
    #[serde(with = "duration_secs")]
    pub request_interval: Duration,

    /// Retry policy for the connect sequence.
    #[serde(default = "RetryConfig::connect")]
    pub connect: RetryConfig,
}

fn default_check_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_disconnect_threshold() -> u32 {
    3
}

fn default_request_interval() -> Duration {
    Duration::from_secs(10)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            disconnect_threshold: default_disconnect_threshold(),
            request_interval: default_request_interval(),
            connect: RetryConfig::connect(),
        }
    }
}

impl SupervisorConfig {
    /// Configuration for testing (short intervals, bounded retries).
    pub fn for_testing() -> Self {
        Self {
            check_interval: Duration::from_millis(20),
            disconnect_threshold: 2,
            request_interval: Duration::from_millis(50),
            connect: RetryConfig::connect()
                .with_max_attempts(3)
                .with_initial_delay(Duration::from_millis(1))
                .with_jitter(0.0),
        }
    }
}

// ===========================================================================
// Session Handler
// ===========================================================================

/// Hook run after every successful (re)connect, before polling resumes.
///
/// The runtime uses this to resubscribe, resolve durable operation markers
/// and republish the device inventory.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Prepares a freshly established session.
    async fn on_established(&self) -> LinkResult<()>;
}

/// Handler that does nothing.
#[derive(Debug, Default)]
pub struct NoopSessionHandler;

#[async_trait]
impl SessionHandler for NoopSessionHandler {
    async fn on_established(&self) -> LinkResult<()> {
        Ok(())
    }
}

// ===========================================================================
// Metrics
// ===========================================================================

#[derive(Debug, Default)]
struct SupervisorMetricsInner {
    provision_runs: AtomicU64,
    rebuilds: AtomicU64,
}

/// Snapshot of supervisor activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorMetrics {
    /// Completed provisioning exchanges.
    pub provision_runs: u64,
    /// Link teardowns triggered by the disconnect threshold.
    pub rebuilds: u64,
    /// Current provisioning state.
    pub state: String,
}

// ===========================================================================
// Supervisor
// ===========================================================================

/// Keeps the platform session provisioned and connected.
pub struct LinkSupervisor<L>
where
    L: CloudLink + 'static,
{
    link: Arc<L>,
    provisioner: Provisioner,
    credentials: SharedCredentials,
    sink: Arc<dyn CredentialSink>,
    handler: Arc<dyn SessionHandler>,
    config: SupervisorConfig,
    state: RwLock<ProvisionState>,
    metrics: SupervisorMetricsInner,
}

impl<L> LinkSupervisor<L>
where
    L: CloudLink + 'static,
{
    /// Creates a supervisor over the given link.
    pub fn new(
        link: Arc<L>,
        provisioner: Provisioner,
        credentials: SharedCredentials,
        sink: Arc<dyn CredentialSink>,
        handler: Arc<dyn SessionHandler>,
        config: SupervisorConfig,
    ) -> Self {
        let state = ProvisionState::for_credentials(&credentials.read());
        Self {
            link,
            provisioner,
            credentials,
            sink,
            handler,
            config,
            state: RwLock::new(state),
            metrics: SupervisorMetricsInner::default(),
        }
    }

    /// Current provisioning state.
    pub fn state(&self) -> ProvisionState {
        *self.state.read()
    }

    /// Snapshot of supervisor activity.
    pub fn metrics(&self) -> SupervisorMetrics {
        SupervisorMetrics {
            provision_runs: self.metrics.provision_runs.load(Ordering::Relaxed),
            rebuilds: self.metrics.rebuilds.load(Ordering::Relaxed),
            state: self.state().as_str().to_string(),
        }
    }

    /// Runs the credential exchange if only bootstrap credentials are held.
    pub async fn ensure_provisioned(&self, cancel: &Notify) -> LinkResult<()> {
        if !self.credentials.read().is_placeholder() {
            *self.state.write() = ProvisionState::Provisioned;
            return Ok(());
        }

        *self.state.write() = ProvisionState::Provisioning;
        let obtained = self.provisioner.obtain(cancel).await?;

        *self.credentials.write() = obtained.clone();
        self.sink.persist(&obtained).await?;
        self.metrics.provision_runs.fetch_add(1, Ordering::Relaxed);
        *self.state.write() = ProvisionState::Provisioned;
        Ok(())
    }

    /// Provisions if needed, connects with backoff, and prepares the session.
    pub async fn establish(&self, cancel: &Notify) -> LinkResult<()> {
        self.ensure_provisioned(cancel).await?;
        self.connect_with_backoff(cancel).await?;

        // A failed announce leaves the session up; the next health check or
        // rebuild repeats it.
        if let Err(e) = self.handler.on_established().await {
            warn!(error = %e, "Session preparation failed");
        }
        Ok(())
    }

    async fn connect_with_backoff(&self, cancel: &Notify) -> LinkResult<()> {
        let strategy = ExponentialBackoff::new(self.config.connect.clone());
        let link = self.link.clone();

        tokio::select! {
            result = strategy.execute(|| {
                let link = link.clone();
                async move { link.connect().await }
            }) => result,
            _ = cancel.notified() => Err(LinkError::Cancelled),
        }
    }

    /// Watches the link, rebuilding it after repeated disconnected checks.
    pub fn start(self: Arc<Self>, cancel: Arc<Notify>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.check_interval);
            let mut down_checks = 0u32;

            info!(
                check_interval_s = self.config.check_interval.as_secs(),
                disconnect_threshold = self.config.disconnect_threshold,
                "Link supervisor started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if self.link.is_connected() {
                            down_checks = 0;
                            continue;
                        }

                        down_checks += 1;
                        warn!(
                            consecutive = down_checks,
                            threshold = self.config.disconnect_threshold,
                            "Link observed disconnected"
                        );
                        if down_checks < self.config.disconnect_threshold {
                            continue;
                        }

                        self.metrics.rebuilds.fetch_add(1, Ordering::Relaxed);
                        info!("Rebuilding link after repeated disconnection");
                        let _ = self.link.disconnect().await;
                        *self.credentials.write() = LinkCredentials::placeholder();
                        *self.state.write() = ProvisionState::Unprovisioned;

                        match self.establish(&cancel).await {
                            Ok(()) => {
                                down_checks = 0;
                                info!("Link rebuilt");
                            }
                            Err(LinkError::Cancelled) => break,
                            Err(e) => warn!(error = %e, "Link rebuild failed"),
                        }
                    }
                    _ = cancel.notified() => break,
                }
            }

            debug!("Link supervisor stopped");
        })
    }
}

impl<L> std::fmt::Debug for LinkSupervisor<L>
where
    L: CloudLink + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSupervisor")
            .field("state", &self.state())
            .field("connected", &self.link.is_connected())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
