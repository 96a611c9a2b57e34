// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway runtime orchestration.
//!
//! This module provides the core runtime that orchestrates all NIMBUS
//! components:
//!
//! - Configuration loading and validation
//! - Credential storage and the cloud link supervisor
//! - Platform command dispatch and the data relay
//! - Graceful shutdown coordination

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use nimbus_aggregate::AggregationPolicy;
use nimbus_codec::render;
use nimbus_config::{
    ConfigLoader, CredentialStore, FileSettings, GatewayIdentity, InventoryConfig, NimbusConfig,
};
use nimbus_core::error::{LinkError, LinkResult, NimbusError};
use nimbus_core::operation::OperationKind;
use nimbus_core::types::LinkCredentials;
use nimbus_link::{
    shared_credentials, CloudLink, CredentialSink, InboundEnvelope, LinkSupervisor, MqttLink,
    Provisioner, SessionHandler, Topics,
};
use nimbus_relay::{
    keys, CommandDispatcher, DataRelay, DeviceControl, FirmwareSource, HttpFirmwareSource,
    MarkerStore, MemoryProbe, ProcMeminfo, RelayConfig, SettingsStore, TagStore,
};

use crate::adapters::{GatewayControl, StandaloneSource, StandaloneTags};
use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// GatewayRuntime
// =============================================================================

/// The main gateway runtime that orchestrates all components.
///
/// The runtime is responsible for:
/// - Loading and validating configuration
/// - Initializing all components in the correct order
/// - Starting background tasks
/// - Coordinating graceful shutdown
pub struct GatewayRuntime {
    config: Arc<NimbusConfig>,
    shutdown: ShutdownCoordinator,
}

impl GatewayRuntime {
    /// Creates a new gateway runtime.
    pub fn new(config: NimbusConfig) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Runs the gateway until shutdown is signaled.
    pub async fn run(self) -> BinResult<()> {
        info!("Starting NIMBUS Gateway v{}", nimbus_core::VERSION);

        // Initialize components
        let components = self.initialize_components().await?;

        // Log startup
        self.log_startup();

        // Run the main loop
        let result = self.run_main_loop(components).await;

        info!("NIMBUS Gateway shutdown complete");

        result
    }

    /// Initializes all gateway components.
    async fn initialize_components(&self) -> BinResult<GatewayComponents> {
        info!("Initializing gateway components...");

        let paths = &self.config.paths;

        // 1. Durable state under the state directory
        std::fs::create_dir_all(&paths.state_dir).map_err(|e| {
            BinError::Initialization(format!(
                "Failed to create state directory {}: {}",
                paths.state_dir.display(),
                e
            ))
        })?;

        let markers = MarkerStore::new(paths.marker_dir());
        let credential_store = CredentialStore::new(&paths.credentials_file);
        let initial = match credential_store.load()? {
            Some(credentials) => {
                info!(login = %credentials.login(), "Loaded stored credentials");
                credentials
            }
            None => LinkCredentials::placeholder(),
        };
        let credentials = shared_credentials(initial);

        // 2. Platform-adjustable settings, seeded from the static configuration
        let settings = Arc::new(FileSettings::open(paths.settings_file())?);
        settings.seed(
            keys::INTERVAL,
            self.config.relay.interval.as_secs().to_string(),
        );
        settings.seed(keys::POLICY, self.config.relay.policy.clone());
        settings.seed(
            keys::WINDOW,
            self.config.relay.window.as_secs().to_string(),
        );

        let relay_config = self.effective_relay_config(&settings);
        let measurements = Arc::new(AtomicBool::new(settings.measurements_enabled()));

        // 3. Cloud link and provisioning
        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.cloud.mqtt.channel_capacity);
        let link = Arc::new(MqttLink::new(
            self.config.cloud.mqtt.clone(),
            credentials.clone(),
            inbound_tx,
        ));
        let provisioner = Provisioner::new(
            self.config.cloud.mqtt.clone(),
            self.config.cloud.bootstrap.clone(),
            self.config.cloud.topics.clone(),
            self.config.supervisor.request_interval,
        );

        // 4. Data relay over the standalone adapters
        let probe: Arc<dyn MemoryProbe> = Arc::new(ProcMeminfo::new());
        let relay = Arc::new(
            DataRelay::new(
                Arc::new(StandaloneSource),
                link.clone(),
                probe,
                self.config.cloud.topics.clone(),
                measurements.clone(),
                self.config.gateway.id.clone(),
                relay_config,
            )
            .map_err(NimbusError::from)?,
        );

        // 5. Command dispatcher
        let tags: Arc<dyn TagStore> = Arc::new(StandaloneTags);
        let control: Arc<dyn DeviceControl> = Arc::new(GatewayControl::new(
            self.shutdown.clone(),
            paths.firmware_dir(),
        ));
        let firmware: Arc<dyn FirmwareSource> =
            Arc::new(HttpFirmwareSource::new(self.config.cloud.firmware_timeout));
        let settings_store: Arc<dyn SettingsStore> = settings.clone();

        let dispatcher = Arc::new(CommandDispatcher::new(
            link.clone(),
            tags,
            control,
            settings_store,
            firmware,
            markers,
            credentials.clone(),
            self.config.gateway.id.clone(),
            measurements,
        ));

        // 6. Link supervisor with the session announce handler
        let handler: Arc<dyn SessionHandler> = Arc::new(GatewaySession {
            link: link.clone(),
            topics: self.config.cloud.topics.clone(),
            identity: self.config.gateway.clone(),
            inventory: self.config.inventory.clone(),
            settings,
            dispatcher: dispatcher.clone(),
        });
        let sink: Arc<dyn CredentialSink> = Arc::new(credential_store);
        let supervisor = Arc::new(LinkSupervisor::new(
            link.clone(),
            provisioner,
            credentials,
            sink,
            handler,
            self.config.supervisor.clone(),
        ));

        Ok(GatewayComponents {
            link,
            supervisor,
            relay,
            dispatcher,
            inbound_rx,
        })
    }

    /// Applies platform-written settings on top of the configured relay values.
    fn effective_relay_config(&self, settings: &FileSettings) -> RelayConfig {
        let mut relay = self.config.relay.clone();

        if let Some(value) = settings.get(keys::INTERVAL) {
            match value.parse::<u64>() {
                Ok(secs) if secs > 0 => relay.interval = Duration::from_secs(secs),
                _ => warn!(value = %value, "Ignoring invalid stored interval"),
            }
        }
        if let Some(value) = settings.get(keys::WINDOW) {
            match value.parse::<u64>() {
                Ok(secs) if secs > 0 => relay.window = Duration::from_secs(secs),
                _ => warn!(value = %value, "Ignoring invalid stored window"),
            }
        }
        if let Some(value) = settings.get(keys::POLICY) {
            if AggregationPolicy::from_value(&value).is_ok() {
                relay.policy = value;
            } else {
                warn!(value = %value, "Ignoring invalid stored policy");
            }
        }

        relay
    }

    /// Logs the effective startup profile.
    fn log_startup(&self) {
        info!(
            gateway = %self.config.gateway.id,
            broker = %format!("{}:{}", self.config.cloud.mqtt.host, self.config.cloud.mqtt.port),
            interval_s = self.config.relay.interval.as_secs(),
            state_dir = %self.config.paths.state_dir.display(),
            "Gateway configuration loaded"
        );
    }

    /// Runs the main event loop.
    async fn run_main_loop(&self, components: GatewayComponents) -> BinResult<()> {
        let GatewayComponents {
            link,
            supervisor,
            relay,
            dispatcher,
            inbound_rx,
        } = components;

        let dispatch_cancel = Arc::new(Notify::new());
        let relay_cancel = Arc::new(Notify::new());
        let supervisor_cancel = Arc::new(Notify::new());

        // Fans the process-level shutdown signal out to the component tokens.
        // notify_one stores a permit, so a component that is mid-cycle still
        // observes the stop on its next wait.
        let bridge = {
            let shutdown = self.shutdown.clone();
            let dispatch_cancel = dispatch_cancel.clone();
            let relay_cancel = relay_cancel.clone();
            let supervisor_cancel = supervisor_cancel.clone();
            tokio::spawn(async move {
                shutdown.wait_for_shutdown().await;
                supervisor_cancel.notify_one();
                relay_cancel.notify_one();
                dispatch_cancel.notify_one();
            })
        };

        let mut handles: Vec<(&str, JoinHandle<()>)> = vec![(
            "dispatcher",
            dispatcher.start(inbound_rx, dispatch_cancel.clone()),
        )];

        // First session. Provisioning waits inside on a fresh gateway, so
        // this can take a while; cancellation from the bridge reaches it.
        match supervisor.establish(&supervisor_cancel).await {
            Ok(()) => {}
            Err(LinkError::Cancelled) => info!("Shutdown requested during startup"),
            Err(e) => warn!(
                error = %e,
                "Initial session establishment failed, the supervisor will keep retrying"
            ),
        }

        if !self.shutdown.is_shutdown_initiated() {
            handles.push(("relay", relay.start(relay_cancel.clone())));
            handles.push(("supervisor", supervisor.start(supervisor_cancel.clone())));
            info!("NIMBUS Gateway is ready");
        }

        let _ = bridge.await;

        // Initiate shutdown
        info!("Shutdown initiated, cleaning up...");

        let mut failures = Vec::new();
        for (name, handle) in handles {
            if let Err(e) = handle.await {
                failures.push(format!("{} task failed: {}", name, e));
            }
        }

        if let Err(e) = link.disconnect().await {
            warn!(error = %e, "Link disconnect failed during shutdown");
        }

        match failures.into_iter().next() {
            Some(failure) => Err(BinError::runtime(failure)),
            None => Ok(()),
        }
    }
}

// =============================================================================
// GatewayComponents
// =============================================================================

/// Container for all gateway components.
struct GatewayComponents {
    link: Arc<MqttLink>,
    supervisor: Arc<LinkSupervisor<MqttLink>>,
    relay: Arc<DataRelay<StandaloneSource, MqttLink>>,
    dispatcher: Arc<CommandDispatcher<MqttLink>>,
    inbound_rx: mpsc::Receiver<InboundEnvelope>,
}

// =============================================================================
// GatewaySession
// =============================================================================

/// Session handler that re-announces the gateway after every (re)connect.
///
/// The platform treats a new session as a blank slate, so the handler
/// subscribes, replays unresolved operation acknowledgements, then publishes
/// the full device description before asking for pending operations.
struct GatewaySession {
    link: Arc<MqttLink>,
    topics: Topics,
    identity: GatewayIdentity,
    inventory: InventoryConfig,
    settings: Arc<FileSettings>,
    dispatcher: Arc<CommandDispatcher<MqttLink>>,
}

#[async_trait]
impl SessionHandler for GatewaySession {
    async fn on_established(&self) -> LinkResult<()> {
        self.link.subscribe(&self.topics.subscribe).await?;
        self.dispatcher.resolve_pending().await;

        let publish = &self.topics.publish;
        self.link
            .publish(
                publish,
                &render::create_device(&self.identity.name, &self.identity.device_type),
            )
            .await?;
        self.link
            .publish(publish, &render::hardware(&self.inventory.hardware))
            .await?;
        self.link
            .publish(publish, &render::supported_operations(&OperationKind::ALL))
            .await?;
        self.link
            .publish(publish, &render::software_list(&self.inventory.software))
            .await?;
        self.link
            .publish(publish, &render::firmware(&self.inventory.firmware))
            .await?;

        let snapshot = match self.settings.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    error = %e,
                    "Settings snapshot unavailable, announcing empty configuration"
                );
                String::new()
            }
        };
        self.link
            .publish(publish, &render::configuration_snapshot(&snapshot))
            .await?;

        self.link
            .publish(publish, &render::request_pending_operations())
            .await?;

        Ok(())
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the gateway runtime.
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<NimbusConfig>,
    state_dir: Option<PathBuf>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_path: None,
            config: None,
            state_dir: None,
        }
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: NimbusConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the configured state directory, keeping the credential
    /// file alongside.
    pub fn state_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.state_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<GatewayRuntime> {
        let mut config = match self.config {
            Some(cfg) => cfg,
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::Configuration("No configuration provided".into()))?;

                ConfigLoader::new().load(&path).map_err(|e| {
                    BinError::Configuration(format!("Failed to load config from {:?}: {}", path, e))
                })?
            }
        };

        if let Some(dir) = self.state_dir {
            config.paths.credentials_file = dir.join("credentials.json");
            config.paths.state_dir = dir;
        }

        Ok(GatewayRuntime::new(config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_link::ProvisionState;

    #[test]
    fn test_runtime_builder() {
        let runtime = RuntimeBuilder::new()
            .config(NimbusConfig::for_testing())
            .build()
            .unwrap();

        assert_eq!(runtime.config.gateway.id, "gw-test-01");
    }

    #[test]
    fn test_runtime_builder_requires_config() {
        let result = RuntimeBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_state_dir_override() {
        let runtime = RuntimeBuilder::new()
            .config(NimbusConfig::for_testing())
            .state_dir("/tmp/nimbus-test-state")
            .build()
            .unwrap();

        assert_eq!(
            runtime.config.paths.state_dir,
            PathBuf::from("/tmp/nimbus-test-state")
        );
        assert_eq!(
            runtime.config.paths.credentials_file,
            PathBuf::from("/tmp/nimbus-test-state/credentials.json")
        );
    }

    #[tokio::test]
    async fn test_initialize_components() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NimbusConfig::for_testing();
        config.paths.state_dir = dir.path().to_path_buf();
        config.paths.credentials_file = dir.path().join("credentials.json");

        let runtime = GatewayRuntime::new(config);
        let components = runtime.initialize_components().await.unwrap();

        assert_eq!(components.supervisor.state(), ProvisionState::Unprovisioned);
        assert!(!components.relay.is_running());
    }

    #[tokio::test]
    async fn test_stored_settings_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NimbusConfig::for_testing();
        config.paths.state_dir = dir.path().to_path_buf();
        config.paths.credentials_file = dir.path().join("credentials.json");

        std::fs::write(
            config.paths.settings_file(),
            r#"{"interval": "120", "policy": "average"}"#,
        )
        .unwrap();

        let runtime = GatewayRuntime::new(config);
        let settings = FileSettings::open(runtime.config.paths.settings_file()).unwrap();
        let relay_config = runtime.effective_relay_config(&settings);

        assert_eq!(relay_config.interval, Duration::from_secs(120));
        assert_eq!(relay_config.policy, "average");
    }

    #[tokio::test]
    async fn test_invalid_stored_settings_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NimbusConfig::for_testing();
        config.paths.state_dir = dir.path().to_path_buf();

        std::fs::write(
            config.paths.settings_file(),
            r#"{"interval": "zero", "policy": "median"}"#,
        )
        .unwrap();

        let runtime = GatewayRuntime::new(config);
        let settings = FileSettings::open(runtime.config.paths.settings_file()).unwrap();
        let relay_config = runtime.effective_relay_config(&settings);

        assert_eq!(relay_config.interval, runtime.config.relay.interval);
        assert_eq!(relay_config.policy, runtime.config.relay.policy);
    }
}
