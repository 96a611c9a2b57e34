// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Provisioning exchange.
//!
//! A freshly installed gateway holds only operator-supplied bootstrap
//! credentials. The [`Provisioner`] opens a dedicated session with those,
//! subscribes the credential-response topic, and repeats an empty request on
//! a fixed interval until the platform answers with a 4-field credential
//! response. The waiting receive doubles as the provisioning latch: it
//! releases on the credential message and immediately on cancellation.

use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use nimbus_codec::parse::parse_credentials;
use nimbus_core::error::{LinkError, LinkResult};
use nimbus_core::types::LinkCredentials;

use crate::link::{shared_credentials, CloudLink, Topics};
use crate::mqtt::{MqttLink, MqttLinkOptions};

// ===========================================================================
// State
// ===========================================================================

/// Progress of the credential exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    /// Only bootstrap credentials are available.
    Unprovisioned,
    /// The exchange is running.
    Provisioning,
    /// Device credentials are held and usable.
    Provisioned,
}

impl ProvisionState {
    /// State name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionState::Unprovisioned => "unprovisioned",
            ProvisionState::Provisioning => "provisioning",
            ProvisionState::Provisioned => "provisioned",
        }
    }

    /// Initial state for a set of persisted credentials.
    pub fn for_credentials(credentials: &LinkCredentials) -> Self {
        if credentials.is_placeholder() {
            ProvisionState::Unprovisioned
        } else {
            ProvisionState::Provisioned
        }
    }
}

impl std::fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ===========================================================================
// Provisioner
// ===========================================================================

/// Runs the bootstrap credential exchange.
#[derive(Debug, Clone)]
pub struct Provisioner {
    options: MqttLinkOptions,
    bootstrap: LinkCredentials,
    topics: Topics,
    request_interval: Duration,
}

impl Provisioner {
    /// Creates a provisioner against the given broker and topics.
    pub fn new(
        options: MqttLinkOptions,
        bootstrap: LinkCredentials,
        topics: Topics,
        request_interval: Duration,
    ) -> Self {
        Self {
            options: options.for_provisioning(),
            bootstrap,
            topics,
            request_interval,
        }
    }

    /// Runs the exchange until credentials arrive or `cancel` fires.
    ///
    /// The bootstrap session is closed before returning, on every path.
    pub async fn obtain(&self, cancel: &Notify) -> LinkResult<LinkCredentials> {
        let (tx, mut rx) = mpsc::channel(8);
        let link = MqttLink::new(
            self.options.clone(),
            shared_credentials(self.bootstrap.clone()),
            tx,
        );

        link.connect().await?;
        if let Err(e) = link.subscribe(&self.topics.credential_response).await {
            let _ = link.disconnect().await;
            return Err(e);
        }

        info!(
            request_topic = %self.topics.credential_request,
            response_topic = %self.topics.credential_response,
            interval_s = self.request_interval.as_secs(),
            "Awaiting device credentials"
        );

        let mut ticker = tokio::time::interval(self.request_interval);
        let result = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match link.publish(&self.topics.credential_request, "").await {
                        Ok(()) => debug!("Credential request sent"),
                        Err(e) => warn!(error = %e, "Credential request failed"),
                    }
                }
                received = rx.recv() => match received {
                    Some(envelope) => match parse_credentials(&envelope.payload) {
                        Ok(credentials) => break Ok(credentials),
                        Err(e) => {
                            debug!(error = %e, "Ignoring non-credential message");
                        }
                    },
                    None => break Err(LinkError::ChannelClosed),
                },
                _ = cancel.notified() => break Err(LinkError::Cancelled),
            }
        };

        let _ = link.disconnect().await;

        match &result {
            Ok(credentials) => {
                info!(login = %credentials.login(), "Device credentials received");
            }
            Err(LinkError::Cancelled) => info!("Provisioning cancelled"),
            Err(e) => warn!(error = %e, "Provisioning exchange failed"),
        }
        result
    }
}

// ===========================================================================
// Tests
// ===========================================================================
