// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Cloud link abstraction.
//!
//! The [`CloudLink`] trait is the seam between NIMBUS and the platform
//! transport. The relay loop and command dispatcher only ever talk to this
//! trait; the MQTT adapter in [`crate::mqtt`] is one implementation and the
//! test mocks are another. Inbound traffic is delivered as
//! [`InboundEnvelope`]s over an mpsc channel handed to the link at
//! construction.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nimbus_core::error::LinkResult;
use nimbus_core::types::LinkCredentials;

// ===========================================================================
// Topics
// ===========================================================================

/// Topic layout of the template channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Topics {
    /// Upstream template topic. Child devices append `/{external id}`.
    #[serde(default = "default_publish")]
    pub publish: String,

    /// Upstream JSON topic for aggregated payloads.
    #[serde(default = "default_publish_json")]
    pub publish_json: String,

    /// Downstream operation topic.
    #[serde(default = "default_subscribe")]
    pub subscribe: String,

    /// Upstream credential-request topic (provisioning channel).
    #[serde(default = "default_credential_request")]
    pub credential_request: String,

    /// Downstream credential-response topic (provisioning channel).
    #[serde(default = "default_credential_response")]
    pub credential_response: String,
}

fn default_publish() -> String {
    "tpl/us".to_string()
}

fn default_publish_json() -> String {
    "jsn/us".to_string()
}

fn default_subscribe() -> String {
    "tpl/ds".to_string()
}

fn default_credential_request() -> String {
    "tpl/ucr".to_string()
}

fn default_credential_response() -> String {
    "tpl/dcr".to_string()
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            publish: default_publish(),
            publish_json: default_publish_json(),
            subscribe: default_subscribe(),
            credential_request: default_credential_request(),
            credential_response: default_credential_response(),
        }
    }
}

impl Topics {
    /// Template topic for the gateway or one of its children.
    pub fn template_topic(&self, child_device: Option<&str>) -> String {
        match child_device {
            Some(child) => format!("{}/{}", self.publish, child),
            None => self.publish.clone(),
        }
    }
}

// ===========================================================================
// Inbound Envelope
// ===========================================================================

/// One message received from the platform.
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    /// Correlation id assigned on receipt, carried through dispatch logs.
    pub id: Uuid,
    /// Topic the message arrived on.
    pub topic: String,
    /// Raw payload text.
    pub payload: String,
}

impl InboundEnvelope {
    /// Wraps a received message, assigning a correlation id.
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

// ===========================================================================
// Shared Credentials
// ===========================================================================

/// Device credentials shared between the link, the provisioner and the
/// firmware fetcher. The provisioner is the only writer after startup.
pub type SharedCredentials = Arc<RwLock<LinkCredentials>>;

/// Wraps credentials for sharing.
pub fn shared_credentials(credentials: LinkCredentials) -> SharedCredentials {
    Arc::new(RwLock::new(credentials))
}

/// Persists exchanged device credentials.
///
/// Implemented by the credential store; the supervisor calls it once per
/// successful provisioning exchange.
#[async_trait]
pub trait CredentialSink: Send + Sync {
    /// Writes the credentials to durable storage.
    async fn persist(&self, credentials: &LinkCredentials) -> LinkResult<()>;
}

// ===========================================================================
// CloudLink
// ===========================================================================

/// Transport seam to the cloud platform.
///
/// Implementations own their connection state; `publish` and `subscribe`
/// fail with `LinkError::NotConnected` when no session is established.
/// Received messages flow through the mpsc sender the implementation was
/// built with, one [`InboundEnvelope`] per message.
#[async_trait]
pub trait CloudLink: Send + Sync {
    /// Establishes a session with the platform.
    ///
    /// Completes once the platform has accepted the session, or fails with
    /// a retryable error. Safe to call again after a disconnect.
    async fn connect(&self) -> LinkResult<()>;

    /// Tears down the session.
    async fn disconnect(&self) -> LinkResult<()>;

    /// True while a session is established.
    fn is_connected(&self) -> bool;

    /// Publishes one payload to a topic.
    async fn publish(&self, topic: &str, payload: &str) -> LinkResult<()>;

    /// Subscribes to a downstream topic.
    async fn subscribe(&self, topic: &str) -> LinkResult<()>;

    /// Name of this link for logging.
    fn name(&self) -> &str;
}

// ===========================================================================
// Tests
// ===========================================================================
