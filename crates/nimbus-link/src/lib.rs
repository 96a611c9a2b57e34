// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # NIMBUS Link
//!
//! Platform connectivity for the NIMBUS gateway: the [`CloudLink`] transport
//! seam, its MQTT implementation, the bootstrap credential exchange, and the
//! supervisor that keeps the session alive.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     LinkSupervisor                       │
//! │  provision → connect (backoff) → prepare → watch/rebuild │
//! └──────────────┬───────────────────────────┬───────────────┘
//!                │                           │
//!         ┌──────▼──────┐             ┌──────▼──────┐
//!         │ Provisioner │             │  CloudLink  │
//!         │ (bootstrap) │             │   (MQTT)    │
//!         └─────────────┘             └──────┬──────┘
//!                                            │
//!                                     inbound envelopes
//!                                            ▼
//!                                     command dispatch
//! ```
//!
//! The supervisor holds only bootstrap credentials at first boot. It runs the
//! credential exchange against the platform registration endpoint, persists
//! the device credentials it receives, then connects with unbounded
//! exponential backoff. Once up, a health check loop watches the link and
//! rebuilds it (fresh exchange included) after repeated disconnected checks.
//!
//! ## Example
//!
//! ```no_run
//! use nimbus_link::{MqttLink, MqttLinkOptions, shared_credentials};
//! use nimbus_core::types::LinkCredentials;
//!
//! # async fn example() -> nimbus_core::error::LinkResult<()> {
//! let (inbound_tx, mut inbound_rx) = tokio::sync::mpsc::channel(64);
//! let credentials = shared_credentials(LinkCredentials::new("t-100", "gw", "pass"));
//! let link = MqttLink::new(MqttLinkOptions::default(), credentials, inbound_tx);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod link;
pub mod mqtt;
pub mod provision;
pub mod supervisor;

pub use link::{
    shared_credentials, CloudLink, CredentialSink, InboundEnvelope, SharedCredentials, Topics,
};
pub use mqtt::{MqttLink, MqttLinkOptions};
pub use provision::{ProvisionState, Provisioner};
pub use supervisor::{
    LinkSupervisor, NoopSessionHandler, SessionHandler, SupervisorConfig, SupervisorMetrics,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_metadata() {
        assert_eq!(NAME, "nimbus-link");
        assert!(!VERSION.is_empty());
    }
}
