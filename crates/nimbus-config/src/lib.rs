// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # NIMBUS Config
//!
//! Configuration and durable state for the NIMBUS gateway: the configuration
//! schema with validation, multi-format file loading with environment
//! overrides, the device credential store, and the runtime settings store the
//! platform rewrites through operations.
//!
//! ## Configuration Sections
//!
//! - `gateway` - Gateway identity (the only required section)
//! - `cloud` - Broker endpoint, topics, bootstrap credentials
//! - `relay` - Poll interval, aggregation policy and window
//! - `supervisor` - Health check cadence and reconnect thresholds
//! - `inventory` - Hardware, firmware and software announced at startup
//! - `paths` - State directory and credential file locations
//! - `logging` - Level and output format
//!
//! ## Quick Start
//!
//! ```no_run
//! use nimbus_config::ConfigLoader;
//!
//! let config = ConfigLoader::new().load("nimbus.yaml").unwrap();
//! println!("Gateway ID: {}", config.gateway.id);
//! ```
//!
//! ## Environment Variables
//!
//! Values can be overridden without touching the file:
//!
//! ```text
//! NIMBUS_GATEWAY_ID=gw-7731
//! NIMBUS_MQTT_HOST=mqtt.example.com
//! NIMBUS_LOG_LEVEL=debug
//! ```
//!
//! Files can also reference environment variables inline:
//!
//! ```yaml
//! cloud:
//!   bootstrap:
//!     password: "${NIMBUS_BOOTSTRAP_PASSWORD}"
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod credentials;
pub mod error;
pub mod loader;
pub mod schema;
pub mod settings;

pub use credentials::CredentialStore;
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader};
pub use schema::{
    CloudConfig, GatewayIdentity, InventoryConfig, LogFormat, LoggingConfig, NimbusConfig,
    PathsConfig,
};
pub use settings::FileSettings;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
