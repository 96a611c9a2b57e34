// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for NIMBUS.
//!
//! # Schema Structure
//!
//! ```text
//! NimbusConfig
//! ├── gateway: GatewayIdentity
//! ├── cloud: CloudConfig
//! ├── relay: RelayConfig        (nimbus-relay)
//! ├── supervisor: SupervisorConfig (nimbus-link)
//! ├── inventory: InventoryConfig
//! ├── paths: PathsConfig
//! └── logging: LoggingConfig
//! ```
//!
//! Sections owned by other crates ([`RelayConfig`], [`SupervisorConfig`],
//! [`MqttLinkOptions`], [`Topics`]) embed unchanged, so one file configures
//! the whole gateway.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use nimbus_aggregate::AggregationPolicy;
use nimbus_core::types::{FirmwareInfo, HardwareInfo, LinkCredentials, SoftwareItem};
use nimbus_link::{MqttLinkOptions, SupervisorConfig, Topics};
use nimbus_relay::RelayConfig;

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Maximum gateway id length.
pub const MAX_GATEWAY_ID_LEN: usize = 64;

/// Default firmware download timeout in seconds.
pub const DEFAULT_FIRMWARE_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for a NIMBUS gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NimbusConfig {
    /// Gateway identity.
    pub gateway: GatewayIdentity,

    /// Platform connection configuration.
    #[serde(default)]
    pub cloud: CloudConfig,

    /// Data relay configuration.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Link supervision configuration.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Inventory announced after connect.
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Filesystem locations for runtime state.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NimbusConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.gateway.validate()?;
        self.cloud.validate()?;
        validate_relay(&self.relay)?;
        validate_supervisor(&self.supervisor)?;
        Ok(())
    }

    /// Creates a configuration for testing (fast intervals, local broker).
    pub fn for_testing() -> Self {
        Self {
            gateway: GatewayIdentity {
                id: "gw-test-01".to_string(),
                name: "Test Gateway".to_string(),
                device_type: default_device_type(),
            },
            cloud: CloudConfig {
                mqtt: MqttLinkOptions::for_testing(),
                topics: Topics::default(),
                bootstrap: default_bootstrap(),
                firmware_timeout: Duration::from_secs(5),
            },
            relay: RelayConfig::for_testing(),
            supervisor: SupervisorConfig::for_testing(),
            inventory: InventoryConfig::default(),
            paths: PathsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NimbusConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayIdentity::default(),
            cloud: CloudConfig::default(),
            relay: RelayConfig::default(),
            supervisor: SupervisorConfig::default(),
            inventory: InventoryConfig::default(),
            paths: PathsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// =============================================================================
// Gateway Identity
// =============================================================================

/// Gateway identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayIdentity {
    /// Unique gateway identifier. Inbound operations are addressed to it.
    pub id: String,

    /// Human-readable gateway name, announced at device creation.
    #[serde(default = "default_gateway_name")]
    pub name: String,

    /// Device type announced at device creation.
    #[serde(default = "default_device_type")]
    pub device_type: String,
}

fn default_gateway_name() -> String {
    "NIMBUS Gateway".to_string()
}

fn default_device_type() -> String {
    "nimbus_gateway".to_string()
}

impl GatewayIdentity {
    /// Validates the gateway identity.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.id.is_empty() {
            return Err(ConfigError::validation("gateway.id", "cannot be empty"));
        }
        if self.id.len() > MAX_GATEWAY_ID_LEN {
            return Err(ConfigError::validation(
                "gateway.id",
                format!("cannot exceed {MAX_GATEWAY_ID_LEN} characters"),
            ));
        }
        if self.name.is_empty() {
            return Err(ConfigError::validation("gateway.name", "cannot be empty"));
        }
        Ok(())
    }
}

impl Default for GatewayIdentity {
    fn default() -> Self {
        Self {
            id: "nimbus-gateway-01".to_string(),
            name: default_gateway_name(),
            device_type: default_device_type(),
        }
    }
}

// =============================================================================
// Cloud Configuration
// =============================================================================

/// Platform connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloudConfig {
    /// MQTT broker options.
    #[serde(default)]
    pub mqtt: MqttLinkOptions,

    /// Topic layout.
    #[serde(default)]
    pub topics: Topics,

    /// Bootstrap identity for the provisioning exchange.
    #[serde(default = "default_bootstrap")]
    pub bootstrap: LinkCredentials,

    /// Firmware download timeout.
    #[serde(default = "default_firmware_timeout")]
    #[serde(with = "duration_secs")]
    pub firmware_timeout: Duration,
}

fn default_bootstrap() -> LinkCredentials {
    LinkCredentials::new("management", "bootstrap", "bootstrap")
}

fn default_firmware_timeout() -> Duration {
    Duration::from_secs(DEFAULT_FIRMWARE_TIMEOUT_SECS)
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

impl CloudConfig {
    /// Validates the cloud configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.mqtt.host.is_empty() {
            return Err(ConfigError::validation("cloud.mqtt.host", "cannot be empty"));
        }
        if self.mqtt.port == 0 {
            return Err(ConfigError::validation("cloud.mqtt.port", "cannot be zero"));
        }
        for (field, topic) in [
            ("cloud.topics.publish", &self.topics.publish),
            ("cloud.topics.publish_json", &self.topics.publish_json),
            ("cloud.topics.subscribe", &self.topics.subscribe),
            (
                "cloud.topics.credential_request",
                &self.topics.credential_request,
            ),
            (
                "cloud.topics.credential_response",
                &self.topics.credential_response,
            ),
        ] {
            if topic.is_empty() {
                return Err(ConfigError::validation(field, "cannot be empty"));
            }
        }
        if self.firmware_timeout.is_zero() {
            return Err(ConfigError::validation(
                "cloud.firmware_timeout",
                "cannot be zero",
            ));
        }
        Ok(())
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttLinkOptions::default(),
            topics: Topics::default(),
            bootstrap: default_bootstrap(),
            firmware_timeout: default_firmware_timeout(),
        }
    }
}

// =============================================================================
// Embedded Section Validation
// =============================================================================

fn validate_relay(relay: &RelayConfig) -> ConfigResult<()> {
    if relay.interval.is_zero() {
        return Err(ConfigError::validation("relay.interval", "cannot be zero"));
    }
    if let Err(e) = AggregationPolicy::from_value(&relay.policy) {
        return Err(ConfigError::validation("relay.policy", e.to_string()));
    }
    if relay.enable_aggregation && relay.window.is_zero() {
        return Err(ConfigError::validation("relay.window", "cannot be zero"));
    }
    if relay.pending_limit == 0 {
        return Err(ConfigError::validation(
            "relay.pending_limit",
            "cannot be zero",
        ));
    }
    if relay.cursor_failure_threshold == 0 {
        return Err(ConfigError::validation(
            "relay.cursor_failure_threshold",
            "cannot be zero",
        ));
    }
    Ok(())
}

fn validate_supervisor(supervisor: &SupervisorConfig) -> ConfigResult<()> {
    if supervisor.check_interval.is_zero() {
        return Err(ConfigError::validation(
            "supervisor.check_interval",
            "cannot be zero",
        ));
    }
    if supervisor.disconnect_threshold == 0 {
        return Err(ConfigError::validation(
            "supervisor.disconnect_threshold",
            "cannot be zero",
        ));
    }
    if supervisor.request_interval.is_zero() {
        return Err(ConfigError::validation(
            "supervisor.request_interval",
            "cannot be zero",
        ));
    }
    Ok(())
}

// =============================================================================
// Inventory Configuration
// =============================================================================

/// Inventory announced to the platform after every (re)connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryConfig {
    /// Hardware identity.
    #[serde(default = "default_hardware")]
    pub hardware: HardwareInfo,

    /// Installed firmware.
    #[serde(default = "default_firmware_info")]
    pub firmware: FirmwareInfo,

    /// Installed software packages.
    #[serde(default)]
    pub software: Vec<SoftwareItem>,
}

fn default_hardware() -> HardwareInfo {
    HardwareInfo {
        serial: "unknown".to_string(),
        model: "NIMBUS Gateway".to_string(),
        revision: "1".to_string(),
    }
}

fn default_firmware_info() -> FirmwareInfo {
    FirmwareInfo {
        name: "nimbus".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        url: String::new(),
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            hardware: default_hardware(),
            firmware: default_firmware_info(),
            software: Vec::new(),
        }
    }
}

// =============================================================================
// Paths Configuration
// =============================================================================

/// Filesystem locations for runtime state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory holding operation markers and adjustable settings.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// File holding the credentials obtained through provisioning.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/nimbus")
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("/var/lib/nimbus/credentials.json")
}

impl PathsConfig {
    /// Directory holding durable operation markers.
    pub fn marker_dir(&self) -> PathBuf {
        self.state_dir.join("operations")
    }

    /// File holding runtime-adjustable settings.
    pub fn settings_file(&self) -> PathBuf {
        self.state_dir.join("settings.json")
    }

    /// Directory where downloaded firmware images are staged.
    pub fn firmware_dir(&self) -> PathBuf {
        self.state_dir.join("firmware")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            credentials_file: default_credentials_file(),
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for log aggregation.
    Json,
    /// Compact single-line output.
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NimbusConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.id, "nimbus-gateway-01");
        assert_eq!(config.cloud.topics.publish, "tpl/us");
    }

    #[test]
    fn test_for_testing_is_valid() {
        let config = NimbusConfig::for_testing();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_gateway_id_rejected() {
        let mut config = NimbusConfig::default();
        config.gateway.id = String::new();
        let error = config.validate().unwrap_err();
        assert!(matches!(error, ConfigError::Validation { ref field, .. } if field == "gateway.id"));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let mut config = NimbusConfig::default();
        config.relay.policy = "median".to_string();
        let error = config.validate().unwrap_err();
        assert!(matches!(error, ConfigError::Validation { ref field, .. } if field == "relay.policy"));
    }

    #[test]
    fn test_zero_relay_interval_rejected() {
        let mut config = NimbusConfig::default();
        config.relay.interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_disconnect_threshold_rejected() {
        let mut config = NimbusConfig::default();
        config.supervisor.disconnect_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = "gateway:\n  id: gw-7731\n";
        let config: NimbusConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.gateway.id, "gw-7731");
        assert_eq!(config.gateway.name, "NIMBUS Gateway");
        assert_eq!(config.relay.interval, Duration::from_secs(30));
        assert_eq!(config.cloud.mqtt.port, 1883);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_section_rejected() {
        let yaml = "gateway:\n  id: gw-7731\nmystery:\n  x: 1\n";
        assert!(serde_yaml::from_str::<NimbusConfig>(yaml).is_err());
    }

    #[test]
    fn test_paths_derived_locations() {
        let paths = PathsConfig::default();
        assert_eq!(
            paths.marker_dir(),
            PathBuf::from("/var/lib/nimbus/operations")
        );
        assert_eq!(
            paths.settings_file(),
            PathBuf::from("/var/lib/nimbus/settings.json")
        );
        assert_eq!(
            paths.firmware_dir(),
            PathBuf::from("/var/lib/nimbus/firmware")
        );
    }
}
