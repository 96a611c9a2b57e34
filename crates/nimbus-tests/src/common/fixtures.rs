// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built test data for consistent and reproducible testing.
//!
//! ## Design Principles
//!
//! - Fixtures are immutable and thread-safe
//! - Each fixture represents a realistic scenario
//! - Fixtures can be composed for complex test scenarios

use chrono::{DateTime, TimeZone, Utc};

use nimbus_core::types::{DataPoint, FirmwareInfo, HardwareInfo, LinkCredentials, SoftwareItem};

// =============================================================================
// Gateway Fixtures
// =============================================================================

/// Fixture providing standard gateway identities.
pub struct GatewayFixtures;

impl GatewayFixtures {
    /// The gateway id used throughout the suites.
    pub fn gateway_id() -> &'static str {
        "gw-7731"
    }

    /// A child device wired behind the gateway.
    pub fn child_device() -> &'static str {
        "press-01"
    }

    /// A second child device for multi-child scenarios.
    pub fn other_child_device() -> &'static str {
        "boiler-02"
    }

    /// Platform-issued device credentials.
    pub fn credentials() -> LinkCredentials {
        LinkCredentials::new("t-100", "device-gw-7731", "s3cret")
    }

    /// Well-known bootstrap credentials for the provisioning channel.
    pub fn bootstrap() -> LinkCredentials {
        LinkCredentials::new("management", "bootstrap", "bootstrap")
    }

    /// Hardware identity announced after connect.
    pub fn hardware() -> HardwareInfo {
        HardwareInfo {
            serial: "SN-44120".to_string(),
            model: "NIMBUS Gateway".to_string(),
            revision: "3".to_string(),
        }
    }

    /// Installed firmware announced after connect.
    pub fn firmware() -> FirmwareInfo {
        FirmwareInfo {
            name: "nimbus".to_string(),
            version: "0.3.0".to_string(),
            url: String::new(),
        }
    }

    /// Installed software list announced after connect.
    pub fn software() -> Vec<SoftwareItem> {
        vec![
            SoftwareItem {
                name: "collector".to_string(),
                version: "1.4.2".to_string(),
                url: "https://pkg.example.com/collector".to_string(),
            },
            SoftwareItem {
                name: "watchdog".to_string(),
                version: "0.9.0".to_string(),
                url: "https://pkg.example.com/watchdog".to_string(),
            },
        ]
    }
}

// =============================================================================
// Point Fixtures
// =============================================================================

/// Fixture providing sampled data points.
pub struct PointFixtures;

impl PointFixtures {
    /// A fixed, window-aligned base instant: 2025-06-01 08:00:00 UTC.
    pub fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    /// An instant `seconds` after [`Self::base_time`].
    pub fn at(seconds: i64) -> DateTime<Utc> {
        Self::base_time() + chrono::Duration::seconds(seconds)
    }

    /// A single gateway temperature sample.
    pub fn temperature() -> DataPoint {
        DataPoint::new("boiler/temperature", 21.5)
            .with_unit("C")
            .with_timestamp(Self::at(5))
    }

    /// A batch of temperature samples, one per second from the base time.
    pub fn temperature_batch(count: usize) -> Vec<DataPoint> {
        (0..count)
            .map(|i| {
                DataPoint::new("boiler/temperature", 20.0 + i as f64)
                    .with_unit("C")
                    .with_timestamp(Self::at(i as i64))
            })
            .collect()
    }

    /// A text sample that must relay as a basic event, not aggregate.
    pub fn operator_note() -> DataPoint {
        DataPoint::new("press-01/operator/note", "shift handover").with_timestamp(Self::at(2))
    }

    /// A mixed batch: gateway numerics, a child numeric, and a text sample.
    pub fn mixed_batch() -> Vec<DataPoint> {
        vec![
            DataPoint::new("boiler/temperature", 21.0)
                .with_unit("C")
                .with_timestamp(Self::at(1)),
            DataPoint::new("boiler/temperature", 23.0)
                .with_unit("C")
                .with_timestamp(Self::at(31)),
            DataPoint::new("press-01/motor/rpm", 1400).with_timestamp(Self::at(7)),
            Self::operator_note(),
        ]
    }
}

// =============================================================================
// Payload Fixtures
// =============================================================================

/// Fixture providing downstream template payloads.
pub struct PayloadFixtures;

impl PayloadFixtures {
    /// A restart operation addressed to the fixture gateway.
    pub fn restart() -> String {
        format!("510,{}", GatewayFixtures::gateway_id())
    }

    /// A restart operation addressed to some other gateway.
    pub fn restart_for_stranger() -> String {
        "510,gw-9999".to_string()
    }

    /// A run-command operation carrying the given command text.
    pub fn run_command(command: &str) -> String {
        format!("511,{},{}", GatewayFixtures::gateway_id(), command)
    }

    /// A set-configuration operation carrying an escaped blob.
    pub fn set_configuration(blob: &str) -> String {
        format!(
            "513,{},\"{}\"",
            GatewayFixtures::gateway_id(),
            blob.replace('\n', "\\n")
        )
    }

    /// An install-firmware operation for the given image.
    pub fn install_firmware(name: &str, version: &str, url: &str) -> String {
        format!(
            "515,{},{},{},{}",
            GatewayFixtures::gateway_id(),
            name,
            version,
            url
        )
    }

    /// A platform error response rejecting template `510`.
    pub fn error_response() -> String {
        "41,510,No such operation queued".to_string()
    }

    /// A credential response matching [`GatewayFixtures::credentials`].
    pub fn credential_response() -> String {
        let credentials = GatewayFixtures::credentials();
        format!(
            "70,{},{},{}",
            credentials.tenant, credentials.username, credentials.password
        )
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Fixture providing configuration documents.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// The smallest valid YAML configuration.
    pub fn minimal_yaml() -> &'static str {
        "gateway:\n  id: gw-7731\n"
    }

    /// A fuller YAML configuration exercising most sections.
    pub fn full_yaml() -> &'static str {
        r#"
gateway:
  id: gw-7731
  name: Line 4 Gateway
  device_type: nimbus_gateway

cloud:
  mqtt:
    host: broker.example.com
    port: 8883
    client_id: gw-7731
  topics:
    publish: tpl/us
    subscribe: tpl/ds
  firmware_timeout: 120

relay:
  interval: 15
  enable_aggregation: true
  policy: average
  window: 30

supervisor:
  check_interval: 10
  disconnect_threshold: 5

inventory:
  hardware:
    serial: SN-44120
    model: NIMBUS Gateway
    revision: "3"

logging:
  level: debug
  format: json
"#
    }

    /// The smallest valid TOML configuration.
    pub fn minimal_toml() -> &'static str {
        "[gateway]\nid = \"gw-7731\"\n"
    }

    /// The smallest valid JSON configuration.
    pub fn minimal_json() -> &'static str {
        r#"{"gateway": {"id": "gw-7731"}}"#
    }
}
