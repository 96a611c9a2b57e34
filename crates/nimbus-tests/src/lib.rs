// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # NIMBUS Integration Tests
//!
//! This crate provides integration tests for the NIMBUS telemetry gateway.
//! It includes test utilities, fixtures, and helpers designed for
//! extensibility and maintainability.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities, fixtures, and helpers
//!   - `fixtures`: Pre-built test data for consistent testing
//!   - `builders`: Builder patterns for constructing test objects
//!   - `assertions`: Custom assertion helpers
//!   - `mocks`: Mock implementations for testing
//!   - `harness`: Gateway rig wiring relay and dispatcher against mocks
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p nimbus-tests
//!
//! # Run specific test suite
//! cargo test -p nimbus-tests --test integration_core
//! cargo test -p nimbus-tests --test integration_codec
//! cargo test -p nimbus-tests --test integration_aggregate
//! cargo test -p nimbus-tests --test integration_relay
//! cargo test -p nimbus-tests --test integration_dispatch
//! cargo test -p nimbus-tests --test integration_config
//!
//! # Run with verbose output
//! cargo test -p nimbus-tests -- --nocapture
//!
//! # Run specific test
//! cargo test -p nimbus-tests test_restart_completes_across_process_restart
//! ```
//!
//! ## Test Categories
//!
//! ### Core Tests (`integration_core.rs`)
//! - Tag name resolution and point naming
//! - Typed tag values and their wire projections
//! - Operation kinds, statuses, and fixed failure reasons
//! - Retry strategies and backoff behavior
//!
//! ### Codec Tests (`integration_codec.rs`)
//! - Outbound template rendering (identity, telemetry, operations)
//! - Inbound classification and its priority order
//! - Device command and configuration blob parsing
//! - Credential response parsing
//!
//! ### Aggregation Tests (`integration_aggregate.rs`)
//! - Reduction policies over windows
//! - Window alignment and child-device grouping
//! - Payload shape, `externalSource` routing, text passthrough
//!
//! ### Relay Tests (`integration_relay.rs`)
//! - Cycle gate sequence (memory floor, link, measurements)
//! - Pending queue retry, ordering, and overflow
//! - Cursor lifecycle across pull failures
//!
//! ### Dispatch Tests (`integration_dispatch.rs`)
//! - Operation lifecycle acknowledgements
//! - Durable markers surviving a process restart
//! - Device commands, configuration, and firmware flows
//!
//! ### Config Tests (`integration_config.rs`)
//! - Configuration parsing (YAML, TOML, JSON)
//! - Validation rules and environment placeholders
//! - Runtime settings and credential persistence
//!
//! ## Writing New Tests
//!
//! ### Using Fixtures
//!
//! ```rust,ignore
//! use nimbus_tests::common::fixtures::{GatewayFixtures, PointFixtures};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let device = GatewayFixtures::gateway_id();
//!     let points = PointFixtures::temperature_batch(10);
//!     // ... test logic
//! }
//! ```
//!
//! ### Using Builders
//!
//! ```rust,ignore
//! use nimbus_tests::common::builders::DataPointBuilder;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let point = DataPointBuilder::new()
//!         .name("boiler/temperature")
//!         .float_value(21.5)
//!         .unit("C")
//!         .build();
//!     // ... test logic
//! }
//! ```
//!
//! ### Using the Gateway Rig
//!
//! ```rust,ignore
//! use nimbus_tests::common::harness::GatewayRig;
//!
//! #[tokio::test]
//! async fn test_with_rig() {
//!     let rig = GatewayRig::new();
//!     let dispatcher = rig.dispatcher();
//!     dispatcher.handle(rig.envelope("510,gw-7731")).await;
//!     // ... assertions on rig.link, rig.control, rig.markers()
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::builders::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
}
