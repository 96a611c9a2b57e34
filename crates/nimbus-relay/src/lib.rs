// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # nimbus-relay
//!
//! Gateway orchestration for NIMBUS: the loops that move data up and
//! commands down.
//!
//! Two long-running tasks make up the crate:
//!
//! - [`DataRelay`] pulls sample spans from the local historical store
//!   through a resumable cursor, reduces them with `nimbus-aggregate`,
//!   and publishes the results. Failed publishes land in a bounded
//!   [`PendingQueue`] and retry on the next healthy cycle.
//! - [`CommandDispatcher`] consumes inbound platform operations,
//!   executes them against the device seams ([`TagStore`],
//!   [`DeviceControl`], [`SettingsStore`]), and acknowledges every
//!   lifecycle transition. Operations that end in a restart persist an
//!   [`OperationMarker`](nimbus_core::operation::OperationMarker)
//!   through [`MarkerStore`] and complete after the process returns.
//!
//! The device-facing seams are traits so the binary can wire real
//! hardware while tests wire stubs.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// ===========================================================================
// Modules
// ===========================================================================

pub mod dispatch;
pub mod durable;
pub mod firmware;
pub mod pending;
pub mod probe;
pub mod relay;
pub mod source;
pub mod tags;

// ===========================================================================
// Re-exports
// ===========================================================================

pub use dispatch::{CommandDispatcher, DispatchMetrics};
pub use durable::MarkerStore;
pub use firmware::{FirmwareSource, HttpFirmwareSource};
pub use pending::{PendingKind, PendingMessage, PendingQueue, PendingStats};
pub use probe::{MemoryProbe, ProcMeminfo};
pub use relay::{DataRelay, RelayConfig, RelayConfigBuilder, RelayMetrics};
pub use source::{SampleSource, SourceCursor, SourceSpan};
pub use tags::{keys, write_value, DeviceControl, SettingsStore, TagStore};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
