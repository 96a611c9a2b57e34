// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # nimbus-bin
//!
//! CLI binary for the NIMBUS northbound gateway.
//!
//! This crate provides the main binary entry point for NIMBUS, including:
//!
//! - CLI argument parsing with clap
//! - Gateway runtime orchestration
//! - Graceful shutdown handling
//! - Logging initialization
//! - Command implementations (run, validate, version)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                              │
//! │                    (Entry Point)                             │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    │ (Argument   │
//!                    │  Parsing)   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        │          │ │          │ │          │
//!        └──────────┘ └────┬─────┘ └──────────┘
//!                          │
//!               ┌──────────┼──────────┐
//!               ▼          ▼          ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ adapters │ │ shutdown │ │ nimbus-* │
//!        │          │ │(Graceful)│ │ (crates) │
//!        └──────────┘ └──────────┘ └──────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the gateway (default command)
//! nimbus
//!
//! # Start with custom config
//! nimbus -c /etc/nimbus/config.yaml
//!
//! # Validate configuration
//! nimbus validate
//!
//! # Show version
//! nimbus version
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod adapters;
pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use adapters::{GatewayControl, StandaloneSource, StandaloneTags};
pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{GatewayRuntime, RuntimeBuilder};
pub use shutdown::{ShutdownCoordinator, ShutdownToken};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
