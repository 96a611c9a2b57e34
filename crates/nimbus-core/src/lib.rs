// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # nimbus-core
//!
//! Core abstractions and shared types for the NIMBUS cloud relay.
//!
//! This crate provides the foundational types and utilities used across all
//! NIMBUS components including:
//!
//! - **Types**: Core data types like `PointName`, `TagValue`, `DataPoint`,
//!   `LinkCredentials`
//! - **TagName**: Hierarchical tag-name resolution (child/fragment/series)
//! - **Operation**: The platform operation lifecycle and durable markers
//! - **Error**: Unified error hierarchy
//! - **Backoff**: Retry strategies for link operations
//!
//! ## Example
//!
//! ```rust,ignore
//! use nimbus_core::types::{DataPoint, TagValue};
//! use nimbus_core::tagname::TagName;
//!
//! let point = DataPoint::new("furnace2/temperature/inlet", 118.4).with_unit("C");
//! let name = TagName::resolve_point(&point.name);
//! assert_eq!(name.child_device.as_deref(), Some("furnace2"));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod error;
pub mod operation;
pub mod tagname;
pub mod types;

// =============================================================================
// Link Support Modules
// =============================================================================

pub mod backoff;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::*;
pub use tagname::*;
pub use types::*;

// Re-export operation lifecycle types
pub use operation::{OperationKind, OperationMarker, OperationStatus};

// Re-export retry types
pub use backoff::{
    ExponentialBackoff, FixedDelay, RetryConfig, RetryDecision, RetryStrategy, UNLIMITED_ATTEMPTS,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
