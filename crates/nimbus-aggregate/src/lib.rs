// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # nimbus-aggregate
//!
//! Aggregation pipeline for NIMBUS. Reduces bursts of sampled points
//! to one JSON payload per `(window, child device)` pair so the relay
//! publishes a bounded number of messages regardless of sample rate.
//!
//! The pipeline has three stages:
//!
//! 1. [`partition`] lifts text samples out of the batch; they relay
//!    as individual events and never aggregate.
//! 2. [`window::group_into_windows`] buckets the remaining samples by
//!    aligned window start and child device, then by fragment and
//!    series.
//! 3. [`AggregationPolicy::apply`] reduces every series to one
//!    representative sample, and the [`Aggregator`] renders the
//!    resulting windows as JSON payloads.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use nimbus_aggregate::{Aggregator, AggregationPolicy};
//! use nimbus_core::types::DataPoint;
//!
//! let aggregator = Aggregator::new(
//!     AggregationPolicy::Average,
//!     Duration::from_secs(60),
//!     "gw-7731",
//! ).unwrap();
//!
//! let points = vec![
//!     DataPoint::new("temperature", 21.0).with_unit("C"),
//!     DataPoint::new("temperature", 23.0).with_unit("C"),
//! ];
//! let payloads = aggregator.aggregate(&points);
//! assert_eq!(payloads.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// ===========================================================================
// Modules
// ===========================================================================

pub mod payload;
pub mod policy;
pub mod window;

// ===========================================================================
// Re-exports
// ===========================================================================

pub use payload::{
    partition, AggregatedPayload, Aggregator, PassthroughEvent, EXTERNAL_ID_TYPE, GATEWAY_TYPE,
};
pub use policy::AggregationPolicy;
pub use window::{window_start, AggregationWindow, SeriesSample, WindowKey};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
