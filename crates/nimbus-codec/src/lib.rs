// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # nimbus-codec
//!
//! Bidirectional codec for the platform's comma-delimited template protocol.
//!
//! Outbound, the codec renders typed gateway state into wire strings: device
//! inventory, measurements, alarms, events, and operation lifecycle
//! acknowledgements. Inbound, it classifies platform payloads by their
//! leading template id and extracts positional fields, including the
//! free-text device command grammar and escaped configuration blobs.
//!
//! The codec is pure computation: no IO, no clocks beyond the timestamps it
//! is handed, and no panics on malformed input.
//!
//! ## Example
//!
//! ```
//! use nimbus_codec::{parse, render};
//! use nimbus_core::types::TagValue;
//!
//! let wire = render::measurement("T", "S", &TagValue::Int(1), None, None);
//! assert_eq!(wire, "200,\"T\",S,1");
//!
//! let inbound = parse::classify("510,gw-1").unwrap();
//! assert_eq!(inbound.device(), Some("gw-1"));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod parse;
pub mod render;
pub mod template;

pub use parse::{
    classify, operation_kind_hint, parse_config_lines, parse_credentials, parse_device_command,
    parse_tag_value, DeviceCommand, InboundMessage,
};
pub use render::AlarmSeverity;
pub use template::{split_fields, TemplateMessage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
