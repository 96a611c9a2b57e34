// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Aggregated payload construction.
//!
//! The [`Aggregator`] turns a batch of sampled points into one JSON
//! payload per window. Text samples never aggregate; [`partition`]
//! splits them off first so the caller can relay each one as a basic
//! event.
//!
//! Payload shape for a 60 second window of gateway samples:
//!
//! ```json
//! {
//!   "time": "2025-06-01T08:00:00.000Z",
//!   "type": "gateway",
//!   "temperature": { "value": { "value": 21.5, "unit": "C" } }
//! }
//! ```
//!
//! Child windows additionally carry an `externalSource` object whose
//! `externalId` is the gateway identity joined to the child name with
//! an underscore.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use nimbus_core::error::{AggregateError, AggregateResult};
use nimbus_core::tagname::{TagName, DEFAULT_SERIES};
use nimbus_core::types::{DataPoint, TagValue};

use crate::policy::AggregationPolicy;
use crate::window::group_into_windows;

/// Identity type advertised in `externalSource` references.
pub const EXTERNAL_ID_TYPE: &str = "nb_Serial";

/// Payload type used for windows holding gateway samples.
pub const GATEWAY_TYPE: &str = "gateway";

// ===========================================================================
// Text passthrough
// ===========================================================================

/// A text sample lifted out of the aggregation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassthroughEvent {
    /// Child device the sample belongs to, `None` for the gateway.
    pub child_device: Option<String>,
    /// Event type derived from the sample's fragment and series.
    pub event_type: String,
    /// Sampled text.
    pub text: String,
    /// Moment the sample was taken.
    pub timestamp: DateTime<Utc>,
}

/// Splits a batch into aggregatable points and text events.
///
/// Text never averages or compares meaningfully, so every text sample
/// leaves the batch here and relays as an individual event. All other
/// samples pass through for windowing.
pub fn partition(points: Vec<DataPoint>) -> (Vec<DataPoint>, Vec<PassthroughEvent>) {
    let mut numeric = Vec::with_capacity(points.len());
    let mut events = Vec::new();
    for point in points {
        match &point.value {
            TagValue::Text(text) => {
                let tag = TagName::resolve_point(&point.name);
                events.push(PassthroughEvent {
                    child_device: tag.child_device,
                    event_type: event_type_for(&tag.fragment, &tag.series),
                    text: text.clone(),
                    timestamp: point.timestamp,
                });
            }
            _ => numeric.push(point),
        }
    }
    (numeric, events)
}

fn event_type_for(fragment: &str, series: &str) -> String {
    if series == DEFAULT_SERIES {
        fragment.to_string()
    } else {
        format!("{fragment}_{series}")
    }
}

// ===========================================================================
// Aggregator
// ===========================================================================

/// One JSON payload ready to relay, covering a single window.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedPayload {
    /// Aligned start of the window the payload covers.
    pub window_start: DateTime<Utc>,
    /// Child device the payload belongs to, `None` for the gateway.
    pub child_device: Option<String>,
    /// Payload body.
    pub json: Value,
}

impl AggregatedPayload {
    /// Serializes the payload for the wire.
    pub fn to_wire(&self) -> String {
        self.json.to_string()
    }
}

/// Reduces sample batches to one payload per window.
#[derive(Debug, Clone)]
pub struct Aggregator {
    policy: AggregationPolicy,
    window: chrono::Duration,
    host_id: String,
}

impl Aggregator {
    /// Creates an aggregator for the given policy and window length.
    pub fn new(
        policy: AggregationPolicy,
        window: std::time::Duration,
        host_id: impl Into<String>,
    ) -> AggregateResult<Self> {
        if window.is_zero() {
            return Err(AggregateError::invalid_window("window must be positive"));
        }
        let window = chrono::Duration::from_std(window)
            .map_err(|_| AggregateError::invalid_window("window out of range"))?;
        Ok(Aggregator {
            policy,
            window,
            host_id: host_id.into(),
        })
    }

    /// Policy this aggregator applies.
    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Windows a batch and reduces every series with the policy.
    ///
    /// Payloads come back ordered by window start, gateway windows
    /// before child windows of the same start. Text samples must be
    /// lifted out with [`partition`] beforehand; any that slip
    /// through are dropped by the numeric projection.
    pub fn aggregate(&self, points: &[DataPoint]) -> Vec<AggregatedPayload> {
        let mut payloads = Vec::new();
        for (key, window) in group_into_windows(points, self.window) {
            let mut root = Map::new();
            root.insert(
                "time".to_string(),
                json!(key.start.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
            match &key.child_device {
                Some(child) => {
                    root.insert("type".to_string(), json!(child));
                    root.insert(
                        "externalSource".to_string(),
                        json!({
                            "externalId": format!("{}_{}", self.host_id, child),
                            "type": EXTERNAL_ID_TYPE,
                        }),
                    );
                }
                None => {
                    root.insert("type".to_string(), json!(GATEWAY_TYPE));
                }
            }

            for (fragment, series_map) in window.fragments() {
                let mut fragment_obj = Map::new();
                for (series, samples) in series_map {
                    let Some(reduced) = self.policy.apply(samples) else {
                        continue;
                    };
                    let mut entry = Map::new();
                    entry.insert("value".to_string(), reduced.value.to_json());
                    if let Some(unit) = &reduced.unit {
                        entry.insert("unit".to_string(), json!(unit));
                    }
                    fragment_obj.insert(series.clone(), Value::Object(entry));
                }
                if !fragment_obj.is_empty() {
                    root.insert(fragment.clone(), Value::Object(fragment_obj));
                }
            }

            payloads.push(AggregatedPayload {
                window_start: key.start,
                child_device: key.child_device,
                json: Value::Object(root),
            });
        }
        payloads
    }
}

// ===========================================================================
// Tests
// ===========================================================================
