// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Builders
//!
//! Builder patterns for constructing complex test objects with sensible defaults.
//!
//! ## Design Principles
//!
//! - Sensible defaults for common test scenarios
//! - Chainable methods for fluent API
//! - Clear separation between required and optional fields

use chrono::{DateTime, Duration, Utc};

use nimbus_core::types::{DataPoint, TagValue};
use nimbus_link::InboundEnvelope;

use super::fixtures::PointFixtures;

// =============================================================================
// DataPoint Builder
// =============================================================================

/// Builder for constructing [`DataPoint`] instances with sensible defaults.
#[derive(Debug, Clone)]
pub struct DataPointBuilder {
    name: String,
    value: TagValue,
    unit: Option<String>,
    timestamp: DateTime<Utc>,
}

impl Default for DataPointBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DataPointBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            name: "boiler/temperature".to_string(),
            value: TagValue::Float(21.5),
            unit: None,
            timestamp: PointFixtures::base_time(),
        }
    }

    /// Set the point name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the value.
    pub fn value(mut self, value: impl Into<TagValue>) -> Self {
        self.value = value.into();
        self
    }

    /// Set a float value.
    pub fn float_value(mut self, v: f64) -> Self {
        self.value = TagValue::Float(v);
        self
    }

    /// Set an integer value.
    pub fn int_value(mut self, v: i64) -> Self {
        self.value = TagValue::Int(v);
        self
    }

    /// Set a boolean value.
    pub fn bool_value(mut self, v: bool) -> Self {
        self.value = TagValue::Bool(v);
        self
    }

    /// Set a text value.
    pub fn text_value(mut self, v: impl Into<String>) -> Self {
        self.value = TagValue::Text(v.into());
        self
    }

    /// Set the engineering unit.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the sample timestamp.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the sample timestamp to `seconds` after the fixture base time.
    pub fn at(mut self, seconds: i64) -> Self {
        self.timestamp = PointFixtures::at(seconds);
        self
    }

    /// Build the data point.
    pub fn build(self) -> DataPoint {
        let mut point = DataPoint::new(self.name, self.value).with_timestamp(self.timestamp);
        if let Some(unit) = self.unit {
            point = point.with_unit(unit);
        }
        point
    }
}

// =============================================================================
// Telemetry Batch Builder
// =============================================================================

/// Builder for a series of samples of one point, evenly spaced in time.
#[derive(Debug, Clone)]
pub struct TelemetryBatchBuilder {
    name: String,
    unit: Option<String>,
    start: DateTime<Utc>,
    spacing: Duration,
}

impl Default for TelemetryBatchBuilder {
    fn default() -> Self {
        Self::new("boiler/temperature")
    }
}

impl TelemetryBatchBuilder {
    /// Create a builder producing samples of the named point.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: None,
            start: PointFixtures::base_time(),
            spacing: Duration::seconds(1),
        }
    }

    /// Set the engineering unit for every sample.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the timestamp of the first sample.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Set the spacing between consecutive samples.
    pub fn spaced_by(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    /// Build one sample per value, in order.
    pub fn values(self, values: &[f64]) -> Vec<DataPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut point = DataPoint::new(self.name.clone(), *v)
                    .with_timestamp(self.start + self.spacing * i as i32);
                if let Some(unit) = &self.unit {
                    point = point.with_unit(unit.clone());
                }
                point
            })
            .collect()
    }

    /// Build one boolean sample per value, in order.
    pub fn bool_values(self, values: &[bool]) -> Vec<DataPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                DataPoint::new(self.name.clone(), *v)
                    .with_timestamp(self.start + self.spacing * i as i32)
            })
            .collect()
    }
}

// =============================================================================
// Envelope Builder
// =============================================================================

/// Builder for inbound envelopes arriving from the platform.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    topic: String,
    payload: String,
}

impl EnvelopeBuilder {
    /// Create a builder for the given payload on the default operation topic.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            topic: "tpl/ds".to_string(),
            payload: payload.into(),
        }
    }

    /// Set the topic the envelope arrived on.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Build the envelope.
    pub fn build(self) -> InboundEnvelope {
        InboundEnvelope::new(self.topic, self.payload)
    }
}
