// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Custom Test Assertions
//!
//! Domain-specific assertion helpers for NIMBUS integration tests.
//!
//! ## Design Principles
//!
//! - Provide clear, informative failure messages
//! - Operate directly on wire payloads so tests read like traffic captures

use nimbus_codec::split_fields;
use serde_json::Value;

// =============================================================================
// Template Payload Assertions
// =============================================================================

/// Assertion extensions for comma-delimited template payloads.
pub trait TemplateAssertions {
    /// The payload split into fields, quote-aware.
    fn template_fields(&self) -> Vec<String>;

    /// Assert the leading template id.
    fn assert_template_id(&self, expected: u16);

    /// Assert the field at `index` (0 is the template id).
    fn assert_field(&self, index: usize, expected: &str);

    /// Assert the total number of fields.
    fn assert_field_count(&self, expected: usize);
}

impl TemplateAssertions for str {
    fn template_fields(&self) -> Vec<String> {
        split_fields(self)
    }

    fn assert_template_id(&self, expected: u16) {
        let fields = self.template_fields();
        assert_eq!(
            fields[0],
            expected.to_string(),
            "Expected template {}, but payload was {:?}",
            expected,
            self
        );
    }

    fn assert_field(&self, index: usize, expected: &str) {
        let fields = self.template_fields();
        assert!(
            index < fields.len(),
            "Payload {:?} has no field {} (only {} fields)",
            self,
            index,
            fields.len()
        );
        assert_eq!(
            fields[index], expected,
            "Field {} of payload {:?} mismatched",
            index, self
        );
    }

    fn assert_field_count(&self, expected: usize) {
        let fields = self.template_fields();
        assert_eq!(
            fields.len(),
            expected,
            "Expected {} fields in payload {:?}, got {}",
            expected,
            self,
            fields.len()
        );
    }
}

// =============================================================================
// Aggregated Payload Assertions
// =============================================================================

/// Parses an aggregated wire payload back into JSON.
///
/// Panics with the offending payload when it is not valid JSON.
pub fn aggregated_json(wire: &str) -> Value {
    serde_json::from_str(wire)
        .unwrap_or_else(|e| panic!("Payload is not valid JSON ({}): {:?}", e, wire))
}

/// Extracts the reduced value of one series from an aggregated payload.
pub fn series_value(json: &Value, fragment: &str, series: &str) -> Value {
    let entry = &json[fragment][series];
    assert!(
        !entry.is_null(),
        "Payload carries no series {}/{}: {}",
        fragment,
        series,
        json
    );
    entry["value"].clone()
}

/// Asserts the reduced numeric value of one series, within `1e-9`.
pub fn assert_series_value(json: &Value, fragment: &str, series: &str, expected: f64) {
    let value = series_value(json, fragment, series);
    let actual = value
        .as_f64()
        .unwrap_or_else(|| panic!("Series {}/{} is not numeric: {}", fragment, series, value));
    assert!(
        (actual - expected).abs() < 1e-9,
        "Series {}/{}: expected {}, got {}",
        fragment,
        series,
        expected,
        actual
    );
}

/// Asserts the unit recorded for one series of an aggregated payload.
pub fn assert_series_unit(json: &Value, fragment: &str, series: &str, expected: &str) {
    assert_eq!(
        json[fragment][series]["unit"], expected,
        "Series {}/{} unit mismatched in {}",
        fragment, series, json
    );
}
