// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Aggregation Integration Tests
//!
//! Integration tests for nimbus-aggregate functionality including:
//!
//! - Reduction policies over window samples
//! - Window alignment and grouping
//! - Payload shape and routing metadata
//! - Text passthrough
//!
//! ## Test Categories
//!
//! - `test_policy_*`: per-policy reduction behavior
//! - `test_window_*`: window alignment and grouping
//! - `test_payload_*`: payload shape and routing
//! - `test_partition_*`: text passthrough

use std::time::Duration;

use chrono::{TimeZone, Utc};

use nimbus_aggregate::{partition, window_start, AggregationPolicy, Aggregator, EXTERNAL_ID_TYPE};
use nimbus_core::types::DataPoint;

use nimbus_tests::common::assertions::{
    aggregated_json, assert_series_unit, assert_series_value, series_value,
};
use nimbus_tests::common::builders::TelemetryBatchBuilder;
use nimbus_tests::common::fixtures::{GatewayFixtures, PointFixtures};

fn aggregator(policy: AggregationPolicy) -> Aggregator {
    Aggregator::new(
        policy,
        Duration::from_secs(60),
        GatewayFixtures::gateway_id(),
    )
    .unwrap()
}

// =============================================================================
// Policies
// =============================================================================

#[test]
fn test_policy_names_round_trip() {
    for policy in AggregationPolicy::ALL {
        assert_eq!(
            AggregationPolicy::from_value(policy.as_str()).unwrap(),
            policy
        );
    }
    assert!(AggregationPolicy::from_value("median").is_err());
    // Names are case-insensitive on the way in.
    assert_eq!(
        AggregationPolicy::from_value("AVERAGE").unwrap(),
        AggregationPolicy::Average
    );
}

#[test]
fn test_policy_first_and_last_follow_timestamps_not_input_order() {
    // Deliberately shuffled input.
    let points = vec![
        DataPoint::new("temperature", 23.0).with_timestamp(PointFixtures::at(40)),
        DataPoint::new("temperature", 21.0).with_timestamp(PointFixtures::at(5)),
        DataPoint::new("temperature", 22.0).with_timestamp(PointFixtures::at(20)),
    ];

    let first = aggregator(AggregationPolicy::First).aggregate(&points);
    assert_series_value(&first[0].json, "temperature", "value", 21.0);

    let last = aggregator(AggregationPolicy::Last).aggregate(&points);
    assert_series_value(&last[0].json, "temperature", "value", 23.0);
}

#[test]
fn test_policy_min_max_and_average() {
    let points = TelemetryBatchBuilder::new("boiler/temperature")
        .unit("C")
        .values(&[21.0, 24.0, 18.0, 25.0]);

    let min = aggregator(AggregationPolicy::Min).aggregate(&points);
    assert_series_value(&min[0].json, "boiler", "temperature", 18.0);

    let max = aggregator(AggregationPolicy::Max).aggregate(&points);
    assert_series_value(&max[0].json, "boiler", "temperature", 25.0);

    let average = aggregator(AggregationPolicy::Average).aggregate(&points);
    assert_series_value(&average[0].json, "boiler", "temperature", 22.0);
    assert_series_unit(&average[0].json, "boiler", "temperature", "C");
}

#[test]
fn test_policy_average_of_booleans_is_a_majority_vote() {
    let mostly_off = TelemetryBatchBuilder::new("pump/running")
        .bool_values(&[true, false, false]);
    let payloads = aggregator(AggregationPolicy::Average).aggregate(&mostly_off);
    assert_eq!(series_value(&payloads[0].json, "pump", "running"), 0);

    let mostly_on = TelemetryBatchBuilder::new("pump/running")
        .bool_values(&[true, true, false]);
    let payloads = aggregator(AggregationPolicy::Average).aggregate(&mostly_on);
    assert_eq!(series_value(&payloads[0].json, "pump", "running"), 1);
}

#[test]
fn test_policy_average_boolean_tie_reports_on() {
    let tied = TelemetryBatchBuilder::new("pump/running").bool_values(&[true, false]);
    let payloads = aggregator(AggregationPolicy::Average).aggregate(&tied);
    assert_eq!(series_value(&payloads[0].json, "pump", "running"), 1);
}

#[test]
fn test_policy_single_sample_passes_through_unchanged() {
    let points = vec![PointFixtures::temperature()];
    for policy in AggregationPolicy::ALL {
        let payloads = aggregator(policy).aggregate(&points);
        assert_series_value(&payloads[0].json, "boiler", "temperature", 21.5);
    }
}

#[test]
fn test_policy_average_over_mixed_units_keeps_the_latest_sample_unit() {
    let points = vec![
        DataPoint::new("temperature", 70.0)
            .with_unit("F")
            .with_timestamp(PointFixtures::at(1)),
        DataPoint::new("temperature", 21.5)
            .with_unit("C")
            .with_timestamp(PointFixtures::at(30)),
    ];
    let payloads = aggregator(AggregationPolicy::Average).aggregate(&points);
    assert_series_value(&payloads[0].json, "temperature", "value", 45.75);
    assert_series_unit(&payloads[0].json, "temperature", "value", "C");
}

// =============================================================================
// Windows
// =============================================================================

#[test]
fn test_window_start_aligns_to_epoch_multiples() {
    let inside = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 42).unwrap();
    let aligned = window_start(inside, chrono::Duration::seconds(60));
    assert_eq!(aligned, Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap());

    // An already aligned instant stays put.
    assert_eq!(window_start(aligned, chrono::Duration::seconds(60)), aligned);
}

#[test]
fn test_window_batches_split_per_period() {
    let points = TelemetryBatchBuilder::new("temperature")
        .spaced_by(chrono::Duration::seconds(45))
        .values(&[1.0, 2.0, 3.0]);

    // Samples at +0s, +45s, +90s: two windows of 60s.
    let payloads = aggregator(AggregationPolicy::Last).aggregate(&points);
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0].window_start, PointFixtures::at(0));
    assert_eq!(payloads[1].window_start, PointFixtures::at(60));
    assert_series_value(&payloads[0].json, "temperature", "value", 2.0);
    assert_series_value(&payloads[1].json, "temperature", "value", 3.0);
}

#[test]
fn test_window_same_period_splits_per_child() {
    let points = vec![
        DataPoint::new("temperature", 21.0).with_timestamp(PointFixtures::at(5)),
        DataPoint::new("press-01/motor/rpm", 1400).with_timestamp(PointFixtures::at(6)),
        DataPoint::new("boiler-02/motor/rpm", 900).with_timestamp(PointFixtures::at(7)),
    ];
    let payloads = aggregator(AggregationPolicy::Last).aggregate(&points);
    assert_eq!(payloads.len(), 3);
    // Gateway windows come before child windows of the same start.
    assert_eq!(payloads[0].child_device, None);
    assert_eq!(payloads[1].child_device.as_deref(), Some("boiler-02"));
    assert_eq!(payloads[2].child_device.as_deref(), Some("press-01"));
}

#[test]
fn test_window_empty_batch_produces_no_payloads() {
    assert!(aggregator(AggregationPolicy::Last).aggregate(&[]).is_empty());
}

// =============================================================================
// Payload Shape
// =============================================================================

#[test]
fn test_payload_gateway_shape_over_the_wire() {
    let points = TelemetryBatchBuilder::new("boiler/temperature")
        .unit("C")
        .values(&[21.0, 23.0]);
    let payloads = aggregator(AggregationPolicy::Average).aggregate(&points);

    let json = aggregated_json(&payloads[0].to_wire());
    assert_eq!(json["time"], "2025-06-01T08:00:00.000Z");
    assert_eq!(json["type"], "gateway");
    assert!(json.get("externalSource").is_none());
    assert_series_value(&json, "boiler", "temperature", 22.0);
}

#[test]
fn test_payload_child_shape_carries_external_source() {
    let points = vec![DataPoint::new("press-01/motor/rpm", 1400).with_timestamp(PointFixtures::at(5))];
    let payloads = aggregator(AggregationPolicy::Last).aggregate(&points);

    let json = aggregated_json(&payloads[0].to_wire());
    assert_eq!(json["type"], "press-01");
    assert_eq!(json["externalSource"]["externalId"], "gw-7731_press-01");
    assert_eq!(json["externalSource"]["type"], EXTERNAL_ID_TYPE);
}

#[test]
fn test_payload_groups_series_under_their_fragment() {
    let points = vec![
        DataPoint::new("motor/rpm", 1400).with_timestamp(PointFixtures::at(1)),
        DataPoint::new("motor/torque", 80.5).with_timestamp(PointFixtures::at(2)),
        DataPoint::new("temperature", 21.0).with_timestamp(PointFixtures::at(3)),
    ];
    let payloads = aggregator(AggregationPolicy::Last).aggregate(&points);
    let json = &payloads[0].json;

    assert_eq!(series_value(json, "motor", "rpm"), 1400);
    assert_eq!(series_value(json, "motor", "torque"), 80.5);
    assert_eq!(series_value(json, "temperature", "value"), 21.0);
}

// =============================================================================
// Text Passthrough
// =============================================================================

#[test]
fn test_partition_lifts_text_out_of_the_batch() {
    let (numeric, events) = partition(PointFixtures::mixed_batch());
    assert_eq!(numeric.len(), 3);
    assert_eq!(events.len(), 1);

    let event = &events[0];
    assert_eq!(event.child_device.as_deref(), Some("press-01"));
    assert_eq!(event.event_type, "operator_note");
    assert_eq!(event.text, "shift handover");
}

#[test]
fn test_partition_event_type_omits_default_series() {
    let points = vec![
        DataPoint::new("status", "ready").with_timestamp(PointFixtures::at(1)),
        DataPoint::new("door/state", "open").with_timestamp(PointFixtures::at(2)),
    ];
    let (_, events) = partition(points);
    assert_eq!(events[0].event_type, "status");
    assert_eq!(events[1].event_type, "door_state");
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_aggregator_rejects_zero_windows() {
    assert!(Aggregator::new(AggregationPolicy::Last, Duration::ZERO, "gw").is_err());
}
