// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Relay Integration Tests
//!
//! Integration tests for the data relay loop wired against the full rig:
//!
//! - Routing of aggregated, plain, and event traffic
//! - Backlog ordering and bounded retry queue
//! - Cycle gates and recovery
//! - Background loop lifecycle
//!
//! ## Test Categories
//!
//! - `test_relay_routing_*`: topic and payload routing
//! - `test_relay_backlog_*`: pending queue behavior
//! - `test_relay_gate_*`: cycle gates and recovery
//! - `test_relay_loop_*`: start/shutdown lifecycle

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use nimbus_core::types::DataPoint;
use nimbus_relay::RelayConfig;

use nimbus_tests::common::assertions::{aggregated_json, assert_series_value};
use nimbus_tests::common::fixtures::PointFixtures;
use nimbus_tests::common::harness::{with_timeout, GatewayRig};
use nimbus_tests::common::init_test_logging;
use nimbus_tests::common::mocks::MockSampleSource;

// =============================================================================
// Routing
// =============================================================================

#[tokio::test]
async fn test_relay_routing_gateway_window_before_child_window() {
    init_test_logging();
    let rig = GatewayRig::new();
    let source = Arc::new(MockSampleSource::with_batch(vec![
        DataPoint::new("press-01/motor/rpm", 1400).with_timestamp(PointFixtures::at(0)),
        DataPoint::new("boiler/temperature", 21.5)
            .with_unit("C")
            .with_timestamp(PointFixtures::at(0)),
    ]));
    let relay = rig.relay(source, RelayConfig::for_testing());

    relay.cycle_once().await;

    let published = rig.link.published();
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|(topic, _)| topic == "jsn/us"));

    let gateway = aggregated_json(&published[0].1);
    assert_eq!(gateway["type"], "gateway");
    assert_series_value(&gateway, "boiler", "temperature", 21.5);

    let child = aggregated_json(&published[1].1);
    assert_eq!(child["type"], "press-01");
    assert_eq!(child["externalSource"]["externalId"], "gw-7731_press-01");
    assert_series_value(&child, "motor", "rpm", 1400.0);
}

#[tokio::test]
async fn test_relay_routing_plain_mode_uses_child_template_topics() {
    init_test_logging();
    let rig = GatewayRig::new();
    let source = Arc::new(MockSampleSource::with_batch(vec![
        DataPoint::new("boiler/temperature", 21.5)
            .with_unit("C")
            .with_timestamp(PointFixtures::at(0)),
        DataPoint::new("press-01/motor/rpm", 1400)
            .with_unit("rpm")
            .with_timestamp(PointFixtures::at(0)),
    ]));
    let config = RelayConfig::builder()
        .enable_aggregation(false)
        .build();
    let relay = rig.relay(source, config);

    relay.cycle_once().await;

    let published = rig.link.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].0, "tpl/us");
    assert!(published[0].1.starts_with("200,\"boiler\",temperature,21.5,C,"));
    assert_eq!(published[1].0, "tpl/us/press-01");
    assert!(published[1].1.starts_with("200,\"motor\",rpm,1400,rpm,"));
}

#[tokio::test]
async fn test_relay_routing_text_samples_relay_as_events() {
    init_test_logging();
    let rig = GatewayRig::new();
    let source = Arc::new(MockSampleSource::with_batch(PointFixtures::mixed_batch()));
    let relay = rig.relay(source, RelayConfig::for_testing());

    relay.cycle_once().await;

    // The operator note leaves the batch as an event; the numeric samples
    // aggregate into one gateway window.
    let topics = rig.link.topics();
    assert!(topics.contains(&"tpl/us/press-01".to_string()));
    assert!(topics.contains(&"jsn/us".to_string()));

    let event = rig
        .link
        .published()
        .into_iter()
        .find(|(topic, _)| topic == "tpl/us/press-01")
        .expect("operator note was not published");
    assert!(event.1.starts_with("400,operator_note,shift handover,"));
}

// =============================================================================
// Backlog
// =============================================================================

#[tokio::test]
async fn test_relay_backlog_drains_before_fresh_telemetry() {
    init_test_logging();
    let rig = GatewayRig::new();
    let source = Arc::new(MockSampleSource::with_batch(vec![DataPoint::new(
        "temperature",
        21.0,
    )
    .with_timestamp(PointFixtures::at(0))]));
    let relay = rig.relay(source.clone(), RelayConfig::for_testing());

    rig.link.fail_publishes.store(true, Ordering::SeqCst);
    relay.cycle_once().await;
    assert_eq!(relay.metrics().pending.current, 1);

    // The link recovers and a second batch arrives. The queued window must
    // go out ahead of the fresh one.
    rig.link.fail_publishes.store(false, Ordering::SeqCst);
    source.push_batch(vec![
        DataPoint::new("temperature", 25.0).with_timestamp(PointFixtures::at(90))
    ]);
    relay.cycle_once().await;

    let published = rig.link.published();
    assert_eq!(published.len(), 2);
    assert_series_value(&aggregated_json(&published[0].1), "temperature", "value", 21.0);
    assert_series_value(&aggregated_json(&published[1].1), "temperature", "value", 25.0);
    assert_eq!(relay.metrics().pending.current, 0);
}

#[tokio::test]
async fn test_relay_backlog_overflow_drops_oldest_message() {
    init_test_logging();
    let rig = GatewayRig::new();
    let source = Arc::new(MockSampleSource::with_batch(vec![
        DataPoint::new("status", "one").with_timestamp(PointFixtures::at(0)),
        DataPoint::new("status", "two").with_timestamp(PointFixtures::at(1)),
        DataPoint::new("status", "three").with_timestamp(PointFixtures::at(2)),
    ]));
    let config = RelayConfig::builder().pending_limit(2).build();
    let relay = rig.relay(source, config);

    rig.link.fail_publishes.store(true, Ordering::SeqCst);
    relay.cycle_once().await;

    let metrics = relay.metrics();
    assert_eq!(metrics.publish_failures, 3);
    assert_eq!(metrics.pending.dropped, 1);
    assert_eq!(metrics.pending.current, 2);

    rig.link.fail_publishes.store(false, Ordering::SeqCst);
    relay.cycle_once().await;

    // The oldest event was sacrificed; the surviving two go out in order.
    let payloads = rig.link.payloads();
    assert_eq!(payloads.len(), 2);
    assert!(payloads[0].starts_with("400,status,two,"));
    assert!(payloads[1].starts_with("400,status,three,"));
}

// =============================================================================
// Gates
// =============================================================================

#[tokio::test]
async fn test_relay_gate_memory_floor_recovers_after_pressure_clears() {
    init_test_logging();
    let rig = GatewayRig::new();
    rig.probe.set_available(Some(1024));
    let source = Arc::new(MockSampleSource::with_batch(vec![DataPoint::new(
        "temperature",
        21.0,
    )
    .with_timestamp(PointFixtures::at(0))]));
    let config = RelayConfig::builder()
        .memory_floor_bytes(16 * 1024 * 1024)
        .build();
    let relay = rig.relay(source.clone(), config);

    relay.cycle_once().await;
    assert_eq!(source.pull_calls.load(Ordering::SeqCst), 0);
    assert_eq!(rig.probe.hints.load(Ordering::SeqCst), 1);
    assert_eq!(relay.metrics().skipped_low_memory, 1);

    rig.probe.set_available(Some(64 * 1024 * 1024));
    relay.cycle_once().await;
    assert_eq!(rig.link.published().len(), 1);
}

#[tokio::test]
async fn test_relay_gate_disabled_measurements_hold_the_batch() {
    init_test_logging();
    let rig = GatewayRig::new();
    rig.measurements.store(false, Ordering::SeqCst);
    let source = Arc::new(MockSampleSource::with_batch(vec![DataPoint::new(
        "temperature",
        21.0,
    )
    .with_timestamp(PointFixtures::at(0))]));
    let relay = rig.relay(source.clone(), RelayConfig::for_testing());

    relay.cycle_once().await;
    assert_eq!(source.fresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(relay.metrics().skipped_disabled, 1);

    // Nothing was lost while disabled; re-enabling relays the held batch.
    rig.measurements.store(true, Ordering::SeqCst);
    relay.cycle_once().await;
    assert_eq!(relay.metrics().points_pulled, 1);
    assert_eq!(rig.link.published().len(), 1);
}

#[tokio::test]
async fn test_relay_gate_invalidated_cursor_reopens_and_catches_up() {
    init_test_logging();
    let rig = GatewayRig::new();
    let source = Arc::new(MockSampleSource::with_batch(vec![DataPoint::new(
        "temperature",
        21.0,
    )
    .with_timestamp(PointFixtures::at(0))]));
    source.queue_failures([nimbus_core::error::SourceError::cursor_invalid(
        "span compacted away",
    )]);
    let relay = rig.relay(source.clone(), RelayConfig::for_testing());

    relay.cycle_once().await;
    assert_eq!(relay.metrics().cursor_resets, 1);
    assert!(rig.link.published().is_empty());

    relay.cycle_once().await;
    assert_eq!(source.fresh_calls.load(Ordering::SeqCst), 2);
    assert_eq!(rig.link.published().len(), 1);
}

#[tokio::test]
async fn test_relay_gate_lagging_source_warns_but_relays() {
    init_test_logging();
    let rig = GatewayRig::new();
    let source = Arc::new(MockSampleSource::with_batch(vec![DataPoint::new(
        "temperature",
        21.0,
    )
    .with_timestamp(PointFixtures::at(0))]));
    source.set_lag(Duration::from_secs(900));
    let relay = rig.relay(source, RelayConfig::for_testing());

    relay.cycle_once().await;

    assert_eq!(rig.link.published().len(), 1);
    assert_eq!(relay.metrics().publish_failures, 0);
}

// =============================================================================
// Loop Lifecycle
// =============================================================================

#[tokio::test]
async fn test_relay_loop_runs_until_shutdown() {
    init_test_logging();
    let rig = GatewayRig::new();
    let source = Arc::new(MockSampleSource::with_batch(vec![DataPoint::new(
        "temperature",
        21.0,
    )
    .with_timestamp(PointFixtures::at(0))]));
    let relay = Arc::new(rig.relay(source, RelayConfig::for_testing()));
    let shutdown = Arc::new(Notify::new());

    let handle = relay.clone().start(shutdown.clone());
    assert!(relay.is_running());

    with_timeout(Duration::from_secs(5), async {
        while rig.link.published().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    shutdown.notify_one();
    with_timeout(Duration::from_secs(5), handle)
        .await
        .expect("relay task panicked");
    assert!(!relay.is_running());
}

#[tokio::test]
async fn test_relay_loop_drains_backlog_on_shutdown() {
    init_test_logging();
    let rig = GatewayRig::new();
    let source = Arc::new(MockSampleSource::with_batch(vec![DataPoint::new(
        "temperature",
        21.0,
    )
    .with_timestamp(PointFixtures::at(0))]));
    let relay = Arc::new(rig.relay(source, RelayConfig::for_testing()));
    let shutdown = Arc::new(Notify::new());

    rig.link.fail_publishes.store(true, Ordering::SeqCst);
    let handle = relay.clone().start(shutdown.clone());

    with_timeout(Duration::from_secs(5), async {
        while relay.metrics().pending.current == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    // The link comes back just as the gateway shuts down; the queued window
    // still makes it out.
    rig.link.fail_publishes.store(false, Ordering::SeqCst);
    shutdown.notify_one();
    with_timeout(Duration::from_secs(5), handle)
        .await
        .expect("relay task panicked");

    assert_eq!(rig.link.published().len(), 1);
    assert_eq!(relay.metrics().pending.current, 0);
}
