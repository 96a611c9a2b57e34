// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Codec Integration Tests
//!
//! Integration tests for nimbus-codec functionality including:
//!
//! - Outbound template rendering (identity, telemetry, operations)
//! - Inbound classification and priority order
//! - Device command and configuration blob parsing
//! - Credential response parsing
//!
//! ## Test Categories
//!
//! - `test_render_*`: outbound template rendering
//! - `test_classify_*`: inbound message classification
//! - `test_command_*`: device command parsing
//! - `test_credentials_*`: credential response parsing

use chrono::{TimeZone, Utc};

use nimbus_codec::parse::{
    classify, operation_kind_hint, parse_config_lines, parse_credentials, parse_device_command,
    parse_tag_value, DeviceCommand, InboundMessage,
};
use nimbus_codec::template::{escape_text, unescape_text};
use nimbus_codec::{render, split_fields};
use nimbus_core::error::CodecError;
use nimbus_core::operation::OperationKind;
use nimbus_core::types::{TagKind, TagValue};

use nimbus_tests::common::assertions::TemplateAssertions;
use nimbus_tests::common::fixtures::{GatewayFixtures, PayloadFixtures, PointFixtures};

// =============================================================================
// Outbound Rendering
// =============================================================================

#[test]
fn test_render_time_is_millisecond_utc() {
    let time = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 5).unwrap();
    assert_eq!(render::render_time(time), "2025-06-01T08:00:05.000Z");
}

#[test]
fn test_render_device_identity_announcements() {
    assert_eq!(
        render::create_device("Line 4 Gateway", "nimbus_gateway"),
        "100,Line 4 Gateway,nimbus_gateway"
    );

    let hardware = GatewayFixtures::hardware();
    assert_eq!(render::hardware(&hardware), "110,SN-44120,NIMBUS Gateway,3");

    let firmware = GatewayFixtures::firmware();
    assert_eq!(render::firmware(&firmware), "115,nimbus,0.3.0,");
}

#[test]
fn test_render_supported_operations_in_announce_order() {
    let wire = render::supported_operations(&OperationKind::ALL);
    assert_eq!(
        wire,
        "114,nb_Restart,nb_Configuration,nb_Command,nb_Firmware"
    );
}

#[test]
fn test_render_software_list_flattens_triples() {
    let wire = render::software_list(&GatewayFixtures::software());
    wire.assert_template_id(116);
    wire.assert_field_count(7);
    wire.assert_field(1, "collector");
    wire.assert_field(2, "1.4.2");
    wire.assert_field(4, "watchdog");
}

#[test]
fn test_render_configuration_snapshot_travels_as_one_field() {
    let wire = render::configuration_snapshot("interval=30\npolicy=last");
    let fields = wire.template_fields();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[1], "interval=30\\npolicy=last");
}

#[test]
fn test_render_measurement_quotes_fragment() {
    let wire = render::measurement(
        "boiler",
        "temperature",
        &TagValue::Float(21.5),
        Some("C"),
        Some(PointFixtures::at(5)),
    );
    assert_eq!(
        wire,
        "200,\"boiler\",temperature,21.5,C,2025-06-01T08:00:05.000Z"
    );
}

#[test]
fn test_render_measurement_unit_and_time_are_a_tail_pair() {
    // Without a unit the time is dropped too, never sent in its place.
    let wire = render::measurement(
        "boiler",
        "temperature",
        &TagValue::Float(21.5),
        None,
        Some(PointFixtures::at(5)),
    );
    assert_eq!(wire, "200,\"boiler\",temperature,21.5");
}

#[test]
fn test_render_measurement_booleans_as_numbers() {
    let wire = render::measurement("pump", "running", &TagValue::Bool(true), None, None);
    wire.assert_field(3, "1");
}

#[test]
fn test_render_alarms_use_severity_templates() {
    let time = PointFixtures::at(0);
    let critical = render::alarm(
        render::AlarmSeverity::Critical,
        "overtemp",
        "Boiler above limit",
        time,
    );
    critical.assert_template_id(301);

    let warning = render::alarm(render::AlarmSeverity::Warning, "drift", "Sensor drift", time);
    warning.assert_template_id(304);

    assert_eq!(render::clear_alarm("overtemp"), "306,overtemp");
}

#[test]
fn test_render_event_carries_type_text_and_time() {
    let wire = render::event("gateway_started", "relay up", PointFixtures::at(0));
    assert_eq!(wire, "400,gateway_started,relay up,2025-06-01T08:00:00.000Z");
}

#[test]
fn test_render_operation_lifecycle_messages() {
    assert_eq!(render::request_pending_operations(), "500");
    assert_eq!(
        render::operation_executing(OperationKind::Restart),
        "501,nb_Restart"
    );
    assert_eq!(
        render::operation_failed(OperationKind::Command, "unsupported operation"),
        "502,nb_Command,unsupported operation"
    );
    assert_eq!(
        render::operation_successful(OperationKind::Firmware, &[]),
        "503,nb_Firmware"
    );
}

#[test]
fn test_render_quoting_round_trips_through_splitter() {
    let wire = render::event("note", "comma, inside \"quotes\"", PointFixtures::at(0));
    let fields = split_fields(&wire);
    assert_eq!(fields[2], "comma, inside \"quotes\"");
}

// =============================================================================
// Inbound Classification
// =============================================================================

#[test]
fn test_classify_error_response_wins_over_operations() {
    // "41,510,..." names template 510 but is an error response about it.
    let message = classify(&PayloadFixtures::error_response()).unwrap();
    assert_eq!(
        message,
        InboundMessage::ErrorResponse {
            template: "510".to_string(),
            reason: "No such operation queued".to_string(),
        }
    );
    assert_eq!(message.operation_kind(), None);
}

#[test]
fn test_classify_restart() {
    let message = classify(&PayloadFixtures::restart()).unwrap();
    assert_eq!(
        message,
        InboundMessage::Restart {
            device: "gw-7731".to_string()
        }
    );
    assert_eq!(message.operation_kind(), Some(OperationKind::Restart));
    assert_eq!(message.device(), Some("gw-7731"));
}

#[test]
fn test_classify_run_command_keeps_unquoted_commas() {
    let message = classify("511,gw-7731,set counter 1,2,3").unwrap();
    assert_eq!(
        message,
        InboundMessage::RunCommand {
            device: "gw-7731".to_string(),
            command: "set counter 1,2,3".to_string(),
        }
    );
}

#[test]
fn test_classify_configuration_unescapes_blob() {
    let payload = PayloadFixtures::set_configuration("interval=60\npolicy=max");
    let message = classify(&payload).unwrap();
    assert_eq!(
        message,
        InboundMessage::SetConfiguration {
            device: "gw-7731".to_string(),
            blob: "interval=60\npolicy=max".to_string(),
        }
    );
}

#[test]
fn test_classify_firmware_requires_all_fields() {
    let payload = PayloadFixtures::install_firmware("boiler-fw", "2.1.0", "https://img.example.com");
    let message = classify(&payload).unwrap();
    assert_eq!(message.operation_kind(), Some(OperationKind::Firmware));

    let truncated = classify("515,gw-7731,boiler-fw,2.1.0");
    assert!(matches!(truncated, Err(CodecError::Format { .. })));
}

#[test]
fn test_classify_rejects_unknown_and_empty() {
    assert!(matches!(
        classify("999,gw-7731"),
        Err(CodecError::UnknownTemplate { .. })
    ));
    assert!(matches!(classify("   "), Err(CodecError::Format { .. })));
}

#[test]
fn test_classify_hint_names_the_operation_for_broken_bodies() {
    // "511,gw-7731" is missing its command but still names an operation.
    assert!(classify("511,gw-7731").is_err());
    assert_eq!(
        operation_kind_hint("511,gw-7731"),
        Some(OperationKind::Command)
    );
    assert_eq!(operation_kind_hint("999,gw-7731"), None);
}

// =============================================================================
// Device Commands
// =============================================================================

#[test]
fn test_command_set_and_setf() {
    assert_eq!(
        parse_device_command("set boiler/temperature 21.5").unwrap(),
        DeviceCommand::SetTag {
            tag: "boiler/temperature".to_string(),
            value: "21.5".to_string(),
        }
    );
    assert_eq!(
        parse_device_command("setf boiler temperature 42").unwrap(),
        DeviceCommand::SetFolderTag {
            tag: "boiler/temperature".to_string(),
            value: "42".to_string(),
        }
    );
}

#[test]
fn test_command_measurements_toggle() {
    assert_eq!(
        parse_device_command("measurements enable").unwrap(),
        DeviceCommand::Measurements { enabled: true }
    );
    assert_eq!(
        parse_device_command("measurements disable").unwrap(),
        DeviceCommand::Measurements { enabled: false }
    );
}

#[test]
fn test_command_unknown_verb_is_unsupported() {
    assert!(matches!(
        parse_device_command("reboot now"),
        Err(CodecError::UnknownTemplate { .. })
    ));
    assert!(parse_device_command("set onlytag").is_err());
}

#[test]
fn test_command_values_parse_by_tag_kind() {
    assert_eq!(
        parse_tag_value("true", TagKind::Bool).unwrap(),
        TagValue::Bool(true)
    );
    assert_eq!(
        parse_tag_value("0", TagKind::Bool).unwrap(),
        TagValue::Bool(false)
    );
    assert_eq!(
        parse_tag_value("42", TagKind::Int).unwrap(),
        TagValue::Int(42)
    );
    assert_eq!(
        parse_tag_value("21.5", TagKind::Float).unwrap(),
        TagValue::Float(21.5)
    );
    assert_eq!(
        parse_tag_value("ready", TagKind::Text).unwrap(),
        TagValue::Text("ready".to_string())
    );
    assert!(parse_tag_value("banana", TagKind::Int).is_err());
}

#[test]
fn test_command_config_lines_skip_noise() {
    let pairs = parse_config_lines("interval=60\n# comment\n\npolicy=max\nbroken line\n");
    assert_eq!(
        pairs,
        vec![
            ("interval".to_string(), "60".to_string()),
            ("policy".to_string(), "max".to_string()),
        ]
    );
}

// =============================================================================
// Text Escaping
// =============================================================================

#[test]
fn test_escaping_round_trips_blobs() {
    let blob = "interval=60\npath=C:\\nimbus\npolicy=last";
    assert_eq!(unescape_text(&escape_text(blob)), blob);
}

// =============================================================================
// Credentials
// =============================================================================

#[test]
fn test_credentials_parse_the_four_field_response() {
    let credentials = parse_credentials(&PayloadFixtures::credential_response()).unwrap();
    assert_eq!(credentials, GatewayFixtures::credentials());
}

#[test]
fn test_credentials_reject_malformed_responses() {
    // Wrong id, wrong arity, and empty fields all keep the loop waiting.
    assert!(parse_credentials("71,t,u,p").is_err());
    assert!(parse_credentials("70,t,u").is_err());
    assert!(parse_credentials("70,t,u,p,extra").is_err());
    assert!(parse_credentials("70,t,,p").is_err());
}
