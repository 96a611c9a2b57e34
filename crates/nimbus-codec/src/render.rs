// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Outbound template rendering.
//!
//! One function per outbound template id. All functions are pure: they take
//! typed arguments and return the finished wire string. Field order and
//! quoting follow the platform's template registry; see [`crate::template`]
//! for the quoting rules.

use chrono::{DateTime, SecondsFormat, Utc};

use nimbus_core::operation::{OperationKind, OperationStatus};
use nimbus_core::types::{FirmwareInfo, HardwareInfo, SoftwareItem, TagValue};

use crate::template::{escape_text, ids, TemplateMessage};

// =============================================================================
// Timestamps
// =============================================================================

/// Renders a timestamp the way every template expects it.
pub fn render_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// =============================================================================
// Inventory
// =============================================================================

/// `100`: creates the gateway device with its display name and type.
pub fn create_device(name: &str, device_type: &str) -> String {
    TemplateMessage::new(ids::CREATE_DEVICE)
        .field(name)
        .field(device_type)
        .finish()
}

/// `110`: announces hardware identity.
pub fn hardware(info: &HardwareInfo) -> String {
    TemplateMessage::new(ids::HARDWARE)
        .field(&info.serial)
        .field(&info.model)
        .field(&info.revision)
        .finish()
}

/// `113`: pushes the full configuration snapshot as one quoted blob.
pub fn configuration_snapshot(blob: &str) -> String {
    TemplateMessage::new(ids::CONFIGURATION_SNAPSHOT)
        .quoted_field(&escape_text(blob))
        .finish()
}

/// `114`: announces the supported operation fragments.
pub fn supported_operations(kinds: &[OperationKind]) -> String {
    TemplateMessage::new(ids::SUPPORTED_OPERATIONS)
        .fields(kinds.iter().map(|k| k.fragment()))
        .finish()
}

/// `115`: announces the installed firmware.
pub fn firmware(info: &FirmwareInfo) -> String {
    TemplateMessage::new(ids::FIRMWARE)
        .field(&info.name)
        .field(&info.version)
        .field(&info.url)
        .finish()
}

/// `116`: announces installed software as name,version,url triples.
pub fn software_list(items: &[SoftwareItem]) -> String {
    let mut msg = TemplateMessage::new(ids::SOFTWARE_LIST);
    for item in items {
        msg = msg.field(&item.name).field(&item.version).field(&item.url);
    }
    msg.finish()
}

// =============================================================================
// Telemetry
// =============================================================================

/// `200`: renders one measurement sample.
///
/// The fragment is always quoted. Unit and time are a tail pair: the time
/// field is only rendered when a unit is present, so the two are absent
/// together.
pub fn measurement(
    fragment: &str,
    series: &str,
    value: &TagValue,
    unit: Option<&str>,
    time: Option<DateTime<Utc>>,
) -> String {
    let mut msg = TemplateMessage::new(ids::MEASUREMENT)
        .quoted_field(fragment)
        .field(series)
        .field(&render_value(value));

    if let Some(unit) = unit {
        msg = msg.field(unit);
        if let Some(time) = time {
            msg = msg.field(&render_time(time));
        }
    }
    msg.finish()
}

/// Alarm severities and their template ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmSeverity {
    /// Immediate action required.
    Critical,
    /// Major fault.
    Major,
    /// Minor fault.
    Minor,
    /// Advisory.
    Warning,
}

impl AlarmSeverity {
    fn template(&self) -> u16 {
        match self {
            AlarmSeverity::Critical => ids::ALARM_CRITICAL,
            AlarmSeverity::Major => ids::ALARM_MAJOR,
            AlarmSeverity::Minor => ids::ALARM_MINOR,
            AlarmSeverity::Warning => ids::ALARM_WARNING,
        }
    }
}

/// `301`..`304`: raises an alarm of the given severity.
///
/// The alarm text is always quoted.
pub fn alarm(severity: AlarmSeverity, alarm_type: &str, text: &str, time: DateTime<Utc>) -> String {
    TemplateMessage::new(severity.template())
        .field(alarm_type)
        .quoted_field(text)
        .field(&render_time(time))
        .finish()
}

/// `306`: clears the active alarm of the given type.
pub fn clear_alarm(alarm_type: &str) -> String {
    TemplateMessage::new(ids::ALARM_CLEAR)
        .field(alarm_type)
        .finish()
}

/// `400`: raises a basic event.
pub fn event(event_type: &str, text: &str, time: DateTime<Utc>) -> String {
    TemplateMessage::new(ids::EVENT)
        .field(event_type)
        .field(text)
        .field(&render_time(time))
        .finish()
}

// =============================================================================
// Operations
// =============================================================================

/// `500`: asks the platform for queued operations.
pub fn request_pending_operations() -> String {
    TemplateMessage::new(ids::REQUEST_PENDING).finish()
}

/// `501`: marks the operation EXECUTING.
pub fn operation_executing(kind: OperationKind) -> String {
    TemplateMessage::new(ids::OP_EXECUTING)
        .field(kind.fragment())
        .finish()
}

/// `502`: marks the operation FAILED with a reason.
pub fn operation_failed(kind: OperationKind, reason: &str) -> String {
    TemplateMessage::new(ids::OP_FAILED)
        .field(kind.fragment())
        .field(reason)
        .finish()
}

/// `503`: marks the operation SUCCESSFUL, with optional result parameters.
pub fn operation_successful(kind: OperationKind, params: &[&str]) -> String {
    TemplateMessage::new(ids::OP_SUCCESSFUL)
        .field(kind.fragment())
        .fields(params)
        .finish()
}

/// Renders the state message for any lifecycle transition.
pub fn operation_state(status: OperationStatus, kind: OperationKind, detail: &[&str]) -> String {
    match status {
        OperationStatus::Executing => operation_executing(kind),
        OperationStatus::Failed => {
            operation_failed(kind, detail.first().copied().unwrap_or_default())
        }
        OperationStatus::Successful => operation_successful(kind, detail),
    }
}

// =============================================================================
// Values
// =============================================================================

/// Renders a tag value for a template field.
///
/// Booleans render as `0`/`1`, matching their JSON encoding.
pub fn render_value(value: &TagValue) -> String {
    match value {
        TagValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn measurement_with_unit_and_time() {
        let wire = measurement(
            "T",
            "S",
            &TagValue::Int(1),
            Some("C"),
            Some(ts()),
        );
        assert_eq!(wire, format!("200,\"T\",S,1,C,{}", render_time(ts())));
    }

    #[test]
    fn measurement_without_unit_omits_time_too() {
        let wire = measurement("T", "S", &TagValue::Int(1), None, Some(ts()));
        assert_eq!(wire, "200,\"T\",S,1");
    }

    #[test]
    fn measurement_renders_bool_as_digit() {
        let wire = measurement("flags", "running", &TagValue::Bool(true), None, None);
        assert_eq!(wire, "200,\"flags\",running,1");
    }

    #[test]
    fn create_device_quotes_when_needed() {
        assert_eq!(create_device("gw-1", "gateway"), "100,gw-1,gateway");
        assert_eq!(
            create_device("Plant 4, East", "gateway"),
            "100,\"Plant 4, East\",gateway"
        );
    }

    #[test]
    fn hardware_renders_three_fields() {
        let info = HardwareInfo {
            serial: "SN-1000".into(),
            model: "NB-4".into(),
            revision: "rev2".into(),
        };
        assert_eq!(hardware(&info), "110,SN-1000,NB-4,rev2");
    }

    #[test]
    fn configuration_snapshot_is_quoted_and_escaped() {
        let wire = configuration_snapshot("a=1\nb=2");
        assert_eq!(wire, "113,\"a=1\\nb=2\"");
    }

    #[test]
    fn supported_operations_lists_fragments() {
        let wire = supported_operations(&OperationKind::ALL);
        assert_eq!(
            wire,
            "114,nb_Restart,nb_Configuration,nb_Command,nb_Firmware"
        );
    }

    #[test]
    fn software_list_renders_triples() {
        let items = vec![
            SoftwareItem {
                name: "relay".into(),
                version: "0.3.0".into(),
                url: "https://pkg/relay".into(),
            },
            SoftwareItem {
                name: "driver".into(),
                version: "1.2".into(),
                url: String::new(),
            },
        ];
        assert_eq!(
            software_list(&items),
            "116,relay,0.3.0,https://pkg/relay,driver,1.2,"
        );
    }

    #[test]
    fn alarms_use_severity_templates() {
        let wire = alarm(AlarmSeverity::Critical, "overheat", "too hot", ts());
        assert!(wire.starts_with("301,overheat,\"too hot\","));

        let wire = alarm(AlarmSeverity::Warning, "lag", "behind", ts());
        assert!(wire.starts_with("304,lag,\"behind\","));

        assert_eq!(clear_alarm("overheat"), "306,overheat");
    }

    #[test]
    fn event_renders_type_text_time() {
        let wire = event("gateway_started", "relay up", ts());
        assert_eq!(
            wire,
            format!("400,gateway_started,relay up,{}", render_time(ts()))
        );
    }

    #[test]
    fn operation_state_messages() {
        assert_eq!(request_pending_operations(), "500");
        assert_eq!(operation_executing(OperationKind::Restart), "501,nb_Restart");
        assert_eq!(
            operation_failed(OperationKind::Command, "device ID mismatch"),
            "502,nb_Command,device ID mismatch"
        );
        assert_eq!(
            operation_successful(OperationKind::Command, &["ok"]),
            "503,nb_Command,ok"
        );
        assert_eq!(
            operation_successful(OperationKind::Restart, &[]),
            "503,nb_Restart"
        );
    }

    #[test]
    fn operation_state_dispatches_by_status() {
        assert_eq!(
            operation_state(OperationStatus::Executing, OperationKind::Firmware, &[]),
            "501,nb_Firmware"
        );
        assert_eq!(
            operation_state(
                OperationStatus::Failed,
                OperationKind::Firmware,
                &["connection: timed out"]
            ),
            "502,nb_Firmware,connection: timed out"
        );
        assert_eq!(
            operation_state(OperationStatus::Successful, OperationKind::Firmware, &[]),
            "503,nb_Firmware"
        );
    }
}
