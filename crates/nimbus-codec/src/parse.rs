// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Inbound message classification and field extraction.
//!
//! Classification tests the leading numeric id in a fixed priority order:
//! error response, restart, run command, set configuration, install
//! firmware. Anything else is an unknown template, which callers log and
//! drop. A recognized id with missing required fields is a hard parse
//! failure; callers answer it with a FAILED acknowledgement instead of
//! crashing.
//!
//! Extraction is positional. Fields arrive through the quote-aware splitter
//! in [`crate::template`], so quoted command texts and configuration blobs
//! may contain commas and doubled quotes.

use nimbus_core::error::{CodecError, CodecResult};
use nimbus_core::operation::OperationKind;
use nimbus_core::tagname::TagName;
use nimbus_core::types::{LinkCredentials, TagKind, TagValue};

use crate::template::{ids, split_fields, unescape_text};

// =============================================================================
// Inbound Messages
// =============================================================================

/// A classified inbound platform message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// `41`: the platform rejected an earlier message.
    ErrorResponse {
        /// Template id of the rejected message, as sent by the platform.
        template: String,
        /// Human-readable reason.
        reason: String,
    },

    /// `510`: restart the gateway.
    Restart {
        /// Target device id.
        device: String,
    },

    /// `511`: run a device command.
    RunCommand {
        /// Target device id.
        device: String,
        /// Free-text command.
        command: String,
    },

    /// `513`: apply a configuration blob.
    SetConfiguration {
        /// Target device id.
        device: String,
        /// Multi-line `key=value` text, already unescaped.
        blob: String,
    },

    /// `515`: download and install firmware.
    InstallFirmware {
        /// Target device id.
        device: String,
        /// Firmware name.
        name: String,
        /// Firmware version.
        version: String,
        /// Download URL.
        url: String,
    },
}

impl InboundMessage {
    /// The operation kind this message drives, if any.
    pub fn operation_kind(&self) -> Option<OperationKind> {
        match self {
            InboundMessage::ErrorResponse { .. } => None,
            InboundMessage::Restart { .. } => Some(OperationKind::Restart),
            InboundMessage::RunCommand { .. } => Some(OperationKind::Command),
            InboundMessage::SetConfiguration { .. } => Some(OperationKind::Configuration),
            InboundMessage::InstallFirmware { .. } => Some(OperationKind::Firmware),
        }
    }

    /// The device id the message addresses, if it carries one.
    pub fn device(&self) -> Option<&str> {
        match self {
            InboundMessage::ErrorResponse { .. } => None,
            InboundMessage::Restart { device }
            | InboundMessage::RunCommand { device, .. }
            | InboundMessage::SetConfiguration { device, .. }
            | InboundMessage::InstallFirmware { device, .. } => Some(device),
        }
    }
}

/// Classifies one inbound payload.
///
/// Returns [`CodecError::UnknownTemplate`] for ids this gateway does not
/// handle and [`CodecError::Format`] when a recognized id is missing
/// required fields.
pub fn classify(payload: &str) -> CodecResult<InboundMessage> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(CodecError::format("empty payload"));
    }

    let fields = split_fields(payload);
    let id: u16 = fields[0]
        .parse()
        .map_err(|_| CodecError::unknown_template(fields[0].clone()))?;

    // Priority order is fixed; earlier arms win.
    match id {
        ids::ERROR_RESPONSE => {
            let template = require(&fields, 1, "template")?.to_string();
            let reason = fields.get(2).cloned().unwrap_or_default();
            Ok(InboundMessage::ErrorResponse { template, reason })
        }
        ids::RESTART => {
            let device = require(&fields, 1, "device")?.to_string();
            Ok(InboundMessage::Restart { device })
        }
        ids::RUN_COMMAND => {
            let device = require(&fields, 1, "device")?.to_string();
            require(&fields, 2, "command")?;
            // Unquoted commas after the command field belong to the command.
            let command = fields[2..].join(",");
            Ok(InboundMessage::RunCommand { device, command })
        }
        ids::SET_CONFIGURATION => {
            let device = require(&fields, 1, "device")?.to_string();
            require(&fields, 2, "configuration")?;
            let blob = unescape_text(&fields[2..].join(","));
            Ok(InboundMessage::SetConfiguration { device, blob })
        }
        ids::INSTALL_FIRMWARE => {
            let device = require(&fields, 1, "device")?.to_string();
            let name = require(&fields, 2, "name")?.to_string();
            let version = require(&fields, 3, "version")?.to_string();
            let url = require(&fields, 4, "url")?.to_string();
            Ok(InboundMessage::InstallFirmware {
                device,
                name,
                version,
                url,
            })
        }
        other => Err(CodecError::unknown_template(other.to_string())),
    }
}

/// Maps a payload's leading id to its operation kind without full parsing.
///
/// Used to acknowledge FAILED on payloads whose body did not parse.
pub fn operation_kind_hint(payload: &str) -> Option<OperationKind> {
    let id: u16 = payload.trim().split(',').next()?.parse().ok()?;
    match id {
        ids::RESTART => Some(OperationKind::Restart),
        ids::RUN_COMMAND => Some(OperationKind::Command),
        ids::SET_CONFIGURATION => Some(OperationKind::Configuration),
        ids::INSTALL_FIRMWARE => Some(OperationKind::Firmware),
        _ => None,
    }
}

fn require<'a>(fields: &'a [String], index: usize, name: &str) -> CodecResult<&'a str> {
    fields
        .get(index)
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CodecError::format(format!("missing field '{name}'")))
}

// =============================================================================
// Device Commands
// =============================================================================

/// A decoded `511` command text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// `set <tag> <value>`: typed write to one tag.
    SetTag {
        /// Target tag path.
        tag: String,
        /// Raw value text; parsed against the tag's declared kind.
        value: String,
    },

    /// `setf <folder> <tag> <value>`: typed write addressed by folder.
    SetFolderTag {
        /// Folder and tag rejoined into one path.
        tag: String,
        /// Raw value text.
        value: String,
    },

    /// `measurements enable|disable`: toggle measurement relaying.
    Measurements {
        /// Desired state.
        enabled: bool,
    },
}

/// Decodes the free-text command of a `511` message.
///
/// The text is split on spaces. Values may contain spaces; everything after
/// the addressed tag is the value.
pub fn parse_device_command(text: &str) -> CodecResult<DeviceCommand> {
    let tokens: Vec<&str> = text.split(' ').filter(|t| !t.is_empty()).collect();

    match tokens.as_slice() {
        ["set", tag, value @ ..] if !value.is_empty() => Ok(DeviceCommand::SetTag {
            tag: (*tag).to_string(),
            value: value.join(" "),
        }),
        ["setf", folder, tag, value @ ..] if !value.is_empty() => Ok(DeviceCommand::SetFolderTag {
            tag: TagName::join(folder, tag),
            value: value.join(" "),
        }),
        ["measurements", "enable"] => Ok(DeviceCommand::Measurements { enabled: true }),
        ["measurements", "disable"] => Ok(DeviceCommand::Measurements { enabled: false }),
        ["measurements", other] => Err(CodecError::invalid_field(
            "measurements",
            format!("expected enable|disable, got '{other}'"),
        )),
        [] => Err(CodecError::format("empty command")),
        [verb, ..] => Err(CodecError::unknown_template(*verb)),
    }
}

// =============================================================================
// Typed Values
// =============================================================================

/// Parses a raw value text against a tag's declared kind.
///
/// Booleans accept `true`/`false` in any case plus `0`/`1`.
pub fn parse_tag_value(raw: &str, kind: TagKind) -> CodecResult<TagValue> {
    match kind {
        TagKind::Bool => {
            let trimmed = raw.trim();
            if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
                Ok(TagValue::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
                Ok(TagValue::Bool(false))
            } else {
                Err(CodecError::invalid_field(
                    "value",
                    format!("'{raw}' is not a boolean"),
                ))
            }
        }
        TagKind::Int => raw
            .trim()
            .parse::<i64>()
            .map(TagValue::Int)
            .map_err(|e| CodecError::invalid_field("value", format!("'{raw}': {e}"))),
        TagKind::Float => raw
            .trim()
            .parse::<f64>()
            .map(TagValue::Float)
            .map_err(|e| CodecError::invalid_field("value", format!("'{raw}': {e}"))),
        TagKind::Text => Ok(TagValue::Text(raw.to_string())),
    }
}

// =============================================================================
// Configuration Blobs
// =============================================================================

/// Splits an unescaped configuration blob into `key=value` pairs.
///
/// Lines without `=`, empty lines, and comments are skipped; the caller
/// decides which keys it recognizes.
pub fn parse_config_lines(blob: &str) -> Vec<(String, String)> {
    blob.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

// =============================================================================
// Credentials
// =============================================================================

/// Parses the 4-field credential response from the provisioning channel.
///
/// Anything other than exactly `70,tenant,username,password` is rejected;
/// the provisioning loop keeps waiting on rejection.
pub fn parse_credentials(payload: &str) -> CodecResult<LinkCredentials> {
    let fields = split_fields(payload.trim());
    if fields.len() != 4 || fields[0].parse::<u16>() != Ok(ids::CREDENTIALS) {
        return Err(CodecError::format(format!(
            "expected 4-field credential response, got {} fields",
            fields.len()
        )));
    }
    if fields[1..].iter().any(|f| f.is_empty()) {
        return Err(CodecError::format("credential response has empty fields"));
    }
    Ok(LinkCredentials::new(
        fields[1].clone(),
        fields[2].clone(),
        fields[3].clone(),
    ))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_error_response() {
        let msg = classify("41,200,No template for X").expect("classify");
        assert_eq!(
            msg,
            InboundMessage::ErrorResponse {
                template: "200".into(),
                reason: "No template for X".into(),
            }
        );
        assert_eq!(msg.operation_kind(), None);
    }

    #[test]
    fn classifies_restart() {
        let msg = classify("510,gw-1").expect("classify");
        assert_eq!(msg, InboundMessage::Restart { device: "gw-1".into() });
        assert_eq!(msg.operation_kind(), Some(OperationKind::Restart));
        assert_eq!(msg.device(), Some("gw-1"));
    }

    #[test]
    fn classifies_run_command_with_quoted_text() {
        let msg = classify("511,gw-1,\"set boiler/limit 42\"").expect("classify");
        assert_eq!(
            msg,
            InboundMessage::RunCommand {
                device: "gw-1".into(),
                command: "set boiler/limit 42".into(),
            }
        );
    }

    #[test]
    fn run_command_keeps_unquoted_commas() {
        let msg = classify("511,gw-1,set note/text a,b").expect("classify");
        assert_eq!(
            msg,
            InboundMessage::RunCommand {
                device: "gw-1".into(),
                command: "set note/text a,b".into(),
            }
        );
    }

    #[test]
    fn classifies_set_configuration_and_unescapes() {
        let msg = classify("513,gw-1,\"interval=30\\npolicy=last\"").expect("classify");
        assert_eq!(
            msg,
            InboundMessage::SetConfiguration {
                device: "gw-1".into(),
                blob: "interval=30\npolicy=last".into(),
            }
        );
    }

    #[test]
    fn classifies_install_firmware() {
        let msg = classify("515,gw-1,core,2.1.0,https://fw/core-2.1.0.bin").expect("classify");
        assert_eq!(
            msg,
            InboundMessage::InstallFirmware {
                device: "gw-1".into(),
                name: "core".into(),
                version: "2.1.0".into(),
                url: "https://fw/core-2.1.0.bin".into(),
            }
        );
    }

    #[test]
    fn unknown_ids_are_reported_not_crashed() {
        let err = classify("999,whatever").expect_err("unknown id");
        assert!(matches!(err, CodecError::UnknownTemplate { .. }));

        let err = classify("garbage").expect_err("non-numeric id");
        assert!(matches!(err, CodecError::UnknownTemplate { .. }));
    }

    #[test]
    fn short_messages_are_format_errors() {
        assert!(matches!(
            classify("510").expect_err("missing device"),
            CodecError::Format { .. }
        ));
        assert!(matches!(
            classify("511,gw-1").expect_err("missing command"),
            CodecError::Format { .. }
        ));
        assert!(matches!(
            classify("515,gw-1,core,2.1.0").expect_err("missing url"),
            CodecError::Format { .. }
        ));
        assert!(matches!(
            classify("").expect_err("empty"),
            CodecError::Format { .. }
        ));
    }

    #[test]
    fn kind_hint_survives_malformed_bodies() {
        assert_eq!(operation_kind_hint("510"), Some(OperationKind::Restart));
        assert_eq!(operation_kind_hint("511,gw-1"), Some(OperationKind::Command));
        assert_eq!(
            operation_kind_hint("513"),
            Some(OperationKind::Configuration)
        );
        assert_eq!(operation_kind_hint("515,x"), Some(OperationKind::Firmware));
        assert_eq!(operation_kind_hint("41,200,err"), None);
        assert_eq!(operation_kind_hint("999"), None);
    }

    #[test]
    fn device_command_set() {
        let cmd = parse_device_command("set boiler/limit 42").expect("parse");
        assert_eq!(
            cmd,
            DeviceCommand::SetTag {
                tag: "boiler/limit".into(),
                value: "42".into(),
            }
        );
    }

    #[test]
    fn device_command_set_value_may_contain_spaces() {
        let cmd = parse_device_command("set notes/shift handover at 06:00").expect("parse");
        assert_eq!(
            cmd,
            DeviceCommand::SetTag {
                tag: "notes/shift".into(),
                value: "handover at 06:00".into(),
            }
        );
    }

    #[test]
    fn device_command_setf_joins_folder_and_tag() {
        let cmd = parse_device_command("setf furnace2 setpoint 180").expect("parse");
        assert_eq!(
            cmd,
            DeviceCommand::SetFolderTag {
                tag: "furnace2/setpoint".into(),
                value: "180".into(),
            }
        );
    }

    #[test]
    fn device_command_measurements_toggle() {
        assert_eq!(
            parse_device_command("measurements enable").expect("parse"),
            DeviceCommand::Measurements { enabled: true }
        );
        assert_eq!(
            parse_device_command("measurements disable").expect("parse"),
            DeviceCommand::Measurements { enabled: false }
        );
        assert!(parse_device_command("measurements sideways").is_err());
    }

    #[test]
    fn device_command_rejects_unknown_verbs_and_short_forms() {
        assert!(matches!(
            parse_device_command("reboot now").expect_err("verb"),
            CodecError::UnknownTemplate { .. }
        ));
        assert!(parse_device_command("set boiler/limit").is_err());
        assert!(parse_device_command("").is_err());
    }

    #[test]
    fn typed_values_follow_declared_kind() {
        assert_eq!(
            parse_tag_value("TRUE", TagKind::Bool).expect("bool"),
            TagValue::Bool(true)
        );
        assert_eq!(
            parse_tag_value("0", TagKind::Bool).expect("bool"),
            TagValue::Bool(false)
        );
        assert_eq!(
            parse_tag_value("-17", TagKind::Int).expect("int"),
            TagValue::Int(-17)
        );
        assert_eq!(
            parse_tag_value("2.5", TagKind::Float).expect("float"),
            TagValue::Float(2.5)
        );
        assert_eq!(
            parse_tag_value("2.5", TagKind::Text).expect("text"),
            TagValue::Text("2.5".into())
        );
        assert!(parse_tag_value("maybe", TagKind::Bool).is_err());
        assert!(parse_tag_value("2.5", TagKind::Int).is_err());
    }

    #[test]
    fn config_lines_skip_unparseable_input() {
        let pairs = parse_config_lines("interval=30\n# comment\n\nbroken line\npolicy = last");
        assert_eq!(
            pairs,
            vec![
                ("interval".to_string(), "30".to_string()),
                ("policy".to_string(), "last".to_string()),
            ]
        );
    }

    #[test]
    fn credentials_require_exact_shape() {
        let creds = parse_credentials("70,t1,device-9,s3cret").expect("parse");
        assert_eq!(creds.tenant, "t1");
        assert_eq!(creds.username, "device-9");
        assert_eq!(creds.password, "s3cret");

        assert!(parse_credentials("70,t1,device-9").is_err());
        assert!(parse_credentials("70,t1,device-9,pw,extra").is_err());
        assert!(parse_credentials("71,t1,device-9,pw").is_err());
        assert!(parse_credentials("70,t1,,pw").is_err());
    }
}
