// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Template message construction and field splitting.
//!
//! Wire messages are a numeric template id followed by comma-separated
//! fields. [`TemplateMessage`] is an append-only builder: fields can only be
//! pushed onto the end, and the finished string is never mutated afterwards.
//!
//! Two quoting modes exist. Auto-quoted fields are wrapped in double quotes
//! only when the value would otherwise break the field layout (embedded
//! comma, quote, or line break). Always-quoted fields are wrapped
//! unconditionally; certain template positions (measurement fragments, alarm
//! texts, configuration blobs) use this mode. Inner quotes are doubled in
//! both modes.

use std::fmt;

// =============================================================================
// Template Ids
// =============================================================================

/// Wire template ids, outbound and inbound.
pub mod ids {
    /// Create the gateway device.
    pub const CREATE_DEVICE: u16 = 100;
    /// Announce hardware identity.
    pub const HARDWARE: u16 = 110;
    /// Push the full configuration snapshot.
    pub const CONFIGURATION_SNAPSHOT: u16 = 113;
    /// Announce supported operations.
    pub const SUPPORTED_OPERATIONS: u16 = 114;
    /// Announce installed firmware.
    pub const FIRMWARE: u16 = 115;
    /// Announce installed software.
    pub const SOFTWARE_LIST: u16 = 116;
    /// Measurement sample.
    pub const MEASUREMENT: u16 = 200;
    /// Critical alarm.
    pub const ALARM_CRITICAL: u16 = 301;
    /// Major alarm.
    pub const ALARM_MAJOR: u16 = 302;
    /// Minor alarm.
    pub const ALARM_MINOR: u16 = 303;
    /// Warning alarm.
    pub const ALARM_WARNING: u16 = 304;
    /// Clear an active alarm.
    pub const ALARM_CLEAR: u16 = 306;
    /// Basic event.
    pub const EVENT: u16 = 400;
    /// Request queued operations.
    pub const REQUEST_PENDING: u16 = 500;
    /// Operation state: EXECUTING.
    pub const OP_EXECUTING: u16 = 501;
    /// Operation state: FAILED.
    pub const OP_FAILED: u16 = 502;
    /// Operation state: SUCCESSFUL.
    pub const OP_SUCCESSFUL: u16 = 503;

    /// Inbound: platform error response.
    pub const ERROR_RESPONSE: u16 = 41;
    /// Inbound: credential response on the provisioning channel.
    pub const CREDENTIALS: u16 = 70;
    /// Inbound: restart request.
    pub const RESTART: u16 = 510;
    /// Inbound: run a device command.
    pub const RUN_COMMAND: u16 = 511;
    /// Inbound: apply a configuration blob.
    pub const SET_CONFIGURATION: u16 = 513;
    /// Inbound: install firmware.
    pub const INSTALL_FIRMWARE: u16 = 515;
}

// =============================================================================
// Builder
// =============================================================================

/// Append-only builder for one template message.
///
/// # Examples
///
/// ```
/// use nimbus_codec::template::TemplateMessage;
///
/// let msg = TemplateMessage::new(400)
///     .field("gateway_started")
///     .field("relay up, resuming")
///     .finish();
/// assert_eq!(msg, "400,gateway_started,\"relay up, resuming\"");
/// ```
#[derive(Debug, Clone)]
pub struct TemplateMessage {
    buf: String,
}

impl TemplateMessage {
    /// Starts a message for the given template id.
    pub fn new(id: u16) -> Self {
        Self {
            buf: id.to_string(),
        }
    }

    /// Appends a field, quoting it only when the value requires it.
    pub fn field(mut self, value: &str) -> Self {
        self.buf.push(',');
        if needs_quoting(value) {
            push_quoted(&mut self.buf, value);
        } else {
            self.buf.push_str(value);
        }
        self
    }

    /// Appends a field wrapped in quotes unconditionally.
    pub fn quoted_field(mut self, value: &str) -> Self {
        self.buf.push(',');
        push_quoted(&mut self.buf, value);
        self
    }

    /// Appends every value in order, auto-quoted.
    pub fn fields<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for value in values {
            self = self.field(value.as_ref());
        }
        self
    }

    /// Finishes the message and returns the wire string.
    pub fn finish(self) -> String {
        self.buf
    }
}

impl fmt::Display for TemplateMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.buf)
    }
}

fn needs_quoting(value: &str) -> bool {
    value.contains(',')
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r')
        || value.starts_with(' ')
        || value.ends_with(' ')
}

fn push_quoted(buf: &mut String, value: &str) {
    buf.push('"');
    for ch in value.chars() {
        if ch == '"' {
            buf.push('"');
        }
        buf.push(ch);
    }
    buf.push('"');
}

// =============================================================================
// Field Splitting
// =============================================================================

/// Splits a wire payload into fields, honoring quote wrapping.
///
/// A field wrapped in double quotes may contain commas and line breaks;
/// a doubled quote inside a quoted field decodes to one literal quote.
/// The splitter is total and never fails; structural validation happens
/// against the template's expected field count afterwards.
pub fn split_fields(payload: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = payload.chars().peekable();
    let mut in_quotes = false;

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else {
            match ch {
                '"' => in_quotes = true,
                ',' => {
                    fields.push(std::mem::take(&mut current));
                }
                _ => current.push(ch),
            }
        }
    }
    fields.push(current);
    fields
}

// =============================================================================
// Text Escaping
// =============================================================================

/// Escapes line breaks for single-line transport.
///
/// Used for the configuration blob, which is multi-line on the device but
/// travels as one field.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

/// Reverses [`escape_text`].
///
/// Unknown escape sequences are kept verbatim rather than rejected.
pub fn unescape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.peek() {
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_stay_bare() {
        let msg = TemplateMessage::new(500).finish();
        assert_eq!(msg, "500");

        let msg = TemplateMessage::new(110)
            .field("SN-1000")
            .field("NB-4")
            .field("rev2")
            .finish();
        assert_eq!(msg, "110,SN-1000,NB-4,rev2");
    }

    #[test]
    fn comma_forces_quoting() {
        let msg = TemplateMessage::new(400)
            .field("restart")
            .field("stopping, then starting")
            .finish();
        assert_eq!(msg, "400,restart,\"stopping, then starting\"");
    }

    #[test]
    fn inner_quotes_are_doubled() {
        let msg = TemplateMessage::new(400).field("say \"hello\"").finish();
        assert_eq!(msg, "400,\"say \"\"hello\"\"\"");
    }

    #[test]
    fn quoted_field_always_quotes() {
        let msg = TemplateMessage::new(200).quoted_field("T").finish();
        assert_eq!(msg, "200,\"T\"");
    }

    #[test]
    fn empty_fields_are_preserved() {
        let msg = TemplateMessage::new(100).field("").field("x").finish();
        assert_eq!(msg, "100,,x");
        assert_eq!(split_fields(&msg), vec!["100", "", "x"]);
    }

    #[test]
    fn split_handles_quoted_commas() {
        let fields = split_fields("511,gw-1,\"set a/b 1,2\"");
        assert_eq!(fields, vec!["511", "gw-1", "set a/b 1,2"]);
    }

    #[test]
    fn split_undoubles_quotes() {
        let fields = split_fields("400,\"say \"\"hello\"\"\"");
        assert_eq!(fields, vec!["400", "say \"hello\""]);
    }

    #[test]
    fn split_round_trips_builder_output() {
        let msg = TemplateMessage::new(302)
            .field("overheat")
            .quoted_field("inlet > 120C, shutting down")
            .field("2024-05-01T00:00:00Z")
            .finish();
        let fields = split_fields(&msg);
        assert_eq!(
            fields,
            vec![
                "302",
                "overheat",
                "inlet > 120C, shutting down",
                "2024-05-01T00:00:00Z",
            ]
        );
    }

    #[test]
    fn escape_round_trip() {
        let blob = "interval=30\npolicy=average\npath=C:\\data";
        let escaped = escape_text(blob);
        assert!(!escaped.contains('\n'));
        assert_eq!(unescape_text(&escaped), blob);
    }

    #[test]
    fn unescape_keeps_unknown_sequences() {
        assert_eq!(unescape_text("a\\tb"), "a\\tb");
        assert_eq!(unescape_text("trailing\\"), "trailing\\");
    }
}
