// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Operation lifecycle types.
//!
//! Every inbound platform command runs through the same three-state
//! lifecycle: the platform holds it PENDING until the gateway acknowledges
//! EXECUTING, then exactly one terminal acknowledgement follows, SUCCESSFUL
//! or FAILED. The EXECUTING acknowledgement is always sent before any side
//! effect so the platform never observes an effect of an operation it still
//! believes to be pending.
//!
//! Kinds that end in a device restart (restart itself, reconfiguration,
//! firmware install) cannot send their terminal acknowledgement in the same
//! process. They persist an [`OperationMarker`] before restarting; the next
//! process start resolves all markers by sending SUCCESSFUL to the persisted
//! topic and deleting the marker only after the send succeeded.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Operation Kinds
// =============================================================================

/// The platform operations this gateway supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Restart the gateway process/device.
    Restart,
    /// Apply a pushed configuration blob.
    Configuration,
    /// Run a device command (`set`, `setf`, `measurements`).
    Command,
    /// Download and stage a firmware image.
    Firmware,
}

impl OperationKind {
    /// All supported kinds, in announce order.
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Restart,
        OperationKind::Configuration,
        OperationKind::Command,
        OperationKind::Firmware,
    ];

    /// Platform-side operation fragment name.
    pub fn fragment(&self) -> &'static str {
        match self {
            OperationKind::Restart => "nb_Restart",
            OperationKind::Configuration => "nb_Configuration",
            OperationKind::Command => "nb_Command",
            OperationKind::Firmware => "nb_Firmware",
        }
    }

    /// Whether completing this operation restarts the device.
    ///
    /// Restart-requiring kinds deliver their terminal acknowledgement from
    /// the next process start via a durable marker.
    pub fn requires_restart(&self) -> bool {
        !matches!(self, OperationKind::Command)
    }

    /// Stable marker file name for this kind.
    pub fn marker_name(&self) -> &'static str {
        match self {
            OperationKind::Restart => "restart.pending",
            OperationKind::Configuration => "configuration.pending",
            OperationKind::Command => "command.pending",
            OperationKind::Firmware => "firmware.pending",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fragment())
    }
}

// =============================================================================
// Operation Status
// =============================================================================

/// Gateway-visible states of the operation lifecycle.
///
/// PENDING exists only on the platform side; the gateway reports the three
/// states below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationStatus {
    /// Execution has begun; side effects may follow.
    Executing,
    /// Terminal: the operation failed, with a reason.
    Failed,
    /// Terminal: the operation completed.
    Successful,
}

impl OperationStatus {
    /// Status name as reported in logs.
    pub fn name(&self) -> &'static str {
        match self {
            OperationStatus::Executing => "EXECUTING",
            OperationStatus::Failed => "FAILED",
            OperationStatus::Successful => "SUCCESSFUL",
        }
    }

    /// Whether this status ends the lifecycle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Executing)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Durable Markers
// =============================================================================

/// Durable record of a restart-requiring operation awaiting its terminal
/// acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMarker {
    /// The operation kind the marker completes.
    pub kind: OperationKind,
    /// Topic the operation arrived on; the terminal acknowledgement goes
    /// back to this topic.
    pub topic: String,
}

impl OperationMarker {
    /// Creates a marker for an operation received on `topic`.
    pub fn new(kind: OperationKind, topic: impl Into<String>) -> Self {
        Self {
            kind,
            topic: topic.into(),
        }
    }
}

// =============================================================================
// Failure Reasons
// =============================================================================

/// Fixed FAILED-reason strings reused across handlers.
pub mod reason {
    /// The command named a device id other than this gateway's.
    pub const DEVICE_ID_MISMATCH: &str = "device ID mismatch";
    /// The payload was structurally invalid for its template.
    pub const FORMAT_ERROR: &str = "format error";
    /// The template id or command verb is not supported.
    pub const UNSUPPORTED_OPERATION: &str = "unsupported operation";
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_the_only_non_restarting_kind() {
        for kind in OperationKind::ALL {
            assert_eq!(
                kind.requires_restart(),
                kind != OperationKind::Command,
                "unexpected restart classification for {kind}"
            );
        }
    }

    #[test]
    fn fragments_are_distinct() {
        let mut names: Vec<&str> = OperationKind::ALL.iter().map(|k| k.fragment()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), OperationKind::ALL.len());
    }

    #[test]
    fn executing_is_not_terminal() {
        assert!(!OperationStatus::Executing.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
        assert!(OperationStatus::Successful.is_terminal());
    }

    #[test]
    fn marker_round_trips_through_json() {
        let marker = OperationMarker::new(OperationKind::Firmware, "tpl/ds");
        let encoded = serde_json::to_string(&marker).expect("serialize marker");
        let decoded: OperationMarker = serde_json::from_str(&encoded).expect("parse marker");
        assert_eq!(decoded, marker);
    }
}
