// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Durable operation markers.
//!
//! Restart-requiring operations cannot acknowledge SUCCESSFUL from the same
//! process: the restart kills it first. Before triggering the restart the
//! dispatcher persists an [`OperationMarker`] here; the next process start
//! reads the markers back, sends the terminal acknowledgement to the
//! persisted topic, and deletes each marker only after its send succeeded.
//! A marker file that fails to parse is deleted and skipped; it can no
//! longer be resolved and must not wedge every future start.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use nimbus_core::error::{SettingsError, SettingsResult};
use nimbus_core::operation::{OperationKind, OperationMarker};

/// File-backed marker storage, one JSON file per operation kind.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    dir: PathBuf,
}

impl MarkerStore {
    /// Store rooted at `dir`. The directory is created on first persist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the marker files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, kind: OperationKind) -> PathBuf {
        self.dir.join(kind.marker_name())
    }

    /// Persists a marker, replacing any previous one of the same kind.
    ///
    /// The write goes through a temporary file and a rename so a crash
    /// mid-write never leaves a half-written marker behind.
    pub fn persist(&self, marker: &OperationMarker) -> SettingsResult<()> {
        let name = marker.kind.marker_name();
        fs::create_dir_all(&self.dir)
            .map_err(|e| SettingsError::write_failed(name, e.to_string()))?;

        let body = serde_json::to_vec_pretty(marker)
            .map_err(|e| SettingsError::write_failed(name, e.to_string()))?;

        let path = self.path_for(marker.kind);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, body).map_err(|e| SettingsError::write_failed(name, e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| SettingsError::write_failed(name, e.to_string()))?;
        Ok(())
    }

    /// Loads the marker for one kind, if present.
    ///
    /// A file that exists but does not parse is removed and reported as
    /// absent.
    pub fn load(&self, kind: OperationKind) -> SettingsResult<Option<OperationMarker>> {
        let path = self.path_for(kind);
        let body = match fs::read(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SettingsError::read_failed(e.to_string())),
        };

        match serde_json::from_slice::<OperationMarker>(&body) {
            Ok(marker) => Ok(Some(marker)),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Discarding unreadable operation marker"
                );
                let _ = fs::remove_file(&path);
                Ok(None)
            }
        }
    }

    /// Loads every present marker, in announce order of their kinds.
    pub fn load_all(&self) -> SettingsResult<Vec<OperationMarker>> {
        let mut markers = Vec::new();
        for kind in OperationKind::ALL {
            if let Some(marker) = self.load(kind)? {
                markers.push(marker);
            }
        }
        Ok(markers)
    }

    /// Removes the marker for one kind. Absence is not an error.
    pub fn remove(&self, kind: OperationKind) -> SettingsResult<()> {
        match fs::remove_file(self.path_for(kind)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SettingsError::write_failed(
                kind.marker_name(),
                e.to_string(),
            )),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
