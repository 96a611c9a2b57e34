// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! File-backed runtime settings.
//!
//! The platform may rewrite a small set of gateway settings at runtime
//! through configuration blobs and device commands. Those rewrites must
//! survive restarts, so the store keeps them in a JSON file next to the rest
//! of the gateway state. Values are validated on write; a bad value fails the
//! originating operation instead of poisoning the next start.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use nimbus_aggregate::AggregationPolicy;
use nimbus_core::error::{SettingsError, SettingsResult};
use nimbus_relay::{keys, SettingsStore};

use crate::error::{ConfigError, ConfigResult};

/// Persistent settings store backed by a single JSON file.
///
/// Two layers back the running values: platform rewrites, which live in the
/// file and win on every lookup, and configuration seeds, which live in
/// memory only. Keeping seeds out of the file means a later change to the
/// configuration file still takes effect on keys the platform never touched.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    persisted: RwLock<BTreeMap<String, String>>,
    seeds: RwLock<BTreeMap<String, String>>,
}

impl FileSettings {
    /// Opens the store at `path`, loading any previously persisted rewrites.
    ///
    /// A missing file is an empty store. A file that exists but does not
    /// parse is discarded with a warning; the next successful write replaces
    /// it.
    pub fn open(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let persisted = match fs::read(&path) {
            Ok(body) => match serde_json::from_slice::<BTreeMap<String, String>>(&body) {
                Ok(map) => map,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Discarding unreadable settings file"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(ConfigError::io(&path, e)),
        };

        Ok(Self {
            path,
            persisted: RwLock::new(persisted),
            seeds: RwLock::new(BTreeMap::new()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fills `key` with `value` only if no value is present yet.
    ///
    /// Seeds live in memory only; the file records platform rewrites, not
    /// configuration defaults.
    pub fn seed(&self, key: &str, value: impl Into<String>) {
        if self.persisted.read().contains_key(key) {
            return;
        }
        let mut seeds = self.seeds.write();
        if !seeds.contains_key(key) {
            seeds.insert(key.to_string(), value.into());
        }
    }

    /// Returns the current value for `key`, if any. Platform rewrites win
    /// over seeds.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.persisted.read().get(key) {
            return Some(value.clone());
        }
        self.seeds.read().get(key).cloned()
    }

    /// Whether measurement relaying is currently enabled.
    ///
    /// Absent or unparseable values default to enabled.
    pub fn measurements_enabled(&self) -> bool {
        self.get(keys::MEASUREMENTS).as_deref() != Some("false")
    }

    fn persist(&self, map: &BTreeMap<String, String>, key: &str) -> SettingsResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SettingsError::write_failed(key, e.to_string()))?;
        }

        let body = serde_json::to_vec_pretty(map)
            .map_err(|e| SettingsError::write_failed(key, e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body).map_err(|e| SettingsError::write_failed(key, e.to_string()))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| SettingsError::write_failed(key, e.to_string()))?;
        Ok(())
    }
}

/// Validates a value against the key it is being written to.
fn validate_value(key: &str, value: &str) -> SettingsResult<()> {
    match key {
        keys::INTERVAL | keys::WINDOW => match value.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(()),
            Ok(_) => Err(SettingsError::write_failed(
                key,
                "must be greater than zero",
            )),
            Err(_) => Err(SettingsError::write_failed(
                key,
                "expected a number of seconds",
            )),
        },
        keys::POLICY => AggregationPolicy::from_value(value)
            .map(|_| ())
            .map_err(|e| SettingsError::write_failed(key, e.to_string())),
        keys::MEASUREMENTS => match value {
            "true" | "false" => Ok(()),
            _ => Err(SettingsError::write_failed(key, "expected true or false")),
        },
        _ => Err(SettingsError::unknown_key(key)),
    }
}

#[async_trait]
impl SettingsStore for FileSettings {
    async fn set(&self, key: &str, value: &str) -> SettingsResult<()> {
        validate_value(key, value)?;

        // Only the rewrite layer reaches the file; seeds stay in memory.
        // The layer commits after the write succeeded, so a failed operation
        // leaves the running values untouched.
        let mut next = self.persisted.read().clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next, key)?;

        *self.persisted.write() = next;
        debug!(key, value, "Setting updated");
        Ok(())
    }

    async fn snapshot(&self) -> SettingsResult<String> {
        let mut merged = self.seeds.read().clone();
        for (key, value) in self.persisted.read().iter() {
            merged.insert(key.clone(), value.clone());
        }
        let lines: Vec<String> = merged
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        Ok(lines.join("\n"))
    }
}

// =============================================================================
// Tests
// =============================================================================
