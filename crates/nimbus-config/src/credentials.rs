// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! File-backed device credential storage.
//!
//! Device credentials are issued once by the platform during provisioning and
//! must survive restarts; losing them forces a re-registration that requires
//! operator approval. The store keeps them as a single JSON file and writes
//! through a temporary file and a rename so a crash mid-write never corrupts
//! the previous set.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use nimbus_core::error::{LinkError, LinkResult};
use nimbus_core::types::LinkCredentials;
use nimbus_link::CredentialSink;

use crate::error::{ConfigError, ConfigResult};

/// Persistent store for platform-issued device credentials.
///
/// Loaded once at startup to seed the shared credential slot, and written by
/// the provisioning exchange through [`CredentialSink`].
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store backed by the file at `path`. Parent directories are created on
    /// first persist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads stored credentials, if any.
    ///
    /// A missing file means the gateway has never been provisioned and is
    /// reported as `None`. A file that exists but does not parse is also
    /// reported as `None`; the next successful provisioning overwrites it.
    pub fn load(&self) -> ConfigResult<Option<LinkCredentials>> {
        let body = match fs::read(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::io(&self.path, e)),
        };

        match serde_json::from_slice::<LinkCredentials>(&body) {
            Ok(credentials) => Ok(Some(credentials)),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Stored credentials are unreadable, the gateway will re-provision"
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl CredentialSink for CredentialStore {
    async fn persist(&self, credentials: &LinkCredentials) -> LinkResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LinkError::provisioning_failed(format!("credential storage unavailable: {}", e))
            })?;
        }

        let body = serde_json::to_vec_pretty(credentials).map_err(|e| {
            LinkError::provisioning_failed(format!("credential encoding failed: {}", e))
        })?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body).map_err(|e| {
            LinkError::provisioning_failed(format!("credential write failed: {}", e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            LinkError::provisioning_failed(format!("credential write failed: {}", e))
        })?;

        info!(path = %self.path.display(), "Device credentials persisted");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, CredentialStore) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_persist_then_load_round_trips() {
        let (_dir, store) = store();
        let credentials = LinkCredentials::new("t1", "device-gw-7731", "secret");

        store.persist(&credentials).await.unwrap();
        assert_eq!(store.load().unwrap(), Some(credentials));
    }

    #[test]
    fn test_missing_file_means_unprovisioned() {
        let (_dir, store) = store();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_reported_absent() {
        let (_dir, store) = store();
        fs::write(store.path(), b"not json").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_persist_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("nested/state/credentials.json"));

        store
            .persist(&LinkCredentials::new("t1", "u", "p"))
            .await
            .unwrap();
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_persist_replaces_previous_credentials() {
        let (_dir, store) = store();
        store
            .persist(&LinkCredentials::new("t1", "old", "old"))
            .await
            .unwrap();
        store
            .persist(&LinkCredentials::new("t1", "new", "new"))
            .await
            .unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.username, "new");
    }
}
