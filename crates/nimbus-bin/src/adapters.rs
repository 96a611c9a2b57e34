// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Standalone platform adapters.
//!
//! The relay and dispatcher work against trait seams so site integrations
//! can attach their own historical store and device I/O. This module holds
//! the adapters the standalone binary ships with: a sample source that
//! yields empty spans until a store is attached, a tag store that reports
//! every tag as unknown, and a device control that maps restart onto process
//! shutdown and stages firmware images on disk for the installer.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use nimbus_core::error::{ControlError, ControlResult, SourceResult, TagError, TagResult};
use nimbus_core::types::TagKind;
use nimbus_relay::source::{SampleSource, SourceCursor, SourceSpan};
use nimbus_relay::tags::{DeviceControl, TagStore};

use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// StandaloneSource
// =============================================================================

/// Sample source for a gateway running without a historical store.
///
/// Every pull returns an empty span at a fixed cursor, so the relay idles
/// cleanly while provisioning, announcements, and platform operations keep
/// working.
pub struct StandaloneSource;

#[async_trait]
impl SampleSource for StandaloneSource {
    async fn fresh_cursor(&self) -> SourceResult<SourceCursor> {
        Ok(SourceCursor::new("standalone"))
    }

    async fn next_span(&self, cursor: &SourceCursor) -> SourceResult<SourceSpan> {
        Ok(SourceSpan::empty(cursor.clone()))
    }

    fn name(&self) -> &str {
        "standalone"
    }
}

// =============================================================================
// StandaloneTags
// =============================================================================

/// Tag store for a gateway running without device I/O.
///
/// Reports every tag as unknown, so platform set commands are rejected with
/// an honest failure instead of being silently dropped.
pub struct StandaloneTags;

#[async_trait]
impl TagStore for StandaloneTags {
    async fn tag_kind(&self, name: &str) -> TagResult<TagKind> {
        Err(TagError::not_found(name))
    }

    async fn write_bool(&self, name: &str, _value: bool) -> TagResult<()> {
        Err(TagError::not_found(name))
    }

    async fn write_int(&self, name: &str, _value: i64) -> TagResult<()> {
        Err(TagError::not_found(name))
    }

    async fn write_float(&self, name: &str, _value: f64) -> TagResult<()> {
        Err(TagError::not_found(name))
    }

    async fn write_text(&self, name: &str, _value: &str) -> TagResult<()> {
        Err(TagError::not_found(name))
    }
}

// =============================================================================
// GatewayControl
// =============================================================================

/// Device control backed by the gateway process itself.
///
/// Restart shuts the process down and relies on the service manager's
/// restart policy to bring it back up. Firmware images are staged under the
/// state directory for the installer to pick up.
pub struct GatewayControl {
    coordinator: ShutdownCoordinator,
    staging_dir: PathBuf,
}

impl GatewayControl {
    /// Creates a device control staging firmware under `staging_dir`.
    pub fn new(coordinator: ShutdownCoordinator, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            coordinator,
            staging_dir: staging_dir.into(),
        }
    }

    /// Strips path separators so platform-supplied names cannot escape the
    /// staging directory.
    fn sanitize(part: &str) -> String {
        part.replace(['/', '\\'], "_")
    }
}

#[async_trait]
impl DeviceControl for GatewayControl {
    async fn restart(&self) -> ControlResult<()> {
        info!("Restart accepted, stopping for service manager restart");
        self.coordinator.initiate_shutdown();
        Ok(())
    }

    async fn stage_firmware(&self, name: &str, version: &str, image: &[u8]) -> ControlResult<()> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| {
                ControlError::stage_failed(format!("creating staging directory failed: {e}"))
            })?;

        let file_name = format!("{}-{}.img", Self::sanitize(name), Self::sanitize(version));
        let path = self.staging_dir.join(&file_name);
        let tmp = self.staging_dir.join(format!("{file_name}.tmp"));

        tokio::fs::write(&tmp, image)
            .await
            .map_err(|e| ControlError::stage_failed(format!("writing firmware image failed: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ControlError::stage_failed(format!("staging firmware image failed: {e}")))?;

        info!(
            path = %path.display(),
            size = image.len(),
            "Firmware image staged"
        );
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_standalone_source_yields_empty_spans() {
        let source = StandaloneSource;

        let cursor = source.fresh_cursor().await.unwrap();
        let span = source.next_span(&cursor).await.unwrap();

        assert!(span.points.is_empty());
        assert_eq!(span.cursor, cursor);
    }

    #[tokio::test]
    async fn test_standalone_tags_reports_unknown() {
        let tags = StandaloneTags;

        assert!(tags.tag_kind("motor_speed").await.is_err());
        assert!(tags.write_int("motor_speed", 42).await.is_err());
    }

    #[tokio::test]
    async fn test_restart_initiates_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let dir = tempfile::tempdir().unwrap();
        let control = GatewayControl::new(coordinator.clone(), dir.path());

        control.restart().await.unwrap();

        assert!(coordinator.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn test_stage_firmware_writes_image() {
        let coordinator = ShutdownCoordinator::new();
        let dir = tempfile::tempdir().unwrap();
        let control = GatewayControl::new(coordinator, dir.path().join("firmware"));

        control
            .stage_firmware("gateway-fw", "2.1.0", b"image-bytes")
            .await
            .unwrap();

        let staged = dir.path().join("firmware").join("gateway-fw-2.1.0.img");
        assert_eq!(std::fs::read(&staged).unwrap(), b"image-bytes");
    }

    #[tokio::test]
    async fn test_stage_firmware_sanitizes_path_components() {
        let coordinator = ShutdownCoordinator::new();
        let dir = tempfile::tempdir().unwrap();
        let control = GatewayControl::new(coordinator, dir.path());

        control
            .stage_firmware("../escape", "1/2", b"x")
            .await
            .unwrap();

        assert!(dir.path().join(".._escape-1_2.img").exists());
    }
}
