// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Device-side collaborator traits.
//!
//! Platform operations act on the device through three seams: [`TagStore`]
//! for typed tag writes, [`DeviceControl`] for restart and firmware staging,
//! and [`SettingsStore`] for persisted gateway settings. The dispatcher only
//! ever talks to these traits; concrete implementations live with the
//! process wiring and the test mocks.

use async_trait::async_trait;

use nimbus_core::error::{ControlResult, SettingsResult, TagResult};
use nimbus_core::types::{TagKind, TagValue};

// ===========================================================================
// Setting Keys
// ===========================================================================

/// Keys of the settings the platform may rewrite at runtime.
///
/// Configuration blobs and device commands address settings by these names;
/// anything else is rejected by the store with an unknown-key error.
pub mod keys {
    /// Relay poll interval in seconds.
    pub const INTERVAL: &str = "interval";
    /// Aggregation policy name.
    pub const POLICY: &str = "policy";
    /// Aggregation window length in seconds.
    pub const WINDOW: &str = "window";
    /// Whether measurement relaying is enabled.
    pub const MEASUREMENTS: &str = "measurements";
}

// ===========================================================================
// Tag Store
// ===========================================================================

/// Typed access to device tags.
///
/// Writes are declared-kind checked: the dispatcher first asks for the
/// target's [`TagKind`], parses the raw command value against it, then calls
/// the matching typed write.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Declared kind of the named tag.
    async fn tag_kind(&self, name: &str) -> TagResult<TagKind>;

    /// Writes a boolean tag.
    async fn write_bool(&self, name: &str, value: bool) -> TagResult<()>;

    /// Writes an integer tag.
    async fn write_int(&self, name: &str, value: i64) -> TagResult<()>;

    /// Writes a float tag.
    async fn write_float(&self, name: &str, value: f64) -> TagResult<()>;

    /// Writes a text tag.
    async fn write_text(&self, name: &str, value: &str) -> TagResult<()>;
}

/// Dispatches a typed value to the matching write method.
pub async fn write_value(store: &dyn TagStore, name: &str, value: &TagValue) -> TagResult<()> {
    match value {
        TagValue::Bool(b) => store.write_bool(name, *b).await,
        TagValue::Int(i) => store.write_int(name, *i).await,
        TagValue::Float(f) => store.write_float(name, *f).await,
        TagValue::Text(s) => store.write_text(name, s).await,
    }
}

// ===========================================================================
// Device Control
// ===========================================================================

/// Process and firmware control of the gateway device.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Requests a device restart.
    ///
    /// A successful return means the restart was accepted; the process is
    /// expected to exit shortly afterwards.
    async fn restart(&self) -> ControlResult<()>;

    /// Stages a downloaded firmware image for installation on next restart.
    async fn stage_firmware(&self, name: &str, version: &str, image: &[u8]) -> ControlResult<()>;
}

// ===========================================================================
// Settings Store
// ===========================================================================

/// Persisted gateway settings the platform may rewrite.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Writes one setting. Keys outside [`keys`] fail with an unknown-key
    /// error.
    async fn set(&self, key: &str, value: &str) -> SettingsResult<()>;

    /// Renders the current settings as a multi-line `key=value` blob.
    async fn snapshot(&self) -> SettingsResult<String>;
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_core::error::TagError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        writes: Mutex<Vec<(String, TagValue)>>,
    }

    #[async_trait]
    impl TagStore for RecordingStore {
        async fn tag_kind(&self, _name: &str) -> TagResult<TagKind> {
            Err(TagError::not_found("unused"))
        }

        async fn write_bool(&self, name: &str, value: bool) -> TagResult<()> {
            self.writes.lock().push((name.into(), TagValue::Bool(value)));
            Ok(())
        }

        async fn write_int(&self, name: &str, value: i64) -> TagResult<()> {
            self.writes.lock().push((name.into(), TagValue::Int(value)));
            Ok(())
        }

        async fn write_float(&self, name: &str, value: f64) -> TagResult<()> {
            self.writes.lock().push((name.into(), TagValue::Float(value)));
            Ok(())
        }

        async fn write_text(&self, name: &str, value: &str) -> TagResult<()> {
            self.writes
                .lock()
                .push((name.into(), TagValue::Text(value.into())));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_write_value_selects_typed_method() {
        let store = RecordingStore::default();

        write_value(&store, "a", &TagValue::Bool(true)).await.unwrap();
        write_value(&store, "b", &TagValue::Int(7)).await.unwrap();
        write_value(&store, "c", &TagValue::Float(1.5)).await.unwrap();
        write_value(&store, "d", &TagValue::Text("x".into())).await.unwrap();

        let writes = store.writes.lock();
        assert_eq!(writes.len(), 4);
        assert_eq!(writes[0], ("a".to_string(), TagValue::Bool(true)));
        assert_eq!(writes[1], ("b".to_string(), TagValue::Int(7)));
        assert_eq!(writes[2], ("c".to_string(), TagValue::Float(1.5)));
        assert_eq!(writes[3], ("d".to_string(), TagValue::Text("x".into())));
    }
}
