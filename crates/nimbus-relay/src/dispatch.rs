// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Inbound operation dispatcher.
//!
//! The [`CommandDispatcher`] consumes the inbound envelope stream, classifies
//! each payload, and drives the operation through its lifecycle:
//!
//! - EXECUTING is acknowledged as soon as the payload parses and the device
//!   id matches. A mismatched id fails the operation without ever marking it
//!   EXECUTING.
//! - Terminal acknowledgements always go back to the topic the operation
//!   arrived on.
//! - Operations that end in a restart (restart, configuration, firmware)
//!   persist a durable marker first. After the process comes back up,
//!   [`CommandDispatcher::resolve_pending`] turns each surviving marker into
//!   a SUCCESSFUL acknowledgement and deletes it; a marker whose send fails
//!   stays for the next attempt.
//! - Unknown template ids are counted and dropped. Platform error responses
//!   are logged, never acknowledged.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use nimbus_codec::parse::{
    classify, operation_kind_hint, parse_config_lines, parse_device_command, parse_tag_value,
    DeviceCommand, InboundMessage,
};
use nimbus_codec::render;
use nimbus_core::error::{CodecError, SettingsError};
use nimbus_core::operation::{reason, OperationKind, OperationMarker};
use nimbus_link::{CloudLink, InboundEnvelope, SharedCredentials};

use crate::durable::MarkerStore;
use crate::firmware::FirmwareSource;
use crate::tags::{keys, write_value, DeviceControl, SettingsStore, TagStore};

// =============================================================================
// Metrics
// =============================================================================

#[derive(Debug, Default)]
struct DispatchMetricsInner {
    received: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    unknown: AtomicU64,
    error_responses: AtomicU64,
    resolved_markers: AtomicU64,
}

/// Snapshot of dispatcher activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchMetrics {
    /// Envelopes taken off the inbound channel.
    pub received: u64,
    /// Operations acknowledged SUCCESSFUL directly.
    pub successful: u64,
    /// Operations acknowledged FAILED.
    pub failed: u64,
    /// Payloads dropped as unknown or unparseable.
    pub unknown: u64,
    /// Platform error responses observed.
    pub error_responses: u64,
    /// Markers resolved to SUCCESSFUL after a restart.
    pub resolved_markers: u64,
}

// =============================================================================
// Command Dispatcher
// =============================================================================

/// Executes platform operations against the local device.
pub struct CommandDispatcher<L>
where
    L: CloudLink + 'static,
{
    link: Arc<L>,
    tags: Arc<dyn TagStore>,
    control: Arc<dyn DeviceControl>,
    settings: Arc<dyn SettingsStore>,
    firmware: Arc<dyn FirmwareSource>,
    markers: MarkerStore,
    credentials: SharedCredentials,
    device_id: String,
    measurements: Arc<AtomicBool>,
    metrics: DispatchMetricsInner,
}

impl<L> CommandDispatcher<L>
where
    L: CloudLink + 'static,
{
    /// Creates a dispatcher for the given device.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        link: Arc<L>,
        tags: Arc<dyn TagStore>,
        control: Arc<dyn DeviceControl>,
        settings: Arc<dyn SettingsStore>,
        firmware: Arc<dyn FirmwareSource>,
        markers: MarkerStore,
        credentials: SharedCredentials,
        device_id: impl Into<String>,
        measurements: Arc<AtomicBool>,
    ) -> Self {
        Self {
            link,
            tags,
            control,
            settings,
            firmware,
            markers,
            credentials,
            device_id: device_id.into(),
            measurements,
            metrics: DispatchMetricsInner::default(),
        }
    }

    /// Snapshot of dispatcher activity.
    pub fn metrics(&self) -> DispatchMetrics {
        DispatchMetrics {
            received: self.metrics.received.load(Ordering::Relaxed),
            successful: self.metrics.successful.load(Ordering::Relaxed),
            failed: self.metrics.failed.load(Ordering::Relaxed),
            unknown: self.metrics.unknown.load(Ordering::Relaxed),
            error_responses: self.metrics.error_responses.load(Ordering::Relaxed),
            resolved_markers: self.metrics.resolved_markers.load(Ordering::Relaxed),
        }
    }

    /// Starts consuming the inbound stream in the background.
    pub fn start(
        self: Arc<Self>,
        mut inbound: mpsc::Receiver<InboundEnvelope>,
        shutdown: Arc<Notify>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(device = %self.device_id, "Command dispatcher started");

            loop {
                tokio::select! {
                    received = inbound.recv() => {
                        match received {
                            Some(envelope) => self.handle(envelope).await,
                            None => {
                                warn!("Inbound channel closed");
                                break;
                            }
                        }
                    }
                    _ = shutdown.notified() => break,
                }
            }

            info!("Command dispatcher stopped");
        })
    }

    /// Handles one inbound envelope. Public so tests can feed payloads
    /// without the channel.
    pub async fn handle(&self, envelope: InboundEnvelope) {
        self.metrics.received.fetch_add(1, Ordering::Relaxed);
        debug!(id = %envelope.id, topic = %envelope.topic, "Handling inbound message");

        match classify(&envelope.payload) {
            Ok(InboundMessage::ErrorResponse { template, reason }) => {
                self.metrics.error_responses.fetch_add(1, Ordering::Relaxed);
                warn!(template = %template, reason = %reason, "Platform rejected a message");
            }
            Ok(message) => self.execute(&envelope.topic, message).await,
            Err(CodecError::UnknownTemplate { id }) => {
                self.metrics.unknown.fetch_add(1, Ordering::Relaxed);
                warn!(id = %id, "Dropping message with unknown template id");
            }
            Err(e) => match operation_kind_hint(&envelope.payload) {
                // The id names an operation but the body is broken. The
                // platform still expects a terminal state for it.
                Some(kind) => {
                    warn!(operation = kind.fragment(), error = %e, "Rejecting malformed operation");
                    self.ack(&envelope.topic, &render::operation_executing(kind))
                        .await;
                    self.fail(&envelope.topic, kind, reason::FORMAT_ERROR).await;
                }
                None => {
                    self.metrics.unknown.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Dropping unparseable message");
                }
            },
        }
    }

    async fn execute(&self, topic: &str, message: InboundMessage) {
        let Some(kind) = message.operation_kind() else {
            return;
        };

        if message.device() != Some(self.device_id.as_str()) {
            warn!(
                operation = kind.fragment(),
                addressed = message.device().unwrap_or_default(),
                device = %self.device_id,
                "Operation addressed to another device"
            );
            self.fail(topic, kind, reason::DEVICE_ID_MISMATCH).await;
            return;
        }

        self.ack(topic, &render::operation_executing(kind)).await;

        match message {
            InboundMessage::Restart { .. } => self.run_restart(topic).await,
            InboundMessage::RunCommand { command, .. } => self.run_command(topic, &command).await,
            InboundMessage::SetConfiguration { blob, .. } => {
                self.run_configuration(topic, &blob).await
            }
            InboundMessage::InstallFirmware {
                name, version, url, ..
            } => self.run_firmware(topic, &name, &version, &url).await,
            InboundMessage::ErrorResponse { .. } => {}
        }
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    async fn run_restart(&self, topic: &str) {
        if !self.persist_marker(OperationKind::Restart, topic).await {
            return;
        }
        self.trigger_restart(OperationKind::Restart, topic).await;
    }

    async fn run_command(&self, topic: &str, text: &str) {
        let command = match parse_device_command(text) {
            Ok(command) => command,
            Err(e) => {
                let reason = match e {
                    CodecError::UnknownTemplate { .. } => reason::UNSUPPORTED_OPERATION,
                    _ => reason::FORMAT_ERROR,
                };
                warn!(error = %e, "Rejecting device command");
                self.fail(topic, OperationKind::Command, reason).await;
                return;
            }
        };

        let outcome = match command {
            DeviceCommand::SetTag { tag, value }
            | DeviceCommand::SetFolderTag { tag, value } => self.write_tag(&tag, &value).await,
            DeviceCommand::Measurements { enabled } => {
                self.toggle_measurements(enabled).await;
                Ok(())
            }
        };

        match outcome {
            Ok(()) => {
                self.ack(
                    topic,
                    &render::operation_successful(OperationKind::Command, &[]),
                )
                .await;
                self.metrics.successful.fetch_add(1, Ordering::Relaxed);
            }
            Err(reason) => {
                warn!(reason = %reason, "Device command failed");
                self.fail(topic, OperationKind::Command, &reason).await;
            }
        }
    }

    async fn write_tag(&self, tag: &str, raw: &str) -> Result<(), String> {
        let kind = self
            .tags
            .tag_kind(tag)
            .await
            .map_err(|e| e.to_string())?;
        let value = parse_tag_value(raw, kind).map_err(|e| e.to_string())?;
        write_value(self.tags.as_ref(), tag, &value)
            .await
            .map_err(|e| e.to_string())?;
        info!(tag, kind = kind.name(), "Tag written");
        Ok(())
    }

    async fn toggle_measurements(&self, enabled: bool) {
        self.measurements.store(enabled, Ordering::Relaxed);
        let value = if enabled { "true" } else { "false" };
        if let Err(e) = self.settings.set(keys::MEASUREMENTS, value).await {
            warn!(error = %e, "Persisting measurement toggle failed");
        }
        info!(enabled, "Measurement relaying toggled");
    }

    async fn run_configuration(&self, topic: &str, blob: &str) {
        let pairs = parse_config_lines(blob);
        let mut applied = 0usize;

        for (key, value) in &pairs {
            match self.settings.set(key, value).await {
                Ok(()) => applied += 1,
                Err(SettingsError::UnknownKey { .. }) => {
                    debug!(key, "Ignoring unknown configuration key");
                }
                Err(e) => {
                    warn!(key, error = %e, "Applying configuration failed");
                    self.fail(topic, OperationKind::Configuration, &e.to_string())
                        .await;
                    return;
                }
            }
        }

        info!(applied, total = pairs.len(), "Configuration applied");

        if !self
            .persist_marker(OperationKind::Configuration, topic)
            .await
        {
            return;
        }
        self.trigger_restart(OperationKind::Configuration, topic)
            .await;
    }

    async fn run_firmware(&self, topic: &str, name: &str, version: &str, url: &str) {
        let credentials = self.credentials.read().clone();

        let image = match self.firmware.fetch(url, &credentials).await {
            Ok(image) => image,
            Err(e) => {
                warn!(category = e.category(), error = %e, "Firmware download failed");
                self.fail(topic, OperationKind::Firmware, &e.to_string())
                    .await;
                return;
            }
        };
        info!(name, version, bytes = image.len(), "Firmware downloaded");

        if let Err(e) = self.control.stage_firmware(name, version, &image).await {
            warn!(name, version, error = %e, "Staging firmware failed");
            self.fail(topic, OperationKind::Firmware, &e.to_string())
                .await;
            return;
        }

        if !self.persist_marker(OperationKind::Firmware, topic).await {
            return;
        }
        self.trigger_restart(OperationKind::Firmware, topic).await;
    }

    // -------------------------------------------------------------------------
    // Restart markers
    // -------------------------------------------------------------------------

    /// Persists the marker that survives the coming restart. On failure the
    /// operation is failed instead of restarting blind.
    async fn persist_marker(&self, kind: OperationKind, topic: &str) -> bool {
        let marker = OperationMarker::new(kind, topic);
        match self.markers.persist(&marker) {
            Ok(()) => true,
            Err(e) => {
                warn!(marker = kind.marker_name(), error = %e, "Persisting operation marker failed");
                self.fail(topic, kind, "marker persistence failed").await;
                false
            }
        }
    }

    async fn trigger_restart(&self, kind: OperationKind, topic: &str) {
        match self.control.restart().await {
            Ok(()) => {
                info!(operation = kind.fragment(), "Restart accepted, going down");
            }
            Err(e) => {
                warn!(operation = kind.fragment(), error = %e, "Restart failed");
                if let Err(remove_err) = self.markers.remove(kind) {
                    warn!(error = %remove_err, "Removing stale operation marker failed");
                }
                self.fail(topic, kind, &e.to_string()).await;
            }
        }
    }

    /// Completes operations that finished with a restart before this process
    /// came up. Call once per session, before announcing readiness.
    pub async fn resolve_pending(&self) {
        let markers = match self.markers.load_all() {
            Ok(markers) => markers,
            Err(e) => {
                warn!(error = %e, "Loading operation markers failed");
                return;
            }
        };

        for marker in markers {
            let wire = render::operation_successful(marker.kind, &[]);
            match self.link.publish(&marker.topic, &wire).await {
                Ok(()) => {
                    info!(
                        operation = marker.kind.fragment(),
                        "Operation completed across restart"
                    );
                    self.metrics.resolved_markers.fetch_add(1, Ordering::Relaxed);
                    if let Err(e) = self.markers.remove(marker.kind) {
                        warn!(error = %e, "Removing operation marker failed");
                    }
                }
                Err(e) => {
                    // Kept for the next session.
                    warn!(
                        operation = marker.kind.fragment(),
                        error = %e,
                        "Resolving operation marker failed"
                    );
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Acknowledgements
    // -------------------------------------------------------------------------

    async fn fail(&self, topic: &str, kind: OperationKind, reason: &str) {
        self.ack(topic, &render::operation_failed(kind, reason)).await;
        self.metrics.failed.fetch_add(1, Ordering::Relaxed);
    }

    async fn ack(&self, topic: &str, payload: &str) {
        if let Err(e) = self.link.publish(topic, payload).await {
            warn!(topic, error = %e, "Sending acknowledgement failed");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    use nimbus_core::error::{
        ControlError, ControlResult, FirmwareError, FirmwareResult, LinkError, LinkResult,
        SettingsResult, TagResult,
    };
    use nimbus_core::types::{LinkCredentials, TagKind, TagValue};
    use nimbus_link::shared_credentials;

    #[derive(Default)]
    struct StubLink {
        fail_publishes: AtomicBool,
        published: Mutex<Vec<(String, String)>>,
    }

    impl StubLink {
        fn published(&self) -> Vec<(String, String)> {
            self.published.lock().clone()
        }

        fn payloads(&self) -> Vec<String> {
            self.published.lock().iter().map(|(_, p)| p.clone()).collect()
        }
    }

    #[async_trait]
    impl CloudLink for StubLink {
        async fn connect(&self) -> LinkResult<()> {
            Ok(())
        }

        async fn disconnect(&self) -> LinkResult<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn publish(&self, topic: &str, payload: &str) -> LinkResult<()> {
            if self.fail_publishes.load(Ordering::SeqCst) {
                return Err(LinkError::publish_failed(topic, "stub refused"));
            }
            self.published.lock().push((topic.into(), payload.into()));
            Ok(())
        }

        async fn subscribe(&self, _topic: &str) -> LinkResult<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct StubTags {
        kind: Mutex<TagKind>,
        writes: Mutex<Vec<(String, TagValue)>>,
    }

    impl StubTags {
        fn of_kind(kind: TagKind) -> Self {
            Self {
                kind: Mutex::new(kind),
                writes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TagStore for StubTags {
        async fn tag_kind(&self, _name: &str) -> TagResult<TagKind> {
            Ok(*self.kind.lock())
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
            self.writes
                .lock()
                .push((name.into(), TagValue::Float(value)));
            Ok(())
        }

        async fn write_text(&self, name: &str, value: &str) -> TagResult<()> {
            self.writes
                .lock()
                .push((name.into(), TagValue::Text(value.into())));
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubControl {
        fail_restart: AtomicBool,
        fail_stage: AtomicBool,
        restarts: AtomicU64,
        staged: Mutex<Vec<(String, String, usize)>>,
    }

    #[async_trait]
    impl DeviceControl for StubControl {
        async fn restart(&self) -> ControlResult<()> {
            if self.fail_restart.load(Ordering::SeqCst) {
                return Err(ControlError::restart_failed("stub refused"));
            }
            self.restarts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stage_firmware(
            &self,
            name: &str,
            version: &str,
            image: &[u8],
        ) -> ControlResult<()> {
            if self.fail_stage.load(Ordering::SeqCst) {
                return Err(ControlError::stage_failed("stub refused"));
            }
            self.staged
                .lock()
                .push((name.into(), version.into(), image.len()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubSettings {
        unknown_keys: Vec<String>,
        applied: Mutex<Vec<(String, String)>>,
    }

    impl StubSettings {
        fn rejecting(keys: &[&str]) -> Self {
            Self {
                unknown_keys: keys.iter().map(|k| k.to_string()).collect(),
                applied: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SettingsStore for StubSettings {
        async fn set(&self, key: &str, value: &str) -> SettingsResult<()> {
            if self.unknown_keys.iter().any(|k| k == key) {
                return Err(SettingsError::unknown_key(key));
            }
            self.applied.lock().push((key.into(), value.into()));
            Ok(())
        }

        async fn snapshot(&self) -> SettingsResult<String> {
            Ok(String::new())
        }
    }

    struct StubFirmware {
        image: Vec<u8>,
        fail_with: Mutex<Option<FirmwareError>>,
    }

    impl StubFirmware {
        fn serving(image: Vec<u8>) -> Self {
            Self {
                image,
                fail_with: Mutex::new(None),
            }
        }

        fn failing(error: FirmwareError) -> Self {
            Self {
                image: Vec::new(),
                fail_with: Mutex::new(Some(error)),
            }
        }
    }

    #[async_trait]
    impl FirmwareSource for StubFirmware {
        async fn fetch(&self, _url: &str, _credentials: &LinkCredentials) -> FirmwareResult<Vec<u8>> {
            if let Some(error) = self.fail_with.lock().take() {
                return Err(error);
            }
            Ok(self.image.clone())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct Rig {
        dispatcher: CommandDispatcher<StubLink>,
        link: Arc<StubLink>,
        tags: Arc<StubTags>,
        control: Arc<StubControl>,
        settings: Arc<StubSettings>,
        marker_dir: TempDir,
    }

    impl Rig {
        fn markers(&self) -> MarkerStore {
            MarkerStore::new(self.marker_dir.path())
        }

        fn envelope(&self, payload: &str) -> InboundEnvelope {
            InboundEnvelope::new("tpl/ds", payload)
        }
    }

    fn rig_with(
        tags: StubTags,
        settings: StubSettings,
        firmware: StubFirmware,
    ) -> Rig {
        let link = Arc::new(StubLink::default());
        let tags = Arc::new(tags);
        let control = Arc::new(StubControl::default());
        let settings = Arc::new(settings);
        let marker_dir = TempDir::new().unwrap();

        let dispatcher = CommandDispatcher::new(
            link.clone(),
            tags.clone(),
            control.clone(),
            settings.clone(),
            Arc::new(firmware),
            MarkerStore::new(marker_dir.path()),
            shared_credentials(LinkCredentials::new("t", "device-gw", "secret")),
            "gw-7731",
            Arc::new(AtomicBool::new(true)),
        );

        Rig {
            dispatcher,
            link,
            tags,
            control,
            settings,
            marker_dir,
        }
    }

    fn rig() -> Rig {
        rig_with(
            StubTags::of_kind(TagKind::Float),
            StubSettings::default(),
            StubFirmware::serving(vec![0xAA; 64]),
        )
    }

    #[tokio::test]
    async fn test_restart_persists_marker_then_restarts() {
        let rig = rig();
        let envelope = rig.envelope("510,gw-7731");

        rig.dispatcher.handle(envelope).await;

        assert_eq!(rig.link.payloads(), vec!["501,nb_Restart"]);
        assert_eq!(rig.control.restarts.load(Ordering::SeqCst), 1);
        let marker = rig.markers().load(OperationKind::Restart).unwrap().unwrap();
        assert_eq!(marker.topic, "tpl/ds");
    }

    #[tokio::test]
    async fn test_mismatched_device_fails_without_executing() {
        let rig = rig();
        let envelope = rig.envelope("510,some-other-gw");

        rig.dispatcher.handle(envelope).await;

        assert_eq!(rig.link.payloads(), vec!["502,nb_Restart,device ID mismatch"]);
        assert_eq!(rig.control.restarts.load(Ordering::SeqCst), 0);
        assert!(rig.markers().load(OperationKind::Restart).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_operation_acked_executing_then_failed() {
        let rig = rig();
        let envelope = rig.envelope("511,gw-7731");

        rig.dispatcher.handle(envelope).await;

        assert_eq!(
            rig.link.payloads(),
            vec!["501,nb_Command", "502,nb_Command,format error"]
        );
        assert_eq!(rig.dispatcher.metrics().failed, 1);
    }

    #[tokio::test]
    async fn test_unknown_template_is_counted_and_dropped() {
        let rig = rig();
        let envelope = rig.envelope("999,gw-7731,whatever");

        rig.dispatcher.handle(envelope).await;

        assert!(rig.link.published().is_empty());
        assert_eq!(rig.dispatcher.metrics().unknown, 1);
    }

    #[tokio::test]
    async fn test_error_response_is_logged_not_acknowledged() {
        let rig = rig();
        let envelope = rig.envelope("41,510,No such operation queued");

        rig.dispatcher.handle(envelope).await;

        assert!(rig.link.published().is_empty());
        assert_eq!(rig.dispatcher.metrics().error_responses, 1);
    }

    #[tokio::test]
    async fn test_set_command_writes_typed_value() {
        let rig = rig();
        let envelope = rig.envelope("511,gw-7731,set boiler/temperature 21.5");

        rig.dispatcher.handle(envelope).await;

        assert_eq!(
            rig.tags.writes.lock().as_slice(),
            &[("boiler/temperature".to_string(), TagValue::Float(21.5))]
        );
        assert_eq!(
            rig.link.payloads(),
            vec!["501,nb_Command", "503,nb_Command"]
        );
        assert_eq!(rig.dispatcher.metrics().successful, 1);
    }

    #[tokio::test]
    async fn test_setf_command_addresses_folder_tag() {
        let rig = rig_with(
            StubTags::of_kind(TagKind::Int),
            StubSettings::default(),
            StubFirmware::serving(Vec::new()),
        );
        let envelope = rig.envelope("511,gw-7731,setf boiler temperature 42");

        rig.dispatcher.handle(envelope).await;

        assert_eq!(
            rig.tags.writes.lock().as_slice(),
            &[("boiler/temperature".to_string(), TagValue::Int(42))]
        );
    }

    #[tokio::test]
    async fn test_unsupported_command_verb_is_rejected() {
        let rig = rig();
        let envelope = rig.envelope("511,gw-7731,reboot now");

        rig.dispatcher.handle(envelope).await;

        assert_eq!(
            rig.link.payloads(),
            vec!["501,nb_Command", "502,nb_Command,unsupported operation"]
        );
    }

    #[tokio::test]
    async fn test_bad_value_for_tag_kind_fails_command() {
        let rig = rig_with(
            StubTags::of_kind(TagKind::Int),
            StubSettings::default(),
            StubFirmware::serving(Vec::new()),
        );
        let envelope = rig.envelope("511,gw-7731,set counter banana");

        rig.dispatcher.handle(envelope).await;

        assert!(rig.tags.writes.lock().is_empty());
        let payloads = rig.link.payloads();
        assert_eq!(payloads[0], "501,nb_Command");
        assert!(payloads[1].starts_with("502,nb_Command,"));
    }

    #[tokio::test]
    async fn test_measurements_toggle_updates_flag_and_settings() {
        let rig = rig();
        let envelope = rig.envelope("511,gw-7731,measurements disable");

        rig.dispatcher.handle(envelope).await;

        assert!(!rig.dispatcher.measurements.load(Ordering::SeqCst));
        assert_eq!(
            rig.settings.applied.lock().as_slice(),
            &[("measurements".to_string(), "false".to_string())]
        );
        assert_eq!(
            rig.link.payloads(),
            vec!["501,nb_Command", "503,nb_Command"]
        );
    }

    #[tokio::test]
    async fn test_configuration_applies_known_keys_ignores_unknown() {
        let rig = rig_with(
            StubTags::of_kind(TagKind::Float),
            StubSettings::rejecting(&["mystery"]),
            StubFirmware::serving(Vec::new()),
        );
        let envelope = rig.envelope("513,gw-7731,\"interval=60\\npolicy=max\\nmystery=1\"");

        rig.dispatcher.handle(envelope).await;

        assert_eq!(
            rig.settings.applied.lock().as_slice(),
            &[
                ("interval".to_string(), "60".to_string()),
                ("policy".to_string(), "max".to_string()),
            ]
        );
        assert_eq!(rig.control.restarts.load(Ordering::SeqCst), 1);
        let marker = rig
            .markers()
            .load(OperationKind::Configuration)
            .unwrap()
            .unwrap();
        assert_eq!(marker.topic, "tpl/ds");
        assert_eq!(rig.link.payloads(), vec!["501,nb_Configuration"]);
    }

    #[tokio::test]
    async fn test_firmware_downloaded_staged_and_restarts() {
        let rig = rig();
        let envelope =
            rig.envelope("515,gw-7731,boiler-fw,2.1.0,https://img.example.com/fw/2.1.0");

        rig.dispatcher.handle(envelope).await;

        assert_eq!(
            rig.control.staged.lock().as_slice(),
            &[("boiler-fw".to_string(), "2.1.0".to_string(), 64)]
        );
        assert_eq!(rig.control.restarts.load(Ordering::SeqCst), 1);
        assert!(rig
            .markers()
            .load(OperationKind::Firmware)
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_firmware_download_failure_fails_without_marker() {
        let rig = rig_with(
            StubTags::of_kind(TagKind::Float),
            StubSettings::default(),
            StubFirmware::failing(FirmwareError::Auth { status: 401 }),
        );
        let envelope = rig.envelope("515,gw-7731,boiler-fw,2.1.0,https://img.example.com/fw");

        rig.dispatcher.handle(envelope).await;

        let payloads = rig.link.payloads();
        assert_eq!(payloads[0], "501,nb_Firmware");
        assert!(payloads[1].starts_with("502,nb_Firmware,"));
        assert!(rig.control.staged.lock().is_empty());
        assert_eq!(rig.control.restarts.load(Ordering::SeqCst), 0);
        assert!(rig
            .markers()
            .load(OperationKind::Firmware)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_failed_restart_removes_marker_and_fails_operation() {
        let rig = rig();
        rig.control.fail_restart.store(true, Ordering::SeqCst);
        let envelope = rig.envelope("510,gw-7731");

        rig.dispatcher.handle(envelope).await;

        let payloads = rig.link.payloads();
        assert_eq!(payloads[0], "501,nb_Restart");
        assert!(payloads[1].starts_with("502,nb_Restart,"));
        assert!(rig.markers().load(OperationKind::Restart).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_pending_acknowledges_and_deletes_markers() {
        let rig = rig();
        rig.markers()
            .persist(&OperationMarker::new(OperationKind::Restart, "tpl/ds"))
            .unwrap();

        rig.dispatcher.resolve_pending().await;

        assert_eq!(rig.link.published(), vec![(
            "tpl/ds".to_string(),
            "503,nb_Restart".to_string()
        )]);
        assert!(rig.markers().load(OperationKind::Restart).unwrap().is_none());
        assert_eq!(rig.dispatcher.metrics().resolved_markers, 1);
    }

    #[tokio::test]
    async fn test_resolve_pending_keeps_marker_when_send_fails() {
        let rig = rig();
        rig.markers()
            .persist(&OperationMarker::new(OperationKind::Restart, "tpl/ds"))
            .unwrap();
        rig.link.fail_publishes.store(true, Ordering::SeqCst);

        rig.dispatcher.resolve_pending().await;

        assert!(rig.markers().load(OperationKind::Restart).unwrap().is_some());
        assert_eq!(rig.dispatcher.metrics().resolved_markers, 0);
    }
}
