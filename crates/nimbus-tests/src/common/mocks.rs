// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Mock implementations for testing NIMBUS components in isolation.
//!
//! ## Design Principles
//!
//! - Configurable behavior for different test scenarios
//! - Recording of interactions for verification
//! - Thread-safe for concurrent testing
//! - Easy to set up error injection

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use nimbus_core::error::{
    ControlError, ControlResult, FirmwareError, FirmwareResult, LinkError, LinkResult,
    SettingsError, SettingsResult, SourceError, SourceResult, TagError, TagResult,
};
use nimbus_core::types::{DataPoint, LinkCredentials, TagKind, TagValue};
use nimbus_link::{CloudLink, CredentialSink, SessionHandler};
use nimbus_relay::{
    DeviceControl, FirmwareSource, MemoryProbe, SampleSource, SettingsStore, SourceCursor,
    SourceSpan, TagStore,
};

// =============================================================================
// Mock Sample Source
// =============================================================================

/// A scriptable sample source for driving the relay loop.
///
/// Batches queued with [`MockSampleSource::push_batch`] come back one per
/// pull; queued failures take precedence over queued batches.
#[derive(Default)]
pub struct MockSampleSource {
    /// Batches waiting to be pulled, oldest first.
    batches: Mutex<VecDeque<Vec<DataPoint>>>,

    /// Failures injected ahead of the next pulls.
    fail_with: Mutex<VecDeque<SourceError>>,

    /// Lag reported with every span.
    lag: Mutex<Duration>,

    /// Fresh-cursor count for verification.
    pub fresh_calls: AtomicU64,

    /// Pull count for verification.
    pub pull_calls: AtomicU64,

    cursor_seq: AtomicU64,
}

impl MockSampleSource {
    /// Create an empty source; pulls return empty spans.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source holding a single batch.
    pub fn with_batch(points: Vec<DataPoint>) -> Self {
        let source = Self::default();
        source.push_batch(points);
        source
    }

    /// Queue a batch for a later pull.
    pub fn push_batch(&self, points: Vec<DataPoint>) {
        self.batches.lock().push_back(points);
    }

    /// Queue failures served before any remaining batches.
    pub fn queue_failures(&self, errors: impl IntoIterator<Item = SourceError>) {
        self.fail_with.lock().extend(errors);
    }

    /// Set the lag reported with every span.
    pub fn set_lag(&self, lag: Duration) {
        *self.lag.lock() = lag;
    }
}

#[async_trait]
impl SampleSource for MockSampleSource {
    async fn fresh_cursor(&self) -> SourceResult<SourceCursor> {
        self.fresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SourceCursor::new("c0"))
    }

    async fn next_span(&self, _cursor: &SourceCursor) -> SourceResult<SourceSpan> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fail_with.lock().pop_front() {
            return Err(error);
        }
        let points = self.batches.lock().pop_front().unwrap_or_default();
        let seq = self.cursor_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SourceSpan::new(
            points,
            SourceCursor::new(format!("c{seq}")),
            *self.lag.lock(),
        ))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// =============================================================================
// Mock Cloud Link
// =============================================================================

/// A mock platform link recording every publish.
#[derive(Default)]
pub struct MockCloudLink {
    /// Connection state.
    connected: AtomicBool,

    /// Force all publishes to fail.
    pub fail_publishes: AtomicBool,

    /// Number of connect attempts to fail before succeeding.
    pub fail_connects: AtomicU64,

    /// Connect count for verification.
    pub connect_calls: AtomicU64,

    /// Published `(topic, payload)` pairs, in order.
    published: Mutex<Vec<(String, String)>>,

    /// Subscribed topics, in order.
    subscribed: Mutex<Vec<String>>,
}

impl MockCloudLink {
    /// Create a disconnected link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a link that is already connected.
    pub fn connected() -> Self {
        let link = Self::default();
        link.connected.store(true, Ordering::SeqCst);
        link
    }

    /// Everything published so far, as `(topic, payload)` pairs.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    /// Payloads published so far, in order.
    pub fn payloads(&self) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Topics published to so far, in order.
    pub fn topics(&self) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    /// Topics subscribed so far, in order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscribed.lock().clone()
    }
}

#[async_trait]
impl CloudLink for MockCloudLink {
    async fn connect(&self) -> LinkResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connects.load(Ordering::SeqCst) > 0 {
            self.fail_connects.fetch_sub(1, Ordering::SeqCst);
            return Err(LinkError::connection_failed("mock refused"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> LinkResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: &str) -> LinkResult<()> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(LinkError::publish_failed(topic, "mock refused"));
        }
        self.published.lock().push((topic.into(), payload.into()));
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> LinkResult<()> {
        self.subscribed.lock().push(topic.into());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// =============================================================================
// Mock Tag Store
// =============================================================================

/// A mock tag facade with per-tag kinds and write recording.
pub struct MockTagStore {
    default_kind: TagKind,

    /// Kinds registered for specific tags.
    kinds: Mutex<HashMap<String, TagKind>>,

    /// Tags reported as missing.
    missing: Mutex<Vec<String>>,

    /// Force all writes to fail.
    pub fail_writes: AtomicBool,

    /// Recorded writes, in order.
    pub writes: Mutex<Vec<(String, TagValue)>>,
}

impl Default for MockTagStore {
    fn default() -> Self {
        Self::of_kind(TagKind::Float)
    }
}

impl MockTagStore {
    /// Create a store reporting `kind` for every tag.
    pub fn of_kind(kind: TagKind) -> Self {
        Self {
            default_kind: kind,
            kinds: Mutex::new(HashMap::new()),
            missing: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Register a kind for one specific tag.
    pub fn register(&self, name: impl Into<String>, kind: TagKind) {
        self.kinds.lock().insert(name.into(), kind);
    }

    /// Make one tag report as missing.
    pub fn remove(&self, name: impl Into<String>) {
        self.missing.lock().push(name.into());
    }

    fn record(&self, name: &str, value: TagValue) -> TagResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TagError::write_failed(name, "mock refused"));
        }
        self.writes.lock().push((name.to_string(), value));
        Ok(())
    }
}

#[async_trait]
impl TagStore for MockTagStore {
    async fn tag_kind(&self, name: &str) -> TagResult<TagKind> {
        if self.missing.lock().iter().any(|n| n == name) {
            return Err(TagError::not_found(name));
        }
        Ok(self
            .kinds
            .lock()
            .get(name)
            .copied()
            .unwrap_or(self.default_kind))
    }

    async fn write_bool(&self, name: &str, value: bool) -> TagResult<()> {
        self.record(name, TagValue::Bool(value))
    }

    async fn write_int(&self, name: &str, value: i64) -> TagResult<()> {
        self.record(name, TagValue::Int(value))
    }

    async fn write_float(&self, name: &str, value: f64) -> TagResult<()> {
        self.record(name, TagValue::Float(value))
    }

    async fn write_text(&self, name: &str, value: &str) -> TagResult<()> {
        self.record(name, TagValue::Text(value.into()))
    }
}

// =============================================================================
// Mock Device Control
// =============================================================================

/// A mock device controller counting restarts and staged images.
#[derive(Default)]
pub struct MockDeviceControl {
    /// Force restart requests to fail.
    pub fail_restart: AtomicBool,

    /// Force firmware staging to fail.
    pub fail_stage: AtomicBool,

    /// Accepted restart count.
    pub restarts: AtomicU64,

    /// Staged `(name, version, image length)` triples, in order.
    pub staged: Mutex<Vec<(String, String, usize)>>,
}

impl MockDeviceControl {
    /// Create a controller that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceControl for MockDeviceControl {
    async fn restart(&self) -> ControlResult<()> {
        if self.fail_restart.load(Ordering::SeqCst) {
            return Err(ControlError::restart_failed("mock refused"));
        }
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stage_firmware(&self, name: &str, version: &str, image: &[u8]) -> ControlResult<()> {
        if self.fail_stage.load(Ordering::SeqCst) {
            return Err(ControlError::stage_failed("mock refused"));
        }
        self.staged
            .lock()
            .push((name.into(), version.into(), image.len()));
        Ok(())
    }
}

// =============================================================================
// Mock Settings Store
// =============================================================================

/// A mock settings store with configurable unknown keys.
#[derive(Default)]
pub struct MockSettingsStore {
    unknown_keys: Vec<String>,

    /// Force every write to fail outright.
    pub fail_writes: AtomicBool,

    /// Applied `(key, value)` pairs, in order.
    pub applied: Mutex<Vec<(String, String)>>,
}

impl MockSettingsStore {
    /// Create a store accepting every key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store rejecting the given keys as unknown.
    pub fn rejecting(keys: &[&str]) -> Self {
        Self {
            unknown_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SettingsStore for MockSettingsStore {
    async fn set(&self, key: &str, value: &str) -> SettingsResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SettingsError::write_failed(key, "mock refused"));
        }
        if self.unknown_keys.iter().any(|k| k == key) {
            return Err(SettingsError::unknown_key(key));
        }
        self.applied.lock().push((key.into(), value.into()));
        Ok(())
    }

    async fn snapshot(&self) -> SettingsResult<String> {
        let applied = self.applied.lock();
        let lines: Vec<String> = applied
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        Ok(lines.join("\n"))
    }
}

// =============================================================================
// Mock Firmware Source
// =============================================================================

/// A mock firmware source serving a fixed image.
pub struct MockFirmwareSource {
    image: Vec<u8>,

    /// Failure served on the next fetch, then cleared.
    fail_with: Mutex<Option<FirmwareError>>,

    /// URLs fetched, in order.
    pub fetched_urls: Mutex<Vec<String>>,

    /// Logins presented with each fetch, in order.
    pub seen_logins: Mutex<Vec<String>>,
}

impl Default for MockFirmwareSource {
    fn default() -> Self {
        Self::serving(vec![0xAA; 64])
    }
}

impl MockFirmwareSource {
    /// Create a source serving the given image.
    pub fn serving(image: Vec<u8>) -> Self {
        Self {
            image,
            fail_with: Mutex::new(None),
            fetched_urls: Mutex::new(Vec::new()),
            seen_logins: Mutex::new(Vec::new()),
        }
    }

    /// Create a source whose next fetch fails with `error`.
    pub fn failing(error: FirmwareError) -> Self {
        let source = Self::serving(Vec::new());
        *source.fail_with.lock() = Some(error);
        source
    }
}

#[async_trait]
impl FirmwareSource for MockFirmwareSource {
    async fn fetch(&self, url: &str, credentials: &LinkCredentials) -> FirmwareResult<Vec<u8>> {
        self.fetched_urls.lock().push(url.to_string());
        self.seen_logins.lock().push(credentials.login());
        if let Some(error) = self.fail_with.lock().take() {
            return Err(error);
        }
        Ok(self.image.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// =============================================================================
// Mock Memory Probe
// =============================================================================

/// A mock memory probe with a settable reading.
pub struct MockMemoryProbe {
    available: Mutex<Option<u64>>,

    /// Collection hints issued.
    pub hints: AtomicU64,
}

impl Default for MockMemoryProbe {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl MockMemoryProbe {
    /// Create a probe with no reading; the memory floor never trips.
    pub fn unbounded() -> Self {
        Self {
            available: Mutex::new(None),
            hints: AtomicU64::new(0),
        }
    }

    /// Create a probe reporting the given number of available bytes.
    pub fn with_available(bytes: u64) -> Self {
        let probe = Self::unbounded();
        *probe.available.lock() = Some(bytes);
        probe
    }

    /// Change the reported reading.
    pub fn set_available(&self, bytes: Option<u64>) {
        *self.available.lock() = bytes;
    }
}

impl MemoryProbe for MockMemoryProbe {
    fn available_bytes(&self) -> Option<u64> {
        *self.available.lock()
    }

    fn hint_collect(&self) {
        self.hints.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// =============================================================================
// Mock Credential Sink
// =============================================================================

/// A mock credential sink recording every persisted credential set.
#[derive(Default)]
pub struct MockCredentialSink {
    /// Force persists to fail.
    pub fail_persists: AtomicBool,

    /// Credentials persisted, in order.
    pub persisted: Mutex<Vec<LinkCredentials>>,
}

#[async_trait]
impl CredentialSink for MockCredentialSink {
    async fn persist(&self, credentials: &LinkCredentials) -> LinkResult<()> {
        if self.fail_persists.load(Ordering::SeqCst) {
            return Err(LinkError::provisioning_failed("mock refused"));
        }
        self.persisted.lock().push(credentials.clone());
        Ok(())
    }
}

// =============================================================================
// Mock Session Handler
// =============================================================================

/// A mock session handler counting established sessions.
#[derive(Default)]
pub struct MockSessionHandler {
    /// Force session preparation to fail.
    pub fail_next: AtomicBool,

    /// Sessions prepared.
    pub established: AtomicU64,
}

#[async_trait]
impl SessionHandler for MockSessionHandler {
    async fn on_established(&self) -> LinkResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(LinkError::protocol("mock refused"));
        }
        self.established.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
