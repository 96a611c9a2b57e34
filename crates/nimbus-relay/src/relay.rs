// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Periodic data relay loop.
//!
//! The [`DataRelay`] moves samples from the local historical store to the
//! platform. Each cycle runs the same gate sequence:
//!
//! 1. Memory floor: below the configured floor the cycle is skipped with a
//!    warning and the probe's collection hint is invoked.
//! 2. Link check: a disconnected link skips the cycle silently; the
//!    supervisor owns reconnection.
//! 3. Backlog drain: messages queued by earlier failed publishes are retried
//!    first, keeping delivery ordered ahead of fresh telemetry.
//! 4. Measurements gate: when relaying is disabled the poll is skipped and
//!    the cursor does not advance, so re-enabling loses nothing.
//! 5. Pull: the next span is pulled through the resumable cursor. Repeated
//!    pull failures abandon the cursor; an invalidated cursor is abandoned
//!    immediately. Excessive lag is logged, never fatal.
//! 6. Publish: text samples relay as basic events; the rest go through the
//!    aggregation pipeline or straight measurement templates. A failed
//!    publish queues the message and the cycle moves on.
//!
//! # Example
//!
//! ```rust,ignore
//! let relay = DataRelay::new(source, link, probe, topics, measurements,
//!     "gw-7731", RelayConfig::default())?;
//! let handle = Arc::new(relay).start(shutdown.clone());
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use nimbus_aggregate::{partition, AggregationPolicy, Aggregator};
use nimbus_codec::render;
use nimbus_core::error::{AggregateResult, SourceError};
use nimbus_core::tagname::TagName;
use nimbus_core::types::DataPoint;
use nimbus_link::{CloudLink, Topics};

use crate::pending::{PendingKind, PendingMessage, PendingQueue, PendingStats};
use crate::probe::MemoryProbe;
use crate::source::{SampleSource, SourceCursor};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the data relay loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Interval between relay cycles.
    #[serde(default = "default_interval")]
    #[serde(with = "duration_secs")]
    pub interval: Duration,

    /// Whether samples are reduced per window before publishing.
    #[serde(default = "default_enable_aggregation")]
    pub enable_aggregation: bool,

    /// Aggregation policy name (`first`, `last`, `min`, `max`, `average`).
    #[serde(default = "default_policy")]
    pub policy: String,

    /// Aggregation window length.
    #[serde(default = "default_window")]
    #[serde(with = "duration_secs")]
    pub window: Duration,

    /// Minimum available system memory required to run a cycle.
    #[serde(default = "default_memory_floor_bytes")]
    pub memory_floor_bytes: u64,

    /// Maximum number of messages held for retry.
    #[serde(default = "default_pending_limit")]
    pub pending_limit: usize,

    /// Consecutive pull failures before the cursor is abandoned.
    #[serde(default = "default_cursor_failure_threshold")]
    pub cursor_failure_threshold: u32,

    /// Source lag above which a warning is logged.
    #[serde(default = "default_lag_warn_threshold")]
    #[serde(with = "duration_secs")]
    pub lag_warn_threshold: Duration,
}

fn default_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_enable_aggregation() -> bool {
    true
}

fn default_policy() -> String {
    "last".to_string()
}

fn default_window() -> Duration {
    Duration::from_secs(60)
}

fn default_memory_floor_bytes() -> u64 {
    16 * 1024 * 1024
}

fn default_pending_limit() -> usize {
    1000
}

fn default_cursor_failure_threshold() -> u32 {
    5
}

fn default_lag_warn_threshold() -> Duration {
    Duration::from_secs(300)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            enable_aggregation: default_enable_aggregation(),
            policy: default_policy(),
            window: default_window(),
            memory_floor_bytes: default_memory_floor_bytes(),
            pending_limit: default_pending_limit(),
            cursor_failure_threshold: default_cursor_failure_threshold(),
            lag_warn_threshold: default_lag_warn_threshold(),
        }
    }
}

impl RelayConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }

    /// Creates a configuration for testing (fast cycles, tiny limits).
    pub fn for_testing() -> Self {
        Self {
            interval: Duration::from_millis(20),
            enable_aggregation: true,
            policy: "last".to_string(),
            window: Duration::from_secs(1),
            memory_floor_bytes: 0,
            pending_limit: 16,
            cursor_failure_threshold: 2,
            lag_warn_threshold: Duration::from_secs(60),
        }
    }
}

/// Builder for [`RelayConfig`].
#[derive(Debug, Default)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    /// Sets the cycle interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Enables or disables aggregation.
    pub fn enable_aggregation(mut self, enabled: bool) -> Self {
        self.config.enable_aggregation = enabled;
        self
    }

    /// Sets the aggregation policy name.
    pub fn policy(mut self, policy: impl Into<String>) -> Self {
        self.config.policy = policy.into();
        self
    }

    /// Sets the aggregation window length.
    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    /// Sets the memory floor.
    pub fn memory_floor_bytes(mut self, bytes: u64) -> Self {
        self.config.memory_floor_bytes = bytes;
        self
    }

    /// Sets the pending queue capacity.
    pub fn pending_limit(mut self, limit: usize) -> Self {
        self.config.pending_limit = limit;
        self
    }

    /// Sets the cursor failure threshold.
    pub fn cursor_failure_threshold(mut self, threshold: u32) -> Self {
        self.config.cursor_failure_threshold = threshold.max(1);
        self
    }

    /// Sets the lag warning threshold.
    pub fn lag_warn_threshold(mut self, threshold: Duration) -> Self {
        self.config.lag_warn_threshold = threshold;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RelayConfig {
        self.config
    }
}

// =============================================================================
// Metrics
// =============================================================================

#[derive(Debug, Default)]
struct RelayMetricsInner {
    cycles: AtomicU64,
    skipped_low_memory: AtomicU64,
    skipped_disconnected: AtomicU64,
    skipped_disabled: AtomicU64,
    points_pulled: AtomicU64,
    published: AtomicU64,
    publish_failures: AtomicU64,
    cursor_resets: AtomicU64,
}

/// Snapshot of relay activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayMetrics {
    /// Cycles run, including skipped ones.
    pub cycles: u64,
    /// Cycles skipped for low memory.
    pub skipped_low_memory: u64,
    /// Cycles skipped while disconnected.
    pub skipped_disconnected: u64,
    /// Polls skipped while measurement relaying was disabled.
    pub skipped_disabled: u64,
    /// Samples pulled from the source.
    pub points_pulled: u64,
    /// Messages published.
    pub published: u64,
    /// Failed publish attempts.
    pub publish_failures: u64,
    /// Cursors abandoned after failures.
    pub cursor_resets: u64,
    /// Pending queue activity.
    pub pending: PendingStats,
}

// =============================================================================
// Data Relay
// =============================================================================

/// Periodic loop relaying samples from the local store to the platform.
pub struct DataRelay<S, L>
where
    S: SampleSource + 'static,
    L: CloudLink + 'static,
{
    source: Arc<S>,
    link: Arc<L>,
    probe: Arc<dyn MemoryProbe>,
    topics: Topics,
    aggregator: Option<Aggregator>,
    config: RelayConfig,
    measurements: Arc<AtomicBool>,
    pending: Arc<PendingQueue>,
    cursor: Mutex<Option<SourceCursor>>,
    pull_failures: AtomicU32,
    metrics: RelayMetricsInner,
    running: Arc<AtomicBool>,
}

impl<S, L> DataRelay<S, L>
where
    S: SampleSource + 'static,
    L: CloudLink + 'static,
{
    /// Creates a relay.
    ///
    /// Fails when aggregation is enabled with an unknown policy name or an
    /// unusable window.
    pub fn new(
        source: Arc<S>,
        link: Arc<L>,
        probe: Arc<dyn MemoryProbe>,
        topics: Topics,
        measurements: Arc<AtomicBool>,
        host_id: impl Into<String>,
        config: RelayConfig,
    ) -> AggregateResult<Self> {
        let aggregator = if config.enable_aggregation {
            let policy = AggregationPolicy::from_value(&config.policy)?;
            Some(Aggregator::new(policy, config.window, host_id)?)
        } else {
            None
        };

        Ok(Self {
            source,
            link,
            probe,
            topics,
            aggregator,
            pending: Arc::new(PendingQueue::new(config.pending_limit)),
            config,
            measurements,
            cursor: Mutex::new(None),
            pull_failures: AtomicU32::new(0),
            metrics: RelayMetricsInner::default(),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Whether the relay loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of relay activity.
    pub fn metrics(&self) -> RelayMetrics {
        RelayMetrics {
            cycles: self.metrics.cycles.load(Ordering::Relaxed),
            skipped_low_memory: self.metrics.skipped_low_memory.load(Ordering::Relaxed),
            skipped_disconnected: self.metrics.skipped_disconnected.load(Ordering::Relaxed),
            skipped_disabled: self.metrics.skipped_disabled.load(Ordering::Relaxed),
            points_pulled: self.metrics.points_pulled.load(Ordering::Relaxed),
            published: self.metrics.published.load(Ordering::Relaxed),
            publish_failures: self.metrics.publish_failures.load(Ordering::Relaxed),
            cursor_resets: self.metrics.cursor_resets.load(Ordering::Relaxed),
            pending: self.pending.stats(),
        }
    }

    /// Starts the relay loop in the background.
    pub fn start(self: Arc<Self>, shutdown: Arc<Notify>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            info!(
                interval_s = self.config.interval.as_secs(),
                aggregation = self.config.enable_aggregation,
                policy = %self.config.policy,
                "Data relay started"
            );

            let mut interval = tokio::time::interval(self.config.interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.cycle_once().await;
                    }
                    _ = shutdown.notified() => {
                        info!("Data relay shutting down");
                        // Last chance for queued telemetry while the link
                        // may still be up.
                        if self.link.is_connected() {
                            self.drain_pending().await;
                        }
                        break;
                    }
                }
            }

            self.running.store(false, Ordering::SeqCst);
            info!("Data relay stopped");
        })
    }

    /// Runs one relay cycle. Public so tests can step the loop by hand.
    pub async fn cycle_once(&self) {
        self.metrics.cycles.fetch_add(1, Ordering::Relaxed);

        if let Some(available) = self.probe.available_bytes() {
            if available < self.config.memory_floor_bytes {
                warn!(
                    available_bytes = available,
                    floor_bytes = self.config.memory_floor_bytes,
                    "Available memory below floor, skipping cycle"
                );
                self.probe.hint_collect();
                self.metrics.skipped_low_memory.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        if !self.link.is_connected() {
            self.metrics
                .skipped_disconnected
                .fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.drain_pending().await;

        if !self.measurements.load(Ordering::Relaxed) {
            debug!("Measurement relaying disabled, skipping poll");
            self.metrics.skipped_disabled.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let Some(points) = self.pull_points().await else {
            return;
        };
        if points.is_empty() {
            return;
        }

        self.relay_points(points).await;
    }

    /// Pulls the next span, tracking cursor health.
    async fn pull_points(&self) -> Option<Vec<DataPoint>> {
        // Clone out of the lock before awaiting so the guard is not held
        // across the suspend point.
        let stored = self.cursor.lock().clone();
        let cursor = match stored {
            Some(cursor) => cursor,
            None => match self.source.fresh_cursor().await {
                Ok(cursor) => {
                    debug!(source = self.source.name(), cursor = %cursor, "Opened fresh cursor");
                    *self.cursor.lock() = Some(cursor.clone());
                    cursor
                }
                Err(e) => {
                    warn!(source = self.source.name(), error = %e, "Opening cursor failed");
                    self.record_pull_failure(false);
                    return None;
                }
            },
        };

        match self.source.next_span(&cursor).await {
            Ok(span) => {
                self.pull_failures.store(0, Ordering::Relaxed);
                if span.lag > self.config.lag_warn_threshold {
                    warn!(
                        lag_s = span.lag.as_secs(),
                        threshold_s = self.config.lag_warn_threshold.as_secs(),
                        "Source cursor is lagging"
                    );
                }
                *self.cursor.lock() = Some(span.cursor);
                self.metrics
                    .points_pulled
                    .fetch_add(span.points.len() as u64, Ordering::Relaxed);
                Some(span.points)
            }
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "Pulling samples failed");
                let invalidated = matches!(e, SourceError::CursorInvalid { .. });
                self.record_pull_failure(invalidated);
                None
            }
        }
    }

    fn record_pull_failure(&self, cursor_invalidated: bool) {
        let failures = self.pull_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if cursor_invalidated || failures >= self.config.cursor_failure_threshold {
            warn!(
                consecutive_failures = failures,
                "Abandoning source cursor, a fresh one will be opened"
            );
            *self.cursor.lock() = None;
            self.pull_failures.store(0, Ordering::Relaxed);
            self.metrics.cursor_resets.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Routes a pulled batch into events, aggregated payloads, or plain
    /// measurement templates, and publishes each message.
    async fn relay_points(&self, points: Vec<DataPoint>) {
        let (samples, events) = partition(points);

        for event in events {
            let wire = render::event(&event.event_type, &event.text, event.timestamp);
            self.publish_or_queue(PendingMessage::template(wire, event.child_device))
                .await;
        }

        match &self.aggregator {
            Some(aggregator) => {
                for payload in aggregator.aggregate(&samples) {
                    self.publish_or_queue(PendingMessage::aggregated(
                        payload.to_wire(),
                        payload.child_device,
                    ))
                    .await;
                }
            }
            None => {
                for point in samples {
                    let tag = TagName::resolve_point(&point.name);
                    let wire = render::measurement(
                        &tag.fragment,
                        &tag.series,
                        &point.value,
                        point.unit.as_deref(),
                        Some(point.timestamp),
                    );
                    self.publish_or_queue(PendingMessage::template(wire, tag.child_device))
                        .await;
                }
            }
        }
    }

    /// Retries everything in the pending queue, oldest first.
    async fn drain_pending(&self) {
        let backlog = self.pending.take_all();
        if backlog.is_empty() {
            return;
        }
        debug!(count = backlog.len(), "Draining pending messages");
        for message in backlog {
            self.publish_or_queue(message).await;
        }
    }

    /// Publishes one message; a failure queues it for the next cycle.
    async fn publish_or_queue(&self, mut message: PendingMessage) {
        let topic = self.topic_for(&message);
        match self.link.publish(&topic, &message.payload).await {
            Ok(()) => {
                self.metrics.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                message.mark_attempt();
                warn!(
                    topic = %topic,
                    attempts = message.attempts,
                    error = %e,
                    "Publish failed, queueing for retry"
                );
                self.metrics.publish_failures.fetch_add(1, Ordering::Relaxed);
                self.pending.push(message);
            }
        }
    }

    fn topic_for(&self, message: &PendingMessage) -> String {
        match message.kind {
            PendingKind::Template => self.topics.template_topic(message.child_device.as_deref()),
            // Aggregated payloads carry their routing in `externalSource`.
            PendingKind::AggregatedJson => self.topics.publish_json.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
