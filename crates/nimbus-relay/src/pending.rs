// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Pending-message retry queue.
//!
//! Messages that fail to publish land here instead of blocking the relay
//! cycle. The queue is bounded: at capacity the oldest message is dropped
//! with a warning, so a long outage degrades to losing the oldest telemetry
//! rather than growing without limit. Each healthy cycle drains the queue
//! before pulling new samples; a message that fails again is re-queued with
//! its attempt counter incremented.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ===========================================================================
// Messages
// ===========================================================================

/// Wire form of a queued message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    /// Comma-delimited template line, published to the template topic.
    Template,
    /// Aggregated JSON document, published to the JSON topic.
    AggregatedJson,
}

/// One message awaiting (re)publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Finished wire payload.
    pub payload: String,
    /// Child device the payload belongs to, `None` for the gateway.
    pub child_device: Option<String>,
    /// Wire form, which selects the target topic.
    pub kind: PendingKind,
    /// Failed publish attempts so far.
    pub attempts: u32,
}

impl PendingMessage {
    /// Wraps a template line.
    pub fn template(payload: impl Into<String>, child_device: Option<String>) -> Self {
        Self {
            payload: payload.into(),
            child_device,
            kind: PendingKind::Template,
            attempts: 0,
        }
    }

    /// Wraps an aggregated JSON document.
    pub fn aggregated(payload: impl Into<String>, child_device: Option<String>) -> Self {
        Self {
            payload: payload.into(),
            child_device,
            kind: PendingKind::AggregatedJson,
            attempts: 0,
        }
    }

    /// Records one failed publish attempt.
    pub fn mark_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }
}

// ===========================================================================
// Statistics
// ===========================================================================

#[derive(Debug, Default)]
struct PendingStatsInner {
    queued: AtomicU64,
    drained: AtomicU64,
    dropped: AtomicU64,
}

impl PendingStatsInner {
    fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    fn record_drained(&self, count: u64) {
        self.drained.fetch_add(count, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of queue activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingStats {
    /// Messages ever queued.
    pub queued: u64,
    /// Messages handed back for retry.
    pub drained: u64,
    /// Messages dropped at capacity.
    pub dropped: u64,
    /// Messages currently waiting.
    pub current: u64,
}

// ===========================================================================
// Queue
// ===========================================================================

/// Bounded FIFO of messages awaiting retry.
///
/// `len()` and `is_empty()` are O(1) atomic loads; the queue itself sits
/// behind a `parking_lot::RwLock` and is never held across an await.
#[derive(Debug)]
pub struct PendingQueue {
    queue: RwLock<VecDeque<PendingMessage>>,
    capacity: usize,
    item_count: AtomicU64,
    stats: PendingStatsInner,
}

impl PendingQueue {
    /// Creates a queue holding at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: RwLock::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity: capacity.max(1),
            item_count: AtomicU64::new(0),
            stats: PendingStatsInner::default(),
        }
    }

    /// Queues a message, dropping the oldest when at capacity.
    pub fn push(&self, message: PendingMessage) {
        let mut dropped = None;
        {
            let mut queue = self.queue.write();
            if queue.len() >= self.capacity {
                dropped = queue.pop_front();
            }
            queue.push_back(message);
        }

        if let Some(old) = dropped {
            warn!(
                capacity = self.capacity,
                attempts = old.attempts,
                "Pending queue full, dropping oldest message"
            );
            self.stats.record_dropped();
        } else {
            self.item_count.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.record_queued();
    }

    /// Takes every waiting message, oldest first.
    pub fn take_all(&self) -> Vec<PendingMessage> {
        let drained: Vec<PendingMessage> = {
            let mut queue = self.queue.write();
            queue.drain(..).collect()
        };
        self.item_count
            .fetch_sub(drained.len() as u64, Ordering::Relaxed);
        self.stats.record_drained(drained.len() as u64);
        drained
    }

    /// Number of waiting messages, O(1).
    #[inline]
    pub fn len(&self) -> usize {
        self.item_count.load(Ordering::Relaxed) as usize
    }

    /// Whether the queue is empty, O(1).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of queue activity.
    pub fn stats(&self) -> PendingStats {
        PendingStats {
            queued: self.stats.queued.load(Ordering::Relaxed),
            drained: self.stats.drained.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            current: self.item_count.load(Ordering::Relaxed),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
