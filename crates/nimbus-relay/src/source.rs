// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Sample source abstraction.
//!
//! The relay pulls batches of samples from the local historical store
//! through the [`SampleSource`] trait. Progress is tracked with an opaque
//! [`SourceCursor`]: the store hands back a new cursor with every span, and
//! the relay presents it on the next pull. A cursor the store no longer
//! recognizes fails the pull with [`SourceError::CursorInvalid`]; the relay
//! then opens a fresh cursor and resumes from the store's current position.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use nimbus_core::error::SourceResult;
use nimbus_core::types::DataPoint;

#[cfg(doc)]
use nimbus_core::error::SourceError;

// ===========================================================================
// Cursor
// ===========================================================================

/// Opaque resume position inside the historical store.
///
/// The relay never interprets the token; it only carries it between pulls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceCursor(String);

impl SourceCursor {
    /// Wraps a store-issued position token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ===========================================================================
// Spans
// ===========================================================================

/// One pulled batch together with the position to resume from.
#[derive(Debug, Clone)]
pub struct SourceSpan {
    /// Samples in store order, oldest first.
    pub points: Vec<DataPoint>,
    /// Cursor for the next pull.
    pub cursor: SourceCursor,
    /// How far the returned span trails the head of the store.
    pub lag: Duration,
}

impl SourceSpan {
    /// Creates a span.
    pub fn new(points: Vec<DataPoint>, cursor: SourceCursor, lag: Duration) -> Self {
        Self { points, cursor, lag }
    }

    /// A span with no samples, positioned at `cursor`.
    pub fn empty(cursor: SourceCursor) -> Self {
        Self {
            points: Vec::new(),
            cursor,
            lag: Duration::ZERO,
        }
    }
}

// ===========================================================================
// Source Trait
// ===========================================================================

/// Read access to the local historical store.
///
/// Implementations must be safe to share across tasks; the relay holds the
/// source behind an `Arc` and polls it from its periodic loop.
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Opens a cursor at the store's current position.
    ///
    /// Used at startup and whenever the previous cursor was invalidated or
    /// abandoned after repeated pull failures.
    async fn fresh_cursor(&self) -> SourceResult<SourceCursor>;

    /// Pulls the next span after `cursor`.
    ///
    /// An empty `points` list is a normal result meaning no new samples have
    /// arrived; the returned cursor must still be presented on the next pull.
    async fn next_span(&self, cursor: &SourceCursor) -> SourceResult<SourceSpan>;

    /// Source name for logs.
    fn name(&self) -> &str;
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_is_opaque_text() {
        let cursor = SourceCursor::new("span:1742");
        assert_eq!(cursor.as_str(), "span:1742");
        assert_eq!(cursor.to_string(), "span:1742");
        assert_eq!(cursor, SourceCursor::new("span:1742"));
    }

    #[test]
    fn test_empty_span_has_no_lag() {
        let span = SourceSpan::empty(SourceCursor::new("head"));
        assert!(span.points.is_empty());
        assert_eq!(span.lag, Duration::ZERO);
        assert_eq!(span.cursor.as_str(), "head");
    }
}
