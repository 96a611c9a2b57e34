// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Window grouping.
//!
//! Samples are bucketed by `(window start, child device)` before any
//! policy runs. Window starts align to multiples of the window length
//! since the Unix epoch, so a 60 second window that receives samples
//! at 08:00:12 and 08:00:47 files both under 08:00:00. Within one
//! window samples are grouped by fragment and series, preserving
//! their arrival order.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use nimbus_core::tagname::TagName;
use nimbus_core::types::{DataPoint, TagValue};

// ===========================================================================
// Samples
// ===========================================================================

/// One sample filed under a fragment and series of a window.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSample {
    /// Sampled value.
    pub value: TagValue,
    /// Unit of measure, when the source reported one.
    pub unit: Option<String>,
    /// Moment the sample was taken.
    pub timestamp: DateTime<Utc>,
}

impl SeriesSample {
    fn from_point(point: &DataPoint) -> Self {
        SeriesSample {
            value: point.value.clone(),
            unit: point.unit.clone(),
            timestamp: point.timestamp,
        }
    }
}

// ===========================================================================
// Windows
// ===========================================================================

/// Identity of one aggregation window.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WindowKey {
    /// Aligned start of the window.
    pub start: DateTime<Utc>,
    /// Child device the window belongs to, `None` for the gateway.
    pub child_device: Option<String>,
}

/// Samples of one window, grouped by fragment and series.
///
/// Both maps are ordered so a window always serializes its fragments
/// and series deterministically.
#[derive(Debug, Clone, Default)]
pub struct AggregationWindow {
    fragments: BTreeMap<String, BTreeMap<String, Vec<SeriesSample>>>,
}

impl AggregationWindow {
    /// Files one sample under its fragment and series.
    pub fn push(&mut self, fragment: &str, series: &str, sample: SeriesSample) {
        self.fragments
            .entry(fragment.to_string())
            .or_default()
            .entry(series.to_string())
            .or_default()
            .push(sample);
    }

    /// Iterates fragments in name order.
    pub fn fragments(
        &self,
    ) -> impl Iterator<Item = (&String, &BTreeMap<String, Vec<SeriesSample>>)> {
        self.fragments.iter()
    }

    /// True when the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Total number of samples filed in the window.
    pub fn sample_count(&self) -> usize {
        self.fragments
            .values()
            .flat_map(|series| series.values())
            .map(Vec::len)
            .sum()
    }
}

/// Aligns a timestamp down to the enclosing window start.
pub fn window_start(timestamp: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    let window_ms = window.num_milliseconds().max(1);
    let ms = timestamp.timestamp_millis();
    let aligned = ms - ms.rem_euclid(window_ms);
    match Utc.timestamp_millis_opt(aligned) {
        chrono::LocalResult::Single(start) => start,
        _ => timestamp,
    }
}

/// Buckets points into windows keyed by aligned start and child device.
///
/// Windows come back ordered by start time, gateway windows before
/// child windows of the same start.
pub fn group_into_windows(
    points: &[DataPoint],
    window: Duration,
) -> BTreeMap<WindowKey, AggregationWindow> {
    let mut windows: BTreeMap<WindowKey, AggregationWindow> = BTreeMap::new();
    for point in points {
        let tag = TagName::resolve_point(&point.name);
        let key = WindowKey {
            start: window_start(point.timestamp, window),
            child_device: tag.child_device.clone(),
        };
        windows
            .entry(key)
            .or_default()
            .push(&tag.fragment, &tag.series, SeriesSample::from_point(point));
    }
    windows
}

// ===========================================================================
// Tests
// ===========================================================================
