// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Aggregation policies.
//!
//! A policy reduces every sample collected for one series within one
//! window to a single representative sample. Five policies are
//! supported: `first`, `last`, `min`, `max` and `average`.
//!
//! Comparison rules:
//! - `first`/`last` order samples by timestamp. Equal timestamps are
//!   resolved by input order (`first` keeps the earlier arrival,
//!   `last` keeps the later one).
//! - `min`/`max` compare booleans with `false < true` and everything
//!   else numerically.
//! - `average` takes a majority vote over booleans (ties resolve to
//!   `true`) and the arithmetic mean over numeric values.

use nimbus_core::error::{AggregateError, AggregateResult};
use nimbus_core::types::TagValue;

use crate::window::SeriesSample;

// ===========================================================================
// Policy
// ===========================================================================

/// Reduction applied to the samples of one series within one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPolicy {
    /// Keep the earliest sample of the window.
    First,
    /// Keep the latest sample of the window.
    Last,
    /// Keep the smallest sample of the window.
    Min,
    /// Keep the largest sample of the window.
    Max,
    /// Average the samples of the window.
    Average,
}

impl AggregationPolicy {
    /// All supported policies, in configuration order.
    pub const ALL: [AggregationPolicy; 5] = [
        AggregationPolicy::First,
        AggregationPolicy::Last,
        AggregationPolicy::Min,
        AggregationPolicy::Max,
        AggregationPolicy::Average,
    ];

    /// Parses a policy from its configuration value.
    pub fn from_value(value: &str) -> AggregateResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(AggregationPolicy::First),
            "last" => Ok(AggregationPolicy::Last),
            "min" => Ok(AggregationPolicy::Min),
            "max" => Ok(AggregationPolicy::Max),
            "average" => Ok(AggregationPolicy::Average),
            other => Err(AggregateError::invalid_policy(other)),
        }
    }

    /// Configuration value for this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationPolicy::First => "first",
            AggregationPolicy::Last => "last",
            AggregationPolicy::Min => "min",
            AggregationPolicy::Max => "max",
            AggregationPolicy::Average => "average",
        }
    }

    /// Reduces the samples of one series to a single sample.
    ///
    /// Returns `None` for an empty slice. A single-sample slice is
    /// returned unchanged under every policy.
    pub fn apply(&self, samples: &[SeriesSample]) -> Option<SeriesSample> {
        if samples.is_empty() {
            return None;
        }
        if samples.len() == 1 {
            return Some(samples[0].clone());
        }
        match self {
            AggregationPolicy::First => select_first(samples).cloned(),
            AggregationPolicy::Last => select_last(samples).cloned(),
            AggregationPolicy::Min => select_min(samples).cloned(),
            AggregationPolicy::Max => select_max(samples).cloned(),
            AggregationPolicy::Average => Some(average(samples)),
        }
    }
}

impl std::fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ===========================================================================
// Selection
// ===========================================================================

fn select_first(samples: &[SeriesSample]) -> Option<&SeriesSample> {
    let mut best: Option<&SeriesSample> = None;
    for sample in samples {
        match best {
            // Strict comparison keeps the earlier arrival on ties.
            Some(current) if sample.timestamp < current.timestamp => best = Some(sample),
            Some(_) => {}
            None => best = Some(sample),
        }
    }
    best
}

fn select_last(samples: &[SeriesSample]) -> Option<&SeriesSample> {
    let mut best: Option<&SeriesSample> = None;
    for sample in samples {
        match best {
            // Inclusive comparison keeps the later arrival on ties.
            Some(current) if sample.timestamp >= current.timestamp => best = Some(sample),
            Some(_) => {}
            None => best = Some(sample),
        }
    }
    best
}

fn select_min(samples: &[SeriesSample]) -> Option<&SeriesSample> {
    let mut best: Option<&SeriesSample> = None;
    for sample in samples {
        // A false boolean is the smallest value a series can hold.
        if matches!(sample.value, TagValue::Bool(false)) {
            return Some(sample);
        }
        best = match (best, sample.value.as_f64()) {
            (None, _) => Some(sample),
            (Some(current), Some(candidate)) => match current.value.as_f64() {
                Some(held) if candidate < held => Some(sample),
                _ => Some(current),
            },
            (Some(current), None) => Some(current),
        };
    }
    best
}

fn select_max(samples: &[SeriesSample]) -> Option<&SeriesSample> {
    let mut best: Option<&SeriesSample> = None;
    for sample in samples {
        // A true boolean is the largest value a series can hold.
        if matches!(sample.value, TagValue::Bool(true)) {
            return Some(sample);
        }
        best = match (best, sample.value.as_f64()) {
            (None, _) => Some(sample),
            (Some(current), Some(candidate)) => match current.value.as_f64() {
                Some(held) if candidate > held => Some(sample),
                _ => Some(current),
            },
            (Some(current), None) => Some(current),
        };
    }
    best
}

/// Averages a multi-sample series.
///
/// All-boolean series resolve by majority vote with ties going to
/// `true`. Any other series averages the numeric projections of its
/// samples. The unit and timestamp of the latest sample carry over to
/// the result.
fn average(samples: &[SeriesSample]) -> SeriesSample {
    let carrier = select_last(samples).unwrap_or(&samples[0]);
    let all_bool = samples
        .iter()
        .all(|s| matches!(s.value, TagValue::Bool(_)));

    let value = if all_bool {
        let set = samples
            .iter()
            .filter(|s| matches!(s.value, TagValue::Bool(true)))
            .count();
        TagValue::Bool(set * 2 >= samples.len())
    } else {
        let mut sum = 0.0;
        let mut count = 0u32;
        for sample in samples {
            if let Some(v) = sample.value.as_f64() {
                sum += v;
                count += 1;
            }
        }
        if count == 0 {
            return carrier.clone();
        }
        TagValue::Float(sum / f64::from(count))
    };

    SeriesSample {
        value,
        unit: carrier.unit.clone(),
        timestamp: carrier.timestamp,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
