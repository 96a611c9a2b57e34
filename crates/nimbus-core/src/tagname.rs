// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Hierarchical tag-name resolution.
//!
//! Local tag names are `/`-separated paths. The cloud model needs at most
//! three levels: an optional child device, a measurement fragment, and a
//! series within that fragment. [`TagName::resolve`] maps any path onto that
//! model without ever failing:
//!
//! - one segment is a fragment with the default series
//! - two segments are fragment and series
//! - three or more segments anchor to the right: the last three become
//!   child device, fragment, and series, anything further left is dropped

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::PointName;

/// Separator between tag-name segments.
pub const TAG_SEPARATOR: char = '/';

/// Series name assumed when a tag path carries no explicit series.
pub const DEFAULT_SERIES: &str = "value";

/// The cloud-facing interpretation of a local tag name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagName {
    /// Child device segment, when the path addressed one.
    pub child_device: Option<String>,
    /// Measurement fragment.
    pub fragment: String,
    /// Series within the fragment.
    pub series: String,
}

impl TagName {
    /// Resolves a raw tag path into its child/fragment/series parts.
    ///
    /// Resolution is total: every input string, including the empty one,
    /// produces a usable name.
    pub fn resolve(raw: &str) -> Self {
        let segments: Vec<&str> = raw.split(TAG_SEPARATOR).collect();
        match segments.as_slice() {
            [fragment] => Self {
                child_device: None,
                fragment: (*fragment).to_string(),
                series: DEFAULT_SERIES.to_string(),
            },
            [fragment, series] => Self {
                child_device: None,
                fragment: (*fragment).to_string(),
                series: (*series).to_string(),
            },
            longer => {
                // Right-anchored: only the trailing three segments matter.
                let n = longer.len();
                Self {
                    child_device: Some(longer[n - 3].to_string()),
                    fragment: longer[n - 2].to_string(),
                    series: longer[n - 1].to_string(),
                }
            }
        }
    }

    /// Resolves a [`PointName`].
    pub fn resolve_point(name: &PointName) -> Self {
        Self::resolve(name.as_str())
    }

    /// Joins a folder and a tag into one path.
    ///
    /// Used by the `setf` device command, whose folder and tag arrive as
    /// separate words.
    pub fn join(folder: &str, tag: &str) -> String {
        format!("{}{}{}", folder, TAG_SEPARATOR, tag)
    }

    /// Returns `true` when the name addresses a child device.
    pub fn has_child(&self) -> bool {
        self.child_device.is_some()
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.child_device {
            Some(child) => write!(f, "{}/{}/{}", child, self.fragment, self.series),
            None => write!(f, "{}/{}", self.fragment, self.series),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
