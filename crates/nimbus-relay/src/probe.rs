// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Memory pressure probe.
//!
//! The relay checks available system memory at the top of every cycle and
//! skips the cycle while the reading sits below the configured floor. The
//! probe is a seam so tests can simulate pressure without touching the host;
//! production uses [`ProcMeminfo`].

use std::fs;
use std::path::PathBuf;

use tracing::debug;

// ===========================================================================
// Probe Trait
// ===========================================================================

/// Reads available system memory.
pub trait MemoryProbe: Send + Sync {
    /// Available bytes, or `None` when the host offers no reading.
    ///
    /// `None` is treated as "above the floor": a gateway without a readable
    /// meminfo keeps relaying rather than stalling forever.
    fn available_bytes(&self) -> Option<u64>;

    /// Invoked after a low-memory skip; implementations may nudge the
    /// allocator or drop caches. The default does nothing.
    fn hint_collect(&self) {}

    /// Probe name for logs.
    fn name(&self) -> &str;
}

// ===========================================================================
// /proc/meminfo Probe
// ===========================================================================

/// Probe backed by the kernel's `/proc/meminfo`.
#[derive(Debug, Clone)]
pub struct ProcMeminfo {
    path: PathBuf,
}

impl ProcMeminfo {
    /// Probe over the standard `/proc/meminfo` location.
    pub fn new() -> Self {
        Self {
            path: PathBuf::from("/proc/meminfo"),
        }
    }

    /// Probe over an alternate file, for tests.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcMeminfo {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcMeminfo {
    fn available_bytes(&self) -> Option<u64> {
        match fs::read_to_string(&self.path) {
            Ok(text) => parse_mem_available(&text),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Reading meminfo failed");
                None
            }
        }
    }

    fn name(&self) -> &str {
        "proc-meminfo"
    }
}

/// Extracts `MemAvailable` from meminfo text, converted from kB to bytes.
fn parse_mem_available(text: &str) -> Option<u64> {
    for line in text.lines() {
        let Some(rest) = line.strip_prefix("MemAvailable:") else {
            continue;
        };
        let kb: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
        return Some(kb * 1024);
    }
    None
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "MemTotal:        8046508 kB\n\
                          MemFree:          22168 kB\n\
                          MemAvailable:    4893120 kB\n\
                          Buffers:          103968 kB\n";

    #[test]
    fn test_parses_mem_available_in_bytes() {
        assert_eq!(parse_mem_available(SAMPLE), Some(4_893_120 * 1024));
    }

    #[test]
    fn test_missing_field_yields_none() {
        assert_eq!(parse_mem_available("MemTotal: 8046508 kB\n"), None);
        assert_eq!(parse_mem_available(""), None);
    }

    #[test]
    fn test_garbled_value_yields_none() {
        assert_eq!(parse_mem_available("MemAvailable: lots kB\n"), None);
    }

    #[test]
    fn test_unreadable_file_yields_none() {
        let probe = ProcMeminfo::with_path("/nonexistent/meminfo");
        assert_eq!(probe.available_bytes(), None);
        assert_eq!(probe.name(), "proc-meminfo");
    }
}
