//! Enumeration and run counters.

use std::time::Duration;

use crate::config::Mode;
use crate::entry::EntryKind;

/// Counters gathered while enumerating a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerationStats {
    /// Number of batch reads that returned data.
    pub batches: u64,
    /// Raw records seen, including `.` and `..`.
    pub records: u64,
    /// Regular files found.
    pub files: u64,
    /// Regular files whose name was already indexed.
    pub duplicates: u64,
    /// Non-regular entries skipped.
    pub skipped: u64,
    /// Entries whose type needed a stat call.
    pub resolved_unknown: u64,
    /// Raw record bytes returned by the kernel.
    pub bytes_read: u64,
}

impl EnumerationStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one non-empty batch.
    pub fn record_batch(&mut self, bytes: usize) {
        self.batches += 1;
        self.bytes_read += bytes as u64;
    }

    /// Record one entry by kind.
    pub fn record_entry(&mut self, kind: EntryKind) {
        self.records += 1;
        if kind.is_file() {
            self.files += 1;
        } else {
            self.skipped += 1;
        }
    }

    /// Record a `.` or `..` pseudo-entry.
    pub fn record_pseudo(&mut self) {
        self.records += 1;
    }

    /// Number of distinct regular files in the index.
    pub fn indexed(&self) -> u64 {
        self.files - self.duplicates
    }
}

/// Counters for the act phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// What was done to each entry.
    pub mode: Mode,
    /// Entries printed or removed.
    pub visited: u64,
    /// Wall-clock time of the walk.
    pub elapsed: Duration,
}

impl RunStats {
    /// Create stats for a run that has not started.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            visited: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Entries handled per second.
    pub fn entries_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.visited as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}
