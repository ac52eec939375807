//! Enumeration progress reporting.

use std::time::Duration;

/// Progress information published after every batch.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    /// Batches read so far.
    pub batches: u64,
    /// Raw records seen so far.
    pub records: u64,
    /// Regular files indexed so far.
    pub files_indexed: u64,
    /// Raw record bytes returned so far.
    pub bytes_read: u64,
    /// Time elapsed since enumeration started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate the enumeration rate in records per second.
    pub fn records_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.records as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}
