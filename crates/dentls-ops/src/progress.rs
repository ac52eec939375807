//! Per-action progress callbacks.

use std::io::Write;
use std::time::Duration;

use dentls_core::RunConfig;

/// Receives the running visit count after every action.
pub trait ProgressSink {
    /// Called after each successful action with the count so far.
    fn on_action(&mut self, visited: u64);

    /// Called once when the walk is over.
    fn finish(&mut self, _visited: u64) {}
}

/// Discards every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_action(&mut self, _visited: u64) {}
}

/// Dots and running totals on the secondary stream.
///
/// Writes `.` every `minor` actions, and instead of the dot a newline plus
/// the running total every `minor * major` actions, after a short pause so
/// the line stays readable while deletes race ahead.
#[derive(Debug)]
pub struct ProgressMarkers<W: Write> {
    out: W,
    enabled: bool,
    minor: u64,
    major: u64,
    pause: Duration,
    line_open: bool,
}

impl<W: Write> ProgressMarkers<W> {
    /// Create markers with explicit intervals.
    pub fn new(out: W, minor: u64, major: u64, pause: Duration) -> Self {
        Self {
            out,
            enabled: true,
            minor: minor.max(1),
            major: minor.max(1).saturating_mul(major.max(1)),
            pause,
            line_open: false,
        }
    }

    /// Create markers from a run config; disabled unless progress was asked for.
    pub fn from_config(out: W, config: &RunConfig) -> Self {
        Self {
            enabled: config.show_progress,
            ..Self::new(
                out,
                config.progress_minor,
                config.progress_major,
                config.major_pause,
            )
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressSink for ProgressMarkers<W> {
    fn on_action(&mut self, visited: u64) {
        if !self.enabled || visited == 0 {
            return;
        }

        // Progress output is best effort; a closed stderr must not stop a run.
        if visited % self.major == 0 {
            if !self.pause.is_zero() {
                std::thread::sleep(self.pause);
            }
            let _ = write!(self.out, "\n{visited}");
            let _ = self.out.flush();
            self.line_open = true;
        } else if visited % self.minor == 0 {
            let _ = self.out.write_all(b".");
            let _ = self.out.flush();
            self.line_open = true;
        }
    }

    fn finish(&mut self, _visited: u64) {
        if self.line_open {
            let _ = self.out.write_all(b"\n");
            let _ = self.out.flush();
            self.line_open = false;
        }
    }
}
