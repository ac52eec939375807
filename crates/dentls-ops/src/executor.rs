//! Replays a snapshot through an action.

use std::io::Write;
use std::time::Instant;

use dentls_core::{DentError, Mode, RunConfig, RunStats};
use dentls_scan::{Snapshot, Visit};
use tracing::{info, warn};

use crate::action::{EntryAction, PrintAction, UnlinkAction};
use crate::progress::{ProgressMarkers, ProgressSink};

/// Drives one action over every indexed name.
///
/// The action runs once per name, in the walk's leaf/end order. The first
/// failing action ends the run; names already handled stay handled.
#[derive(Debug)]
pub struct ActionExecutor<A, P> {
    action: A,
    progress: P,
}

impl<A: EntryAction, P: ProgressSink> ActionExecutor<A, P> {
    /// Create an executor from an action and a progress sink.
    pub fn new(action: A, progress: P) -> Self {
        Self { action, progress }
    }

    /// Walk the snapshot, applying the action to every name.
    pub fn run(&mut self, snapshot: &Snapshot) -> Result<RunStats, DentError> {
        let start = Instant::now();
        let mut stats = RunStats::new(self.action.mode());

        let action = &mut self.action;
        let progress = &mut self.progress;
        let walked = snapshot.walk(&mut |name: &[u8], _: Visit| {
            action.apply(name)?;
            stats.visited += 1;
            progress.on_action(stats.visited);
            Ok::<(), DentError>(())
        });

        self.progress.finish(stats.visited);
        stats.elapsed = start.elapsed();

        if let Err(err) = walked {
            warn!(
                mode = %stats.mode,
                visited = stats.visited,
                total = snapshot.len(),
                "run stopped early: {err}"
            );
            return Err(err);
        }
        self.action.finish()?;

        info!(
            mode = %stats.mode,
            visited = stats.visited,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            rate = format!("{:.0}/s", stats.entries_per_second()),
            "run complete"
        );
        Ok(stats)
    }

    /// Recover the action and the progress sink.
    pub fn into_parts(self) -> (A, P) {
        (self.action, self.progress)
    }
}

/// Run the action `config.mode` selects over a snapshot.
///
/// Names go to `out` in report mode; progress markers, when enabled, go to
/// `err`. Delete mode unlinks relative to the snapshot's directory.
pub fn execute<W: Write, E: Write>(
    config: &RunConfig,
    snapshot: &Snapshot,
    out: W,
    err: E,
) -> Result<RunStats, DentError> {
    let markers = ProgressMarkers::from_config(err, config);
    match config.mode {
        Mode::Report => ActionExecutor::new(PrintAction::new(out), markers).run(snapshot),
        Mode::Delete => {
            ActionExecutor::new(UnlinkAction::new(snapshot.dir()), markers).run(snapshot)
        }
    }
}
