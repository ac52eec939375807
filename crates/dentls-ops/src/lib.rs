//! Action phase for dentls.
//!
//! Walks a [`Snapshot`](dentls_scan::Snapshot) and either prints or unlinks
//! every regular-file name, with optional progress markers.

mod action;
mod executor;
mod progress;

pub use action::{EntryAction, PrintAction, UnlinkAction};
pub use executor::{ActionExecutor, execute};
pub use progress::{NoProgress, ProgressMarkers, ProgressSink};
