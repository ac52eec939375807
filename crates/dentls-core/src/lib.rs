//! Core types for dentls.
//!
//! This crate provides the data shared by the enumeration and action
//! crates: entry handles into the buffer chain, run configuration, counters
//! and the error type every fatal condition is reported through.

mod config;
mod entry;
mod error;
mod stats;

pub use config::{
    DEFAULT_PROGRESS_MAJOR, DEFAULT_PROGRESS_MINOR, DELETE_ENV, DELETE_SELECTOR, Mode,
    PROGRESS_ENV, RunConfig, RunConfigBuilder, check_root, progress_enabled,
};
pub use entry::{BlockId, EntryKind, EntryRef};
pub use error::DentError;
pub use stats::{EnumerationStats, RunStats};
