//! Raw directory enumeration engine for dentls.
//!
//! This crate reads one directory with `getdents64` and builds the ordered
//! index the action phase replays.
//!
//! # Overview
//!
//! - **Buffer chain**: every batch lands in a fresh, never-resized block,
//!   so names can be referenced in place for the whole run
//! - **Snapshot reader**: batches continue until the kernel reports the
//!   directory exhausted, however many that takes
//! - **Entry index**: a red-black tree over name handles, ascending
//!   byte-wise, walked in leaf/end order
//! - **Progress updates** via a broadcast channel, one per batch
//!
//! # Example
//!
//! ```rust,no_run
//! use dentls_scan::{RunConfig, SnapshotReader, Visit};
//!
//! let config = RunConfig::new("/var/spool/huge");
//! let snapshot = SnapshotReader::new().read(&config).unwrap();
//!
//! println!("Total files: {}", snapshot.len());
//! snapshot
//!     .walk(&mut |name: &[u8], _: Visit| {
//!         println!("{}", String::from_utf8_lossy(name));
//!         Ok::<(), std::io::Error>(())
//!     })
//!     .unwrap();
//! snapshot.release();
//! ```

mod arena;
mod dirent;
mod index;
mod progress;
mod reader;

pub use arena::BufferChain;
pub use dirent::{MIN_BATCH_BUFFER, RawDirent, Records, kind_from_tag, read_batch};
pub use index::{EntryIndex, Inserted, Visit, Visitor};
pub use progress::ScanProgress;
pub use reader::{MAX_BATCH_BUFFER, Snapshot, SnapshotReader, batch_buffer_size};

// Re-export core types for convenience
pub use dentls_core::{
    BlockId, DentError, EntryKind, EntryRef, EnumerationStats, Mode, RunConfig,
};
