//! Directory snapshot reader.

use std::ffi::{CString, OsStr};
use std::fs::{self, File};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use dentls_core::{
    BlockId, DentError, EntryKind, EntryRef, EnumerationStats, RunConfig, check_root,
};
use humansize::{BINARY, format_size};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::arena::BufferChain;
use crate::dirent::{MIN_BATCH_BUFFER, Records, read_batch};
use crate::index::{EntryIndex, Inserted, Visitor};
use crate::progress::ScanProgress;

/// Largest batch buffer handed to the kernel in one call.
pub const MAX_BATCH_BUFFER: usize = i32::MAX as usize;

/// Batch buffer size for a directory whose inode reports `st_size` bytes.
///
/// The reported size is only an estimate of how much record data a read
/// returns; it can be exceeded, which is why reading continues until the
/// kernel reports exhaustion rather than stopping after one full buffer.
pub fn batch_buffer_size(st_size: u64, overridden: Option<usize>) -> usize {
    let size = overridden
        .unwrap_or_else(|| usize::try_from(st_size.saturating_mul(2)).unwrap_or(usize::MAX));
    size.clamp(MIN_BATCH_BUFFER, MAX_BATCH_BUFFER)
}

/// Everything enumerated from one directory.
///
/// Owns the open directory, the buffer chain holding every name and the
/// index referring into it. Dropping (or [`Snapshot::release`]) clears the
/// index first and then frees the chain.
#[derive(Debug)]
pub struct Snapshot {
    root: PathBuf,
    dir: OwnedFd,
    chain: BufferChain,
    index: EntryIndex,
    stats: EnumerationStats,
}

impl Snapshot {
    /// The enumerated directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The open directory, for `*at` calls relative to it.
    pub fn dir(&self) -> BorrowedFd<'_> {
        self.dir.as_fd()
    }

    /// The index over regular-file names.
    pub fn index(&self) -> &EntryIndex {
        &self.index
    }

    /// The buffers holding the names.
    pub fn chain(&self) -> &BufferChain {
        &self.chain
    }

    /// Enumeration counters.
    pub fn stats(&self) -> &EnumerationStats {
        &self.stats
    }

    /// Number of distinct regular files.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the directory held no regular files.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Walk the index in leaf/end order.
    pub fn walk<V: Visitor>(&self, visitor: &mut V) -> Result<(), V::Error> {
        self.index.walk(&self.chain, visitor)
    }

    /// Tear down the index and the buffer chain.
    pub fn release(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.index.is_empty() {
            debug!(nodes = self.index.len(), "releasing entry index");
        }
        self.index.clear();
        self.chain.release_all();
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Reads the regular-file names of one directory with raw `getdents64`.
pub struct SnapshotReader {
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl SnapshotReader {
    /// Create a new reader.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to per-batch progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Enumerate `config.root` completely.
    pub fn read(&self, config: &RunConfig) -> Result<Snapshot, DentError> {
        let start = Instant::now();
        let root = config.root.clone();
        check_root(&root)?;
        check_readable(&root)?;

        let metadata = fs::symlink_metadata(&root).map_err(|e| DentError::io(&root, e))?;
        if !metadata.is_dir() {
            return Err(DentError::NotADirectory { path: root });
        }

        let dir: OwnedFd = File::open(&root)
            .map_err(|e| DentError::io(&root, e))?
            .into();

        if config.enter_directory {
            enter(dir.as_fd(), &root)?;
        }

        let buffer_size = batch_buffer_size(metadata.len(), config.buffer_size);
        debug!(
            path = %root.display(),
            reported = metadata.len(),
            buffer = %format_size(buffer_size, BINARY),
            "enumerating directory"
        );

        let mut chain = BufferChain::new();
        let mut index = EntryIndex::new();
        let mut stats = EnumerationStats::new();

        loop {
            let block = chain.allocate(buffer_size)?;
            let filled = read_batch(dir.as_fd(), chain.block_mut(block)).map_err(|source| {
                DentError::Enumeration {
                    path: root.clone(),
                    source,
                }
            })?;
            if filled == 0 {
                break;
            }
            stats.record_batch(filled);

            index_batch(
                &root,
                block,
                filled,
                config.resolve_unknown_types,
                &chain,
                &mut index,
                &mut stats,
            )?;

            debug!(
                batch = stats.batches,
                bytes = filled,
                indexed = index.len(),
                "read batch"
            );
            let _ = self.progress_tx.send(ScanProgress {
                batches: stats.batches,
                records: stats.records,
                files_indexed: index.len() as u64,
                bytes_read: stats.bytes_read,
                elapsed: start.elapsed(),
            });
        }

        info!(
            files = stats.indexed(),
            skipped = stats.skipped,
            batches = stats.batches,
            buffers = %format_size(chain.total_bytes(), BINARY),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "enumeration complete"
        );

        Ok(Snapshot {
            root,
            dir,
            chain,
            index,
            stats,
        })
    }
}

impl Default for SnapshotReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Index the regular files of one filled block.
fn index_batch(
    root: &Path,
    block: BlockId,
    filled: usize,
    resolve_unknown: bool,
    chain: &BufferChain,
    index: &mut EntryIndex,
    stats: &mut EnumerationStats,
) -> Result<(), DentError> {
    for record in Records::new(chain.block(block), filled) {
        let record = record.map_err(|source| DentError::Enumeration {
            path: root.to_path_buf(),
            source,
        })?;

        if record.is_pseudo() {
            stats.record_pseudo();
            continue;
        }

        let mut kind = record.kind;
        if kind.is_unknown() && resolve_unknown {
            kind = stat_kind(root, record.name).map_err(|source| {
                warn!(
                    name = %String::from_utf8_lossy(record.name),
                    error = %source,
                    "cannot resolve entry type"
                );
                DentError::Enumeration {
                    path: root.to_path_buf(),
                    source,
                }
            })?;
            stats.resolved_unknown += 1;
        }

        stats.record_entry(kind);
        if !kind.is_file() {
            continue;
        }

        // Names are at most 255 bytes and blocks are capped below 4 GiB.
        let entry = EntryRef::new(
            block,
            record.name_offset as u32,
            record.name.len() as u16,
        );
        if index.insert(entry, chain)? == Inserted::Existing {
            stats.duplicates += 1;
        }
    }

    Ok(())
}

/// Fail early, with the access(2) diagnostic, if the directory is unreadable.
fn check_readable(path: &Path) -> Result<(), DentError> {
    let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|_| DentError::InvalidConfig {
        message: format!("path contains a NUL byte: {}", path.display()),
    })?;

    // SAFETY: `cpath` is a valid NUL-terminated string for the call.
    if unsafe { libc::access(cpath.as_ptr(), libc::R_OK) } < 0 {
        return Err(DentError::Access {
            path: path.to_path_buf(),
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// Make the open directory the process's current directory.
fn enter(dir: BorrowedFd<'_>, path: &Path) -> Result<(), DentError> {
    use std::os::fd::AsRawFd;

    // SAFETY: `dir` is an open directory descriptor.
    if unsafe { libc::fchdir(dir.as_raw_fd()) } < 0 {
        return Err(DentError::EnterDirectory {
            path: path.to_path_buf(),
            source: std::io::Error::last_os_error(),
        });
    }
    debug!(path = %path.display(), "entered directory");
    Ok(())
}

/// Resolve the type of an entry the filesystem reported as unknown.
fn stat_kind(root: &Path, name: &[u8]) -> std::io::Result<EntryKind> {
    let file_type = fs::symlink_metadata(root.join(OsStr::from_bytes(name)))?.file_type();

    Ok(if file_type.is_file() {
        EntryKind::File
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_block_device() || file_type.is_char_device() {
        EntryKind::Device
    } else if file_type.is_fifo() {
        EntryKind::Fifo
    } else if file_type.is_socket() {
        EntryKind::Socket
    } else {
        EntryKind::Unknown
    })
}
