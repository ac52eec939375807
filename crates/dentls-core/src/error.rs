//! Error types for enumeration and removal runs.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can end a run.
///
/// Every variant is fatal. The only non-fatal condition in a run is a
/// skipped non-regular entry, which is counted rather than reported.
#[derive(Debug, Error)]
pub enum DentError {
    /// The directory argument does not start with `/`.
    #[error("For safety, the directory must be fully-qualified (start with /): {path}")]
    RelativePath { path: PathBuf },

    /// The delete selector was set to something other than `delete`.
    #[error(
        "If you'd like to delete files, please set DENTLS_DELETE to 'delete', *EXACTLY* (got {value:?}). \
         If you did not intend to run deletes, please unset the variable entirely."
    )]
    InvalidMode { value: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The directory could not be accessed for reading.
    #[error("Could not access directory {path}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but is not a directory.
    #[error("The path {path} is not a directory")]
    NotADirectory { path: PathBuf },

    /// Generic I/O error while preparing the directory.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory could not be made the current directory.
    #[error("Cannot enter directory {path}: {source}")]
    EnterDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A buffer or index node could not be allocated.
    #[error("Cannot acquire {size} bytes for directory entries")]
    Allocation { size: usize },

    /// A batch read failed part way through the directory.
    #[error("getdents failed on {path}: {source}")]
    Enumeration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An entry could not be removed.
    #[error("Failed to delete {}: {source}", String::from_utf8_lossy(.name))]
    Remove {
        name: Vec<u8>,
        #[source]
        source: std::io::Error,
    },

    /// Writing to the primary output stream failed.
    #[error("Failed to write output: {source}")]
    Output {
        #[source]
        source: std::io::Error,
    },
}

impl DentError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a removal error for a raw entry name.
    pub fn remove(name: &[u8], source: std::io::Error) -> Self {
        Self::Remove {
            name: name.to_vec(),
            source,
        }
    }

    /// Whether this error is a malformed invocation rather than a failed run.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::RelativePath { .. })
    }
}
