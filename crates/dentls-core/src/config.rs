//! Run configuration types.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;

use crate::error::DentError;

/// Environment variable that enables delete mode when set to [`DELETE_SELECTOR`].
pub const DELETE_ENV: &str = "DENTLS_DELETE";

/// Environment variable that enables progress markers when non-empty.
pub const PROGRESS_ENV: &str = "DENTLS_PROGRESS";

/// The only value of [`DELETE_ENV`] that enables delete mode.
pub const DELETE_SELECTOR: &str = "delete";

/// Visits per minor progress marker.
pub const DEFAULT_PROGRESS_MINOR: u64 = 1000;

/// Minor intervals per major progress marker.
pub const DEFAULT_PROGRESS_MAJOR: u64 = 50;

/// What to do with each regular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Print each name on the primary stream.
    #[default]
    Report,
    /// Unlink each name from the directory.
    Delete,
}

impl Mode {
    /// Resolve the mode from the raw value of the delete selector.
    ///
    /// Unset or empty means [`Mode::Report`]. Anything other than the exact
    /// string `delete` is rejected so a typo never silently deletes or
    /// silently prints.
    pub fn from_selector(value: Option<&OsStr>) -> Result<Self, DentError> {
        match value {
            None => Ok(Self::Report),
            Some(v) if v.is_empty() => Ok(Self::Report),
            Some(v) if v == DELETE_SELECTOR => Ok(Self::Delete),
            Some(v) => Err(DentError::InvalidMode {
                value: v.to_string_lossy().into_owned(),
            }),
        }
    }

    /// Verb used in status lines.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Report => "print",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verb())
    }
}

/// Whether the raw value of the progress flag enables progress markers.
pub fn progress_enabled(value: Option<&OsStr>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Reject anything that is not an absolute path.
pub fn check_root(path: &Path) -> Result<(), DentError> {
    if path.as_os_str().as_encoded_bytes().first() == Some(&b'/') {
        Ok(())
    } else {
        Err(DentError::RelativePath {
            path: path.to_path_buf(),
        })
    }
}

/// Configuration for one enumerate-then-act run.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct RunConfig {
    /// Directory whose regular files are printed or deleted.
    pub root: PathBuf,

    /// Print or delete.
    #[builder(default)]
    pub mode: Mode,

    /// Emit progress markers on the secondary stream.
    #[builder(default = "false")]
    pub show_progress: bool,

    /// Visits between minor markers.
    #[builder(default = "DEFAULT_PROGRESS_MINOR")]
    pub progress_minor: u64,

    /// Minor intervals between major markers.
    #[builder(default = "DEFAULT_PROGRESS_MAJOR")]
    pub progress_major: u64,

    /// Pause taken before each major marker.
    #[builder(default = "Duration::from_secs(1)")]
    pub major_pause: Duration,

    /// Fixed batch buffer size instead of twice the directory's size.
    #[builder(default)]
    pub buffer_size: Option<usize>,

    /// Make the directory the process's current directory.
    #[builder(default = "true")]
    pub enter_directory: bool,

    /// Stat entries whose type the filesystem reports as unknown.
    #[builder(default = "true")]
    pub resolve_unknown_types: bool,
}

impl RunConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            Some(_) => {}
            None => return Err("Root path is required".to_string()),
        }
        if self.progress_minor == Some(0) || self.progress_major == Some(0) {
            return Err("Progress intervals must be greater than zero".to_string());
        }
        if self.buffer_size == Some(Some(0)) {
            return Err("Buffer size must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl RunConfig {
    /// Create a new run config builder.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Create a report-mode config for a directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: Mode::Report,
            show_progress: false,
            progress_minor: DEFAULT_PROGRESS_MINOR,
            progress_major: DEFAULT_PROGRESS_MAJOR,
            major_pause: Duration::from_secs(1),
            buffer_size: None,
            enter_directory: true,
            resolve_unknown_types: true,
        }
    }

    /// Build a config from the process environment.
    pub fn from_env(root: impl Into<PathBuf>) -> Result<Self, DentError> {
        let mode = Mode::from_selector(std::env::var_os(DELETE_ENV).as_deref())?;
        let show_progress = progress_enabled(std::env::var_os(PROGRESS_ENV).as_deref());

        Ok(Self {
            mode,
            show_progress,
            ..Self::new(root)
        })
    }

    /// Visits between major markers.
    pub fn major_interval(&self) -> u64 {
        self.progress_minor.saturating_mul(self.progress_major)
    }
}
