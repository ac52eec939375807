//! What happens to each visited entry.

use std::ffi::CStr;
use std::io::Write;
use std::os::fd::{AsRawFd, BorrowedFd};

use dentls_core::{DentError, Mode};

/// Action applied to every name the walk visits.
pub trait EntryAction {
    /// Mode this action implements, used for status lines and counters.
    fn mode(&self) -> Mode;

    /// Act on one name. An error ends the run.
    fn apply(&mut self, name: &[u8]) -> Result<(), DentError>;

    /// Called once after the last name.
    fn finish(&mut self) -> Result<(), DentError> {
        Ok(())
    }
}

/// Writes each name, newline-terminated, to the primary stream.
#[derive(Debug)]
pub struct PrintAction<W: Write> {
    out: W,
}

impl<W: Write> PrintAction<W> {
    /// Create a print action over a writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EntryAction for PrintAction<W> {
    fn mode(&self) -> Mode {
        Mode::Report
    }

    fn apply(&mut self, name: &[u8]) -> Result<(), DentError> {
        self.out
            .write_all(name)
            .and_then(|()| self.out.write_all(b"\n"))
            .map_err(|source| DentError::Output { source })
    }

    fn finish(&mut self) -> Result<(), DentError> {
        self.out.flush().map_err(|source| DentError::Output { source })
    }
}

/// Unlinks each name relative to the enumerated directory.
///
/// Uses `unlinkat` on the directory descriptor, which removes the same
/// entry as unlinking the bare name after `fchdir` into it.
#[derive(Debug)]
pub struct UnlinkAction<'fd> {
    dir: BorrowedFd<'fd>,
    name_buf: Vec<u8>,
}

impl<'fd> UnlinkAction<'fd> {
    /// Create an unlink action for an open directory.
    pub fn new(dir: BorrowedFd<'fd>) -> Self {
        Self {
            dir,
            name_buf: Vec::with_capacity(256),
        }
    }
}

impl EntryAction for UnlinkAction<'_> {
    fn mode(&self) -> Mode {
        Mode::Delete
    }

    fn apply(&mut self, name: &[u8]) -> Result<(), DentError> {
        self.name_buf.clear();
        self.name_buf.extend_from_slice(name);
        self.name_buf.push(0);

        let cname = CStr::from_bytes_with_nul(&self.name_buf).map_err(|_| {
            DentError::remove(
                name,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "name contains a NUL byte"),
            )
        })?;

        // SAFETY: `dir` is an open directory descriptor and `cname` is a
        // valid NUL-terminated name for the duration of the call.
        let ret = unsafe { libc::unlinkat(self.dir.as_raw_fd(), cname.as_ptr(), 0) };
        if ret < 0 {
            return Err(DentError::remove(name, std::io::Error::last_os_error()));
        }
        Ok(())
    }
}
