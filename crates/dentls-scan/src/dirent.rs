//! Raw `getdents64` batches and the records inside them.

use std::io;
use std::os::fd::BorrowedFd;

use dentls_core::EntryKind;

/// Offset of `d_reclen` in a `linux_dirent64` record.
const RECLEN_OFFSET: usize = 16;
/// Offset of `d_type` in a `linux_dirent64` record.
const TYPE_OFFSET: usize = 18;
/// Offset of `d_name` in a `linux_dirent64` record.
pub const NAME_OFFSET: usize = 19;

/// Smallest batch buffer handed to the kernel.
///
/// A buffer that cannot hold the next record makes `getdents64` fail with
/// `EINVAL`, so this stays above the largest possible record (a 255-byte
/// name plus header and padding).
pub const MIN_BATCH_BUFFER: usize = 1024;

/// Fill `buf` with the next batch of raw records from an open directory.
///
/// Returns the number of bytes written; zero means the directory is
/// exhausted.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn read_batch(dir: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::fd::AsRawFd;

    // SAFETY: `dir` is an open descriptor for the lifetime of the call and
    // the kernel writes at most `buf.len()` bytes into `buf`.
    let ret = unsafe {
        libc::syscall(
            libc::SYS_getdents64,
            dir.as_raw_fd(),
            buf.as_mut_ptr(),
            buf.len(),
        )
    };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn read_batch(_dir: BorrowedFd<'_>, _buf: &mut [u8]) -> io::Result<usize> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "raw directory enumeration requires getdents64",
    ))
}

/// One raw directory record inside a batch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDirent<'a> {
    /// Inode number.
    pub ino: u64,
    /// Type tag reported by the filesystem.
    pub kind: EntryKind,
    /// Offset of the name within the batch buffer.
    pub name_offset: usize,
    /// Name bytes without the trailing NUL.
    pub name: &'a [u8],
}

impl RawDirent<'_> {
    /// Check for the `.` and `..` pseudo-entries.
    pub fn is_pseudo(&self) -> bool {
        self.name == b"." || self.name == b".."
    }
}

/// Map a `d_type` tag to an entry kind.
pub fn kind_from_tag(tag: u8) -> EntryKind {
    match tag {
        libc::DT_REG => EntryKind::File,
        libc::DT_DIR => EntryKind::Directory,
        libc::DT_LNK => EntryKind::Symlink,
        libc::DT_BLK | libc::DT_CHR => EntryKind::Device,
        libc::DT_FIFO => EntryKind::Fifo,
        libc::DT_SOCK => EntryKind::Socket,
        _ => EntryKind::Unknown,
    }
}

/// Iterator over the records of one filled batch.
#[derive(Debug)]
pub struct Records<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Records<'a> {
    /// Iterate the first `filled` bytes of a batch buffer.
    pub fn new(buf: &'a [u8], filled: usize) -> Self {
        Self {
            buf: &buf[..filled.min(buf.len())],
            pos: 0,
        }
    }

    fn malformed(&mut self, what: &str) -> Option<io::Result<RawDirent<'a>>> {
        let at = self.pos;
        self.pos = self.buf.len();
        Some(Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed directory record at offset {at}: {what}"),
        )))
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = io::Result<RawDirent<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let buf: &'a [u8] = self.buf;
        let rest = buf.get(self.pos..)?;
        if rest.is_empty() {
            return None;
        }
        if rest.len() < NAME_OFFSET {
            return self.malformed("truncated header");
        }

        let reclen = u16::from_ne_bytes([rest[RECLEN_OFFSET], rest[RECLEN_OFFSET + 1]]) as usize;
        if reclen <= NAME_OFFSET || reclen > rest.len() {
            return self.malformed("bad record length");
        }

        let mut ino = [0u8; 8];
        ino.copy_from_slice(&rest[..8]);

        let name_field = &rest[NAME_OFFSET..reclen];
        let Some(name_len) = name_field.iter().position(|&b| b == 0) else {
            return self.malformed("unterminated name");
        };

        let record = RawDirent {
            ino: u64::from_ne_bytes(ino),
            kind: kind_from_tag(rest[TYPE_OFFSET]),
            name_offset: self.pos + NAME_OFFSET,
            name: &name_field[..name_len],
        };
        self.pos += reclen;
        Some(Ok(record))
    }
}

/// Append a record laid out the way the kernel writes it.
#[cfg(test)]
pub(crate) fn push_record(buf: &mut Vec<u8>, ino: u64, tag: u8, name: &[u8]) {
    let reclen = (NAME_OFFSET + name.len() + 1).next_multiple_of(8);
    let start = buf.len();
    buf.resize(start + reclen, 0);
    let rec = &mut buf[start..];
    rec[..8].copy_from_slice(&ino.to_ne_bytes());
    rec[8..16].copy_from_slice(&(start as i64 + reclen as i64).to_ne_bytes());
    rec[RECLEN_OFFSET..RECLEN_OFFSET + 2].copy_from_slice(&(reclen as u16).to_ne_bytes());
    rec[TYPE_OFFSET] = tag;
    rec[NAME_OFFSET..NAME_OFFSET + name.len()].copy_from_slice(name);
}
