//! Entry handles and entry kinds.

/// Handle to one block of the buffer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Create a new BlockId from a block index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Position of the block in the chain.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A file name living inside a buffer chain block.
///
/// The name bytes are never copied out of the block the kernel wrote them
/// into; this handle is all the index keeps. It stays valid for as long as
/// the owning chain has not been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryRef {
    /// Block holding the raw record.
    pub block: BlockId,
    /// Byte offset of the name within the block.
    pub offset: u32,
    /// Name length in bytes, without the trailing NUL.
    pub len: u16,
}

impl EntryRef {
    /// Create a new entry handle.
    pub fn new(block: BlockId, offset: u32, len: u16) -> Self {
        Self { block, offset, len }
    }

    /// Byte range of the name within its block.
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.len as usize
    }
}

/// Filesystem object type of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file, the only kind that is acted on.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Block or character device.
    Device,
    /// Named pipe.
    Fifo,
    /// Unix domain socket.
    Socket,
    /// The filesystem did not say.
    Unknown,
}

impl EntryKind {
    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File)
    }

    /// Check if the type still has to be resolved with a stat call.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}
