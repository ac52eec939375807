//! Append-only chain of raw batch buffers.

use std::alloc::{self, Layout};
use std::ptr;

use dentls_core::{BlockId, DentError, EntryRef};
use humansize::{BINARY, format_size};
use tracing::debug;

/// Owns every buffer the kernel writes directory records into.
///
/// Blocks are only ever appended. Nothing is resized or freed until
/// [`BufferChain::release_all`] (or drop), so [`EntryRef`] handles into any
/// block stay valid for the whole run.
#[derive(Default)]
pub struct BufferChain {
    blocks: Vec<Box<[u8]>>,
    total_bytes: usize,
}

impl BufferChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a zeroed block of `size` bytes and return its handle.
    ///
    /// Allocation failure is reported instead of aborting the process, so
    /// the caller can tear down and exit with a diagnostic.
    pub fn allocate(&mut self, size: usize) -> Result<BlockId, DentError> {
        let id = u32::try_from(self.blocks.len()).map_err(|_| DentError::Allocation { size })?;

        self.blocks
            .try_reserve(1)
            .map_err(|_| DentError::Allocation { size })?;

        let block = zeroed_block(size).ok_or(DentError::Allocation { size })?;

        self.blocks.push(block);
        self.total_bytes += size;

        debug!(block = id, size = %format_size(size, BINARY), "allocated batch buffer");
        Ok(BlockId::new(id))
    }

    /// Read access to a block.
    ///
    /// # Panics
    ///
    /// Panics if the handle did not come from this chain or the chain was
    /// released.
    pub fn block(&self, id: BlockId) -> &[u8] {
        &self.blocks[id.index()]
    }

    /// Write access to a block, used to hand it to the kernel.
    pub fn block_mut(&mut self, id: BlockId) -> &mut [u8] {
        &mut self.blocks[id.index()]
    }

    /// The name bytes an entry handle points at.
    pub fn name(&self, entry: EntryRef) -> &[u8] {
        &self.block(entry.block)[entry.range()]
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if no blocks are allocated.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Sum of all live block sizes.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Free every block. Calling this again is a no-op.
    pub fn release_all(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        debug!(
            blocks = self.blocks.len(),
            size = %format_size(self.total_bytes, BINARY),
            "releasing buffer chain"
        );
        self.blocks = Vec::new();
        self.total_bytes = 0;
    }
}

impl std::fmt::Debug for BufferChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferChain")
            .field("blocks", &self.blocks.len())
            .field("total_bytes", &self.total_bytes)
            .finish()
    }
}

/// Allocate a zero-filled block, or `None` if the allocator refuses.
fn zeroed_block(size: usize) -> Option<Box<[u8]>> {
    if size == 0 {
        return Some(Box::default());
    }
    let layout = Layout::array::<u8>(size).ok()?;
    // SAFETY: the layout has a non-zero size.
    let ptr = unsafe { alloc::alloc_zeroed(layout) };
    if ptr.is_null() {
        return None;
    }
    // SAFETY: `ptr` comes from the global allocator with the layout of a
    // `[u8]` of `size` elements and every byte is initialized to zero.
    Some(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, size)) })
}
