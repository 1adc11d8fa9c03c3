//! Block Allocator
//!
//! File-wide source of block addresses. Every stream writer of one file
//! shares a single allocator, so addresses are unique across streams.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{MuxError, Result};
use crate::format::MAX_BLOCKS;

/// Monotonic block address counter (atomic, lock-free)
#[derive(Debug, Default)]
pub struct BlockAllocator {
    next: AtomicU64,
}

impl BlockAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next block address
    ///
    /// Fails once all `2^32` addresses are taken.
    pub fn allocate(&self) -> Result<u32> {
        let addr = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                (next < MAX_BLOCKS).then_some(next + 1)
            })
            .map_err(|_| {
                MuxError::Corruption(format!("block address space of {} blocks exhausted", MAX_BLOCKS))
            })?;

        tracing::trace!(addr, "allocated block");
        Ok(addr as u32)
    }

    /// Number of addresses handed out so far
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}
