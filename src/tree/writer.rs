//! Tree Writer
//!
//! Append-only construction of a stream's indirection tree.

use std::collections::HashMap;
use std::sync::Arc;

use crate::block::{encode_pointers, BlockAllocator, BlockSink};
use crate::error::{MuxError, Result};
use crate::format::{ByteOrder, DirectoryEntry, MAX_BLOCKS};

use super::tree_depth;

/// Readable view of a stream that is still being written
///
/// `blocks` holds the not yet written tail of the tree under addresses
/// counted down from the top of the address space; every other address in
/// the tree refers to a block already handed to the sink.
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    pub root: u32,
    pub length: u64,
    pub blocks: HashMap<u32, Vec<u8>>,
}

/// Incremental builder of one stream's tree
///
/// Only the rightmost, still-filling block of each level is kept in memory.
/// `levels[0]` collects data block addresses, `levels[k]` collects the
/// addresses of full `levels[k - 1]` blocks. A level that fills up is
/// written out and its address pushed one level higher, creating that level
/// if needed, so the tree grows at the top without knowing the final length.
pub struct TreeWriter {
    id: i32,
    sink: Arc<dyn BlockSink>,
    allocator: Arc<BlockAllocator>,
    block_size: usize,
    byte_order: ByteOrder,
    data_block: Vec<u8>,
    filled: usize,
    levels: Vec<Vec<u32>>,
    length: u64,
    sealed: Option<DirectoryEntry>,
}

impl TreeWriter {
    pub fn new(
        id: i32,
        sink: Arc<dyn BlockSink>,
        allocator: Arc<BlockAllocator>,
        block_size: usize,
        byte_order: ByteOrder,
    ) -> Self {
        Self {
            id,
            sink,
            allocator,
            block_size,
            byte_order,
            data_block: vec![0u8; block_size],
            filled: 0,
            levels: Vec::new(),
            length: 0,
            sealed: None,
        }
    }

    /// Stream id
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Bytes appended so far
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Current number of pointer levels
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Directory entry once sealed
    pub fn entry(&self) -> Option<DirectoryEntry> {
        self.sealed
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.is_some()
    }

    /// Append bytes; every block that fills up is written immediately
    pub fn append(&mut self, mut buf: &[u8]) -> Result<()> {
        if self.sealed.is_some() {
            return Err(MuxError::StreamClosed(self.id));
        }

        while !buf.is_empty() {
            let n = buf.len().min(self.block_size - self.filled);
            self.data_block[self.filled..self.filled + n].copy_from_slice(&buf[..n]);
            self.filled += n;
            self.length += n as u64;
            buf = &buf[n..];

            if self.filled == self.block_size {
                let addr = self.write_data_block()?;
                self.push_pointer(addr)?;
            }
        }
        Ok(())
    }

    /// Flush partial blocks and fix the stream's root and length
    ///
    /// Idempotent: sealing twice returns the same entry.
    pub fn seal(&mut self) -> Result<DirectoryEntry> {
        if let Some(entry) = self.sealed {
            return Ok(entry);
        }

        let depth = self.check_depth()?;
        let root = self.layout_tail(|block| {
            let addr = self.allocator.allocate()?;
            self.sink.write_block(addr, block)?;
            Ok(addr)
        })?;

        let entry = DirectoryEntry {
            id: self.id,
            root,
            length: self.length,
        };
        tracing::trace!(stream = self.id, root, length = self.length, depth, "sealed stream");

        self.sealed = Some(entry);
        self.levels = Vec::new();
        self.data_block = Vec::new();
        self.filled = 0;
        Ok(entry)
    }

    /// Lay out the unwritten tail in memory without touching the sink
    ///
    /// The stream stays open; later appends do not affect the snapshot.
    pub fn snapshot(&self) -> Result<TreeSnapshot> {
        if self.sealed.is_some() {
            return Err(MuxError::StreamClosed(self.id));
        }
        self.check_depth()?;

        let floor = self.allocator.allocated();
        let mut next = MAX_BLOCKS;
        let mut blocks = HashMap::new();
        let root = self.layout_tail(|block| {
            if next <= floor {
                return Err(MuxError::Corruption(format!(
                    "no free addresses left to snapshot stream {}",
                    self.id
                )));
            }
            next -= 1;
            let addr = next as u32;
            blocks.insert(addr, block.to_vec());
            Ok(addr)
        })?;

        Ok(TreeSnapshot {
            root,
            length: self.length,
            blocks,
        })
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Write the current data block (zero-padded) to a fresh address
    fn write_data_block(&mut self) -> Result<u32> {
        self.data_block[self.filled..].fill(0);
        let addr = self.allocator.allocate()?;
        self.sink.write_block(addr, &self.data_block)?;
        self.filled = 0;
        Ok(addr)
    }

    /// Write the pointers collected at `level` to a fresh address
    fn write_pointer_block(&mut self, level: usize) -> Result<u32> {
        let block = encode_pointers(&self.levels[level], self.byte_order, self.block_size);
        let addr = self.allocator.allocate()?;
        self.sink.write_block(addr, &block)?;
        self.levels[level].clear();
        Ok(addr)
    }

    /// Record a full data block, carrying full pointer blocks upward
    fn push_pointer(&mut self, mut addr: u32) -> Result<()> {
        let fanout = self.block_size / 4;
        let mut level = 0;
        loop {
            if level == self.levels.len() {
                self.levels.push(Vec::with_capacity(fanout));
                tracing::trace!(stream = self.id, depth = self.levels.len(), "tree grew");
            }

            let pointers = &mut self.levels[level];
            pointers.push(addr);
            if pointers.len() < fanout {
                return Ok(());
            }

            addr = self.write_pointer_block(level)?;
            level += 1;
        }
    }

    /// The tree built so far must have exactly `tree_depth(length)` levels
    fn check_depth(&self) -> Result<usize> {
        let depth = tree_depth(self.length, self.block_size as u32)?;
        if depth != self.levels.len() {
            return Err(MuxError::Corruption(format!(
                "stream {} has {} pointer levels, length {} needs {}",
                self.id,
                self.levels.len(),
                self.length,
                depth
            )));
        }
        Ok(depth)
    }

    /// Emit the partial data block and every non-empty level bottom-up
    ///
    /// `place` receives each block and returns its address; the last call is
    /// the root. A shallow stream's (possibly empty) data block is the root
    /// itself. The top level is never empty: it is created holding one
    /// pointer and only empties by overflowing into a new top.
    fn layout_tail(&self, mut place: impl FnMut(&[u8]) -> Result<u32>) -> Result<u32> {
        let mut data = self.data_block.clone();
        data[self.filled..].fill(0);
        if self.levels.is_empty() {
            return place(&data);
        }

        let mut levels = self.levels.clone();
        if self.filled > 0 {
            levels[0].push(place(&data)?);
        }

        let top = levels.len() - 1;
        for level in 0..top {
            if levels[level].is_empty() {
                continue;
            }
            let addr = place(&encode_pointers(&levels[level], self.byte_order, self.block_size)[..])?;
            levels[level + 1].push(addr);
        }

        if levels[top].is_empty() {
            return Err(MuxError::Corruption(format!(
                "stream {} has an empty root pointer block",
                self.id
            )));
        }
        place(&encode_pointers(&levels[top], self.byte_order, self.block_size)[..])
    }
}

impl std::fmt::Debug for TreeWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWriter")
            .field("id", &self.id)
            .field("length", &self.length)
            .field("depth", &self.levels.len())
            .field("sealed", &self.sealed.is_some())
            .finish()
    }
}
