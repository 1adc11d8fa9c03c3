//! Direct Block File
//!
//! Positioned reads and writes on a single file handle. The handle and its
//! cursor are shared, so every access happens under one mutex.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{MuxError, Result};
use crate::format::ByteOrder;

use super::{block_offset, BlockSink, BlockSource};

/// State guarded by the file mutex
struct DirectState {
    file: File,
    /// Completed blocks not yet written out (write-behind mode only)
    pending: BTreeMap<u32, Vec<u8>>,
}

/// Block store doing plain file I/O
///
/// ## Concurrency:
/// - `state`: one mutex around the file handle and the write-behind buffer
/// - `num_blocks`: atomic high-water mark of written addresses
pub struct DirectBlockFile {
    state: Mutex<DirectState>,
    block_size: usize,
    byte_order: ByteOrder,
    num_blocks: AtomicU64,
    /// `None` writes every block through immediately (auto flush)
    max_pending: Option<usize>,
}

impl DirectBlockFile {
    /// Wrap an existing file holding `num_blocks` blocks, for reading
    pub fn open(file: File, block_size: usize, byte_order: ByteOrder, num_blocks: u64) -> Self {
        Self {
            state: Mutex::new(DirectState {
                file,
                pending: BTreeMap::new(),
            }),
            block_size,
            byte_order,
            num_blocks: AtomicU64::new(num_blocks),
            max_pending: None,
        }
    }

    /// Wrap a freshly created file for writing
    ///
    /// With `auto_flush` every block goes straight to the file; otherwise up to
    /// `max_pending` completed blocks are kept in memory and written out in
    /// address order, coalescing adjacent blocks into one write.
    pub fn create(
        file: File,
        block_size: usize,
        byte_order: ByteOrder,
        auto_flush: bool,
        max_pending: usize,
    ) -> Self {
        let mut store = Self::open(file, block_size, byte_order, 0);
        if !auto_flush {
            store.max_pending = Some(max_pending.max(1));
        }
        store
    }

    /// Write raw bytes at offset 0 (the file header)
    pub fn write_header(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        state.file.seek(SeekFrom::Start(0))?;
        state.file.write_all(bytes)?;
        Ok(())
    }

    /// Write out all buffered blocks
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        Self::write_pending(&mut state, self.block_size)?;
        state.file.flush()?;
        Ok(())
    }

    /// Flush and fsync
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.lock();
        Self::write_pending(&mut state, self.block_size)?;
        state.file.flush()?;
        state.file.sync_all()?;
        Ok(())
    }

    /// Current length of the underlying file in bytes
    pub fn file_len(&self) -> Result<u64> {
        let state = self.state.lock();
        Ok(state.file.metadata()?.len())
    }

    /// Number of completed blocks waiting in the write-behind buffer
    pub fn pending_blocks(&self) -> usize {
        self.state.lock().pending.len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Drain the write-behind buffer, one write per run of adjacent addresses
    fn write_pending(state: &mut DirectState, block_size: usize) -> Result<()> {
        if state.pending.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut state.pending);
        let mut blocks = pending.into_iter().peekable();
        while let Some((start, mut run)) = blocks.next() {
            let mut next = start as u64 + 1;
            while let Some((_, block)) = blocks.next_if(|(addr, _)| *addr as u64 == next) {
                run.extend_from_slice(&block);
                next += 1;
            }
            state.file.seek(SeekFrom::Start(block_offset(start, block_size)))?;
            state.file.write_all(&run)?;
        }
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.block_size {
            return Err(MuxError::Corruption(format!(
                "block buffer must be exactly {} bytes, got {}",
                self.block_size, len
            )));
        }
        Ok(())
    }
}

impl BlockSource for DirectBlockFile {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn num_blocks(&self) -> u64 {
        self.num_blocks.load(Ordering::SeqCst)
    }

    fn read_block(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.check_len(buf.len())?;

        let mut state = self.state.lock();
        if let Some(block) = state.pending.get(&addr) {
            buf.copy_from_slice(block);
            return Ok(());
        }

        // Short read surfaces as UnexpectedEof
        state.file.seek(SeekFrom::Start(block_offset(addr, self.block_size)))?;
        state.file.read_exact(buf)?;
        Ok(())
    }
}

impl BlockSink for DirectBlockFile {
    fn write_block(&self, addr: u32, data: &[u8]) -> Result<()> {
        self.check_len(data.len())?;

        let mut state = self.state.lock();
        match self.max_pending {
            None => {
                state.file.seek(SeekFrom::Start(block_offset(addr, self.block_size)))?;
                state.file.write_all(data)?;
            }
            Some(max_pending) => {
                state.pending.insert(addr, data.to_vec());
                if state.pending.len() >= max_pending {
                    Self::write_pending(&mut state, self.block_size)?;
                }
            }
        }
        self.num_blocks.fetch_max(addr as u64 + 1, Ordering::SeqCst);
        Ok(())
    }
}
