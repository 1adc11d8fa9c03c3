//! Stream Reader
//!
//! Random-access reads through a stream's indirection tree.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::block::BlockSource;
use crate::error::{MuxError, Result};

use super::{absolute_position, block_position, tree_depth};

/// Reader over one stream
///
/// Holds one pointer block per level plus the current data block. `pos`
/// has `depth + 1` digits: the slot within each pointer level, then the
/// byte offset within the data block. `loaded[i]` is the slot of level `i`
/// whose child currently sits in the buffer below it (`None` = stale).
///
/// Readers are independent of each other; they only share the block source.
pub struct StreamReader {
    id: i32,
    source: Arc<dyn BlockSource>,
    data_length: u64,
    depth: usize,
    block_size: usize,
    pointer_blocks: Vec<Vec<u32>>,
    data_block: Vec<u8>,
    pos: Vec<usize>,
    loaded: Vec<Option<usize>>,
    /// Readable bytes left in `data_block` from `pos[depth]`
    remaining: usize,
}

impl StreamReader {
    /// Open the stream rooted at `root` with `length` bytes
    ///
    /// Loads the root and the leftmost path down to the first data block.
    pub fn open(id: i32, source: Arc<dyn BlockSource>, root: u32, length: u64) -> Result<Self> {
        let block_size = source.block_size();
        let depth = tree_depth(length, block_size as u32)?;
        let fanout = block_size / 4;

        let mut reader = Self {
            id,
            source,
            data_length: length,
            depth,
            block_size,
            pointer_blocks: vec![vec![0u32; fanout]; depth],
            data_block: vec![0u8; block_size],
            pos: vec![0; depth + 1],
            loaded: vec![None; depth],
            remaining: 0,
        };

        if depth == 0 {
            reader.load_data(root)?;
        } else {
            reader.load_pointers(0, root)?;
            reader.load_path(&vec![0; depth + 1])?;
        }
        reader.remaining = length.min(block_size as u64) as usize;

        Ok(reader)
    }

    /// Stream id
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Total stream length in bytes
    pub fn data_length(&self) -> u64 {
        self.data_length
    }

    /// Number of pointer levels
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Current absolute byte offset
    pub fn position(&self) -> u64 {
        absolute_position(&self.pos, self.block_size)
    }

    /// Bytes left until the end of the stream
    pub fn available(&self) -> u64 {
        self.data_length - self.position()
    }

    /// Move to absolute offset `target`
    ///
    /// `target == data_length` is the end position: nothing is loaded, since
    /// the slot it names may not exist. Out-of-range targets are rejected
    /// without touching the reader state.
    pub fn seek_to(&mut self, target: u64) -> Result<()> {
        if target > self.data_length {
            return Err(MuxError::OutOfBounds {
                position: target,
                length: self.data_length,
            });
        }
        self.move_to(target)
    }

    /// Read up to `buf.len()` bytes, returning 0 at the end of the stream
    ///
    /// On error, bytes already copied into `buf` stay there.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut copied = 0;
        while copied < buf.len() {
            if self.remaining == 0 {
                self.advance()?;
                if self.remaining == 0 {
                    break;
                }
            }
            let offset = self.pos[self.depth];
            let n = (buf.len() - copied).min(self.remaining);
            buf[copied..copied + n].copy_from_slice(&self.data_block[offset..offset + n]);
            copied += n;
            self.remaining -= n;
            self.pos[self.depth] += n;
        }
        Ok(copied)
    }

    /// Read a single byte, `None` at the end of the stream
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        if self.remaining == 0 {
            self.advance()?;
            if self.remaining == 0 {
                return Ok(None);
            }
        }
        let offset = self.pos[self.depth];
        self.pos[self.depth] += 1;
        self.remaining -= 1;
        Ok(Some(self.data_block[offset]))
    }

    /// True once every byte has been read
    pub fn is_eof(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            self.advance()?;
        }
        Ok(self.remaining == 0)
    }

    /// Release the reader; it holds no resources beyond its buffers
    pub fn close(self) {}

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Step past the end of the current data block
    ///
    /// At a block boundary the last digit equals `block_size`; re-decomposing
    /// the position carries it like an odometer: the deepest slot below
    /// `fanout - 1` is incremented and every deeper slot restarts at 0.
    /// Does nothing once the stream is exhausted.
    fn advance(&mut self) -> Result<()> {
        let position = self.position();
        if position >= self.data_length {
            return Ok(());
        }
        self.move_to(position)
    }

    fn move_to(&mut self, target: u64) -> Result<()> {
        let digits = block_position(target, self.depth, self.block_size);

        // Stays 0 if a block load fails, so the next read retries from `pos`
        self.remaining = 0;
        if target < self.data_length {
            self.load_path(&digits)?;
        }

        let in_block = (self.block_size - digits[self.depth]) as u64;
        self.remaining = in_block.min(self.data_length - target) as usize;
        self.pos = digits;
        Ok(())
    }

    /// Make the buffers below the root match `digits`
    ///
    /// Only levels from the first differing slot downward are re-read.
    fn load_path(&mut self, digits: &[usize]) -> Result<()> {
        let Some(first) = (0..self.depth).find(|&level| self.loaded[level] != Some(digits[level]))
        else {
            return Ok(());
        };

        for slot in &mut self.loaded[first..] {
            *slot = None;
        }
        for level in first..self.depth {
            let addr = self.pointer_blocks[level][digits[level]];
            if level + 1 < self.depth {
                self.load_pointers(level + 1, addr)?;
            } else {
                self.load_data(addr)?;
            }
            self.loaded[level] = Some(digits[level]);
        }
        Ok(())
    }

    fn load_pointers(&mut self, level: usize, addr: u32) -> Result<()> {
        self.check_addr(addr)?;
        self.source.read_pointers(addr, &mut self.pointer_blocks[level])
    }

    fn load_data(&mut self, addr: u32) -> Result<()> {
        self.check_addr(addr)?;
        self.source.read_block(addr, &mut self.data_block)
    }

    fn check_addr(&self, addr: u32) -> Result<()> {
        let num_blocks = self.source.num_blocks();
        if addr as u64 >= num_blocks {
            return Err(MuxError::Corruption(format!(
                "stream {} points to block {} but the file holds {} blocks",
                self.id, addr, num_blocks
            )));
        }
        Ok(())
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf)?)
    }
}

impl Seek for StreamReader {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let target = match from {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.data_length.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position().checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        self.seek_to(target)?;
        Ok(target)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position())
    }
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("id", &self.id)
            .field("data_length", &self.data_length)
            .field("depth", &self.depth)
            .field("position", &self.position())
            .finish()
    }
}
