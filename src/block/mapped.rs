//! Memory-Mapped Block File
//!
//! Read-only mappings of the block region, one per 1 GiB slice. Block
//! position `p` (relative to the end of the header) lives in slice
//! `p >> 30` at offset `p & (2^30 - 1)`. Slices are immutable once mapped,
//! so reads need no lock.

use std::fs::File;

use memmap2::{Mmap, MmapOptions};

use crate::error::{MuxError, Result};
use crate::format::{ByteOrder, HEADER_SIZE, MAPPING_SLICE_BITS, MAPPING_SLICE_SIZE};

use super::{decode_pointers, BlockSource};

/// Block store backed by read-only memory mappings
pub struct MappedBlockFile {
    slices: Vec<Mmap>,
    block_size: usize,
    byte_order: ByteOrder,
    num_blocks: u64,
}

impl MappedBlockFile {
    /// Map the `num_blocks` blocks following the header of `file`
    pub fn map(file: &File, block_size: usize, byte_order: ByteOrder, num_blocks: u64) -> Result<Self> {
        let region = num_blocks * block_size as u64;
        let slice_count = region.div_ceil(MAPPING_SLICE_SIZE);

        let mut slices = Vec::with_capacity(slice_count as usize);
        for index in 0..slice_count {
            let start = index << MAPPING_SLICE_BITS;
            let len = MAPPING_SLICE_SIZE.min(region - start);
            // SAFETY: the mapping is read-only and the file is opened read-only;
            // the format never rewrites blocks once a file is complete.
            let slice = unsafe {
                MmapOptions::new()
                    .offset(HEADER_SIZE + start)
                    .len(len as usize)
                    .map(file)?
            };
            slices.push(slice);
        }

        tracing::debug!(slices = slices.len(), num_blocks, "mapped block region");

        Ok(Self {
            slices,
            block_size,
            byte_order,
            num_blocks,
        })
    }

    /// Borrow a block directly from its mapping if it lies inside one slice
    fn contiguous(&self, addr: u32) -> Result<Option<&[u8]>> {
        let position = self.position(addr)?;
        let slice = self
            .slices
            .get((position >> MAPPING_SLICE_BITS) as usize)
            .ok_or(MuxError::UnmappedBlock(addr))?;
        let offset = (position & (MAPPING_SLICE_SIZE - 1)) as usize;
        Ok(slice.get(offset..offset + self.block_size))
    }

    /// Byte position of block `addr` within the block region
    fn position(&self, addr: u32) -> Result<u64> {
        if addr as u64 >= self.num_blocks {
            return Err(MuxError::UnmappedBlock(addr));
        }
        Ok(addr as u64 * self.block_size as u64)
    }
}

impl BlockSource for MappedBlockFile {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    fn read_block(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.block_size {
            return Err(MuxError::Corruption(format!(
                "block buffer must be exactly {} bytes, got {}",
                self.block_size,
                buf.len()
            )));
        }

        // A block may straddle two slices when the block size does not divide 2^30
        let mut position = self.position(addr)?;
        let mut copied = 0;
        while copied < buf.len() {
            let slice = self
                .slices
                .get((position >> MAPPING_SLICE_BITS) as usize)
                .ok_or(MuxError::UnmappedBlock(addr))?;
            let offset = (position & (MAPPING_SLICE_SIZE - 1)) as usize;
            let n = (buf.len() - copied).min(slice.len() - offset);
            buf[copied..copied + n].copy_from_slice(&slice[offset..offset + n]);
            copied += n;
            position += n as u64;
        }
        Ok(())
    }

    fn read_pointers(&self, addr: u32, out: &mut [u32]) -> Result<()> {
        match self.contiguous(addr)? {
            Some(raw) => {
                decode_pointers(raw, self.byte_order, out);
                Ok(())
            }
            None => {
                let mut raw = vec![0u8; self.block_size];
                self.read_block(addr, &mut raw)?;
                decode_pointers(&raw, self.byte_order, out);
                Ok(())
            }
        }
    }
}
