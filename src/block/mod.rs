//! Block Module
//!
//! Fixed-size block storage underneath every stream.
//!
//! ## Responsibilities
//! - Read and write whole blocks by 32-bit address
//! - Decode/encode pointer blocks in the file's byte order
//! - Hand out fresh block addresses from one file-wide counter
//!
//! Block `n` lives at byte offset `HEADER_SIZE + n * block_size`. Two read
//! backends exist: [`DirectBlockFile`] (positioned I/O behind a mutex, also
//! used for writing) and [`MappedBlockFile`] (read-only memory mappings,
//! lock-free). [`OverlayBlockSource`] layers in-memory blocks over either
//! one.

mod allocator;
mod direct;
mod mapped;
mod overlay;
mod pointer;

pub use allocator::BlockAllocator;
pub use direct::DirectBlockFile;
pub use mapped::MappedBlockFile;
pub use overlay::OverlayBlockSource;
pub use pointer::{decode_pointers, encode_pointers};

use crate::error::Result;
use crate::format::{ByteOrder, HEADER_SIZE};

/// Read side of a block store
pub trait BlockSource: Send + Sync {
    /// Size of every block in bytes
    fn block_size(&self) -> usize;

    /// Byte order of pointer blocks
    fn byte_order(&self) -> ByteOrder;

    /// Number of blocks currently addressable
    fn num_blocks(&self) -> u64;

    /// Read block `addr` into `buf` (`buf.len() == block_size`)
    fn read_block(&self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Read block `addr` as `block_size / 4` block addresses
    fn read_pointers(&self, addr: u32, out: &mut [u32]) -> Result<()> {
        let mut raw = vec![0u8; self.block_size()];
        self.read_block(addr, &mut raw)?;
        decode_pointers(&raw, self.byte_order(), out);
        Ok(())
    }
}

/// Write side of a block store
pub trait BlockSink: Send + Sync {
    /// Write a full block at `addr` (`data.len() == block_size`)
    fn write_block(&self, addr: u32, data: &[u8]) -> Result<()>;
}

/// Byte offset of block `addr` in the file
pub(crate) fn block_offset(addr: u32, block_size: usize) -> u64 {
    HEADER_SIZE + addr as u64 * block_size as u64
}
