//! Format Module
//!
//! On-disk layout of a multiplexed file.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (21 bytes, big-endian)                               │
//! │   Magic: u32 | BlockSize: u32 | ByteOrder: u8 |             │
//! │   DirectoryRoot: u32 | DirectoryLength: u64                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Block 0 (block_size bytes)                                  │
//! │ Block 1                                                     │
//! │ ...                                                         │
//! │ Block N-1                                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Blocks are untagged. A block is either a data block (raw stream bytes)
//! or a pointer block (`block_size / 4` u32 block addresses in the file's
//! byte order); which one is known only from its position in a stream's
//! indirection tree.
//!
//! The directory is itself a stream of 16-byte records
//! `[id: i32][root: u32][length: u64]` (big-endian), rooted at the block
//! named in the header.

mod directory;
mod header;

pub use directory::{Directory, DirectoryEntry, DIRECTORY_ENTRY_SIZE};
pub use header::Header;

use bincode::Options;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic number identifying a multiplexed file
pub const MAGIC: u32 = 0xB7A3_32B2;

/// Header size: Magic (4) + BlockSize (4) + ByteOrder (1) + Root (4) + Length (8)
pub const HEADER_SIZE: u64 = 21;

/// Smallest legal block size
pub const MIN_BLOCK_SIZE: u32 = 8;

/// Each memory mapping covers 1 << 30 bytes of the block region
pub const MAPPING_SLICE_BITS: u32 = 30;

/// Size of one memory mapping slice in bytes
pub const MAPPING_SLICE_SIZE: u64 = 1 << MAPPING_SLICE_BITS;

/// Block addresses are 32 bit, so a file holds at most this many blocks
pub const MAX_BLOCKS: u64 = 1 << 32;

/// Reserved id of the directory stream, never handed out to callers
pub const DIRECTORY_STREAM_ID: i32 = -1;

// =============================================================================
// Byte Order
// =============================================================================

/// Byte order of the block addresses stored in pointer blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// Header encoding: 0 = big, 1 = little
    pub fn to_byte(self) -> u8 {
        match self {
            ByteOrder::Big => 0,
            ByteOrder::Little => 1,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ByteOrder::Big),
            1 => Some(ByteOrder::Little),
            _ => None,
        }
    }

    /// Byte order of the running platform
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }
}

/// bincode settings for header and directory records: fixed-width, big-endian
pub(crate) fn record_codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
}
