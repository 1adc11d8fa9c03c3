//! File Header
//!
//! Fixed 21-byte header at offset 0. Written as a placeholder when a file is
//! created and overwritten with the directory location on close.

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{MuxError, Result};

use super::{record_codec, ByteOrder, HEADER_SIZE, MAGIC, MAPPING_SLICE_SIZE, MIN_BLOCK_SIZE};

/// Raw header record, field order is the on-disk order
#[derive(Debug, Serialize, Deserialize)]
struct HeaderRecord {
    magic: u32,
    block_size: u32,
    byte_order: u8,
    directory_root: u32,
    directory_length: u64,
}

/// Validated file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Size of every block in bytes
    pub block_size: u32,
    /// Byte order of pointer blocks
    pub byte_order: ByteOrder,
    /// Root block of the directory stream
    pub directory_root: u32,
    /// Byte length of the directory stream
    pub directory_length: u64,
}

impl Header {
    /// Header for a freshly created file whose directory is not written yet
    pub fn placeholder(block_size: u32, byte_order: ByteOrder) -> Self {
        Self {
            block_size,
            byte_order,
            directory_root: 0,
            directory_length: 0,
        }
    }

    /// Encode to exactly `HEADER_SIZE` bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let record = HeaderRecord {
            magic: MAGIC,
            block_size: self.block_size,
            byte_order: self.byte_order.to_byte(),
            directory_root: self.directory_root,
            directory_length: self.directory_length,
        };
        let bytes = record_codec().serialize(&record)?;
        debug_assert_eq!(bytes.len() as u64, HEADER_SIZE);
        Ok(bytes)
    }

    /// Decode and validate a header
    ///
    /// Rejects a wrong magic number, a block size that is not a multiple of 4,
    /// smaller than 8 or larger than one mapping slice, and an unknown byte
    /// order marker.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if (bytes.len() as u64) < HEADER_SIZE {
            return Err(MuxError::Format(format!(
                "file too small for header: {} bytes",
                bytes.len()
            )));
        }

        let record: HeaderRecord = record_codec().deserialize(&bytes[..HEADER_SIZE as usize])?;

        if record.magic != MAGIC {
            return Err(MuxError::Format(format!(
                "illegal magic: expected {:#010x}, got {:#010x}",
                MAGIC, record.magic
            )));
        }
        if record.block_size % 4 != 0 {
            return Err(MuxError::Format(format!(
                "block size must be divisible by 4, got {}",
                record.block_size
            )));
        }
        if record.block_size < MIN_BLOCK_SIZE {
            return Err(MuxError::Format(format!(
                "block size must be >= {}, got {}",
                MIN_BLOCK_SIZE, record.block_size
            )));
        }
        if record.block_size as u64 > MAPPING_SLICE_SIZE {
            return Err(MuxError::Format(format!(
                "block size must be <= {}, got {}",
                MAPPING_SLICE_SIZE, record.block_size
            )));
        }
        let byte_order = ByteOrder::from_byte(record.byte_order).ok_or_else(|| {
            MuxError::Format(format!("illegal byte order marker {}", record.byte_order))
        })?;

        Ok(Self {
            block_size: record.block_size,
            byte_order,
            directory_root: record.directory_root,
            directory_length: record.directory_length,
        })
    }
}
