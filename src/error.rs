//! Error types for muxfile
//!
//! Provides a unified error type for all operations.

use std::io;

use thiserror::Error;

/// Result type alias using MuxError
pub type Result<T> = std::result::Result<T, MuxError>;

/// Unified error type for muxfile operations
#[derive(Debug, Error)]
pub enum MuxError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Not a multiplexed file: {0}")]
    Format(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Corruption Errors
    // -------------------------------------------------------------------------
    #[error("Corrupted data: {0}")]
    Corruption(String),

    #[error("Stream length {length} too large for block size {block_size}")]
    StreamTooLarge { length: u64, block_size: u32 },

    // -------------------------------------------------------------------------
    // Bounds Errors
    // -------------------------------------------------------------------------
    #[error("Position {position} outside of stream range 0..={length}")]
    OutOfBounds { position: u64, length: u64 },

    #[error("Block {0} lies outside the mapped file region")]
    UnmappedBlock(u32),

    // -------------------------------------------------------------------------
    // Stream Errors
    // -------------------------------------------------------------------------
    #[error("Stream {0} is already closed")]
    StreamClosed(i32),

    #[error("Stream id {0} is reserved or already in use")]
    DuplicateStream(i32),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for MuxError {
    fn from(err: bincode::Error) -> Self {
        MuxError::Serialization(err.to_string())
    }
}

impl From<MuxError> for io::Error {
    fn from(err: MuxError) -> Self {
        match err {
            MuxError::Io(e) => e,
            other => {
                let kind = match &other {
                    MuxError::OutOfBounds { .. } => io::ErrorKind::InvalidInput,
                    MuxError::StreamClosed(_) => io::ErrorKind::BrokenPipe,
                    _ => io::ErrorKind::InvalidData,
                };
                io::Error::new(kind, other)
            }
        }
    }
}
