//! Configuration for muxfile
//!
//! Writer and reader settings with sensible defaults.

use crate::error::{MuxError, Result};
use crate::format::{ByteOrder, MAPPING_SLICE_SIZE, MIN_BLOCK_SIZE};

/// Configuration for creating a multiplexed file
#[derive(Debug, Clone)]
pub struct WriterConfig {
    // -------------------------------------------------------------------------
    // Layout Configuration
    // -------------------------------------------------------------------------
    /// Size of every block in bytes. Must be divisible by 4 and at least 8.
    pub block_size: u32,

    /// Byte order used for the block addresses inside pointer blocks
    pub byte_order: ByteOrder,

    // -------------------------------------------------------------------------
    // Flush Configuration
    // -------------------------------------------------------------------------
    /// Write every completed block to the file immediately
    pub auto_flush: bool,

    /// Completed blocks held in memory before they are written out
    /// (ignored when `auto_flush` is set)
    pub max_buffered_blocks: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            block_size: 4096,
            byte_order: ByteOrder::Big,
            auto_flush: false,
            max_buffered_blocks: 64,
        }
    }
}

impl WriterConfig {
    /// Create a new config builder
    pub fn builder() -> WriterConfigBuilder {
        WriterConfigBuilder::default()
    }

    /// Check the settings before any file is touched
    pub fn validate(&self) -> Result<()> {
        if self.block_size % 4 != 0 {
            return Err(MuxError::Config(format!(
                "block size must be divisible by 4, got {}",
                self.block_size
            )));
        }
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(MuxError::Config(format!(
                "block size must be >= {}, got {}",
                MIN_BLOCK_SIZE, self.block_size
            )));
        }
        if self.block_size as u64 > MAPPING_SLICE_SIZE {
            return Err(MuxError::Config(format!(
                "block size must be <= {}, got {}",
                MAPPING_SLICE_SIZE, self.block_size
            )));
        }
        if self.max_buffered_blocks == 0 {
            return Err(MuxError::Config(
                "max_buffered_blocks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for WriterConfig
#[derive(Default)]
pub struct WriterConfigBuilder {
    config: WriterConfig,
}

impl WriterConfigBuilder {
    /// Set the block size (in bytes)
    pub fn block_size(mut self, size: u32) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the pointer byte order
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.config.byte_order = order;
        self
    }

    /// Write each completed block straight through to the file
    pub fn auto_flush(mut self, enabled: bool) -> Self {
        self.config.auto_flush = enabled;
        self
    }

    /// Set how many completed blocks may be buffered before a write-out
    pub fn max_buffered_blocks(mut self, count: usize) -> Self {
        self.config.max_buffered_blocks = count;
        self
    }

    pub fn build(self) -> WriterConfig {
        self.config
    }
}

/// Configuration for opening a multiplexed file
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Serve block reads from read-only memory mappings instead of file I/O
    pub use_mmap: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            use_mmap: cfg!(target_pointer_width = "64"),
        }
    }
}

impl ReaderConfig {
    /// Create a new config builder
    pub fn builder() -> ReaderConfigBuilder {
        ReaderConfigBuilder::default()
    }
}

/// Builder for ReaderConfig
#[derive(Default)]
pub struct ReaderConfigBuilder {
    config: ReaderConfig,
}

impl ReaderConfigBuilder {
    /// Enable or disable memory-mapped reads
    pub fn use_mmap(mut self, enabled: bool) -> Self {
        self.config.use_mmap = enabled;
        self
    }

    pub fn build(self) -> ReaderConfig {
        self.config
    }
}
