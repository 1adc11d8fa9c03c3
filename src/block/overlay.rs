//! Overlay Block Source
//!
//! In-memory blocks layered over another source. Reading a stream that is
//! still open needs this: its written blocks come from the file, its
//! unwritten tail from the writer's snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{MuxError, Result};
use crate::format::{ByteOrder, MAX_BLOCKS};

use super::BlockSource;

pub struct OverlayBlockSource {
    base: Arc<dyn BlockSource>,
    blocks: HashMap<u32, Vec<u8>>,
}

impl OverlayBlockSource {
    pub fn new(base: Arc<dyn BlockSource>, blocks: HashMap<u32, Vec<u8>>) -> Self {
        Self { base, blocks }
    }
}

impl BlockSource for OverlayBlockSource {
    fn block_size(&self) -> usize {
        self.base.block_size()
    }

    fn byte_order(&self) -> ByteOrder {
        self.base.byte_order()
    }

    /// Overlay addresses sit at the top of the address space
    fn num_blocks(&self) -> u64 {
        MAX_BLOCKS
    }

    fn read_block(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        match self.blocks.get(&addr) {
            Some(block) if block.len() == buf.len() => {
                buf.copy_from_slice(block);
                Ok(())
            }
            Some(block) => Err(MuxError::Corruption(format!(
                "block buffer must be exactly {} bytes, got {}",
                block.len(),
                buf.len()
            ))),
            None => self.base.read_block(addr, buf),
        }
    }
}
