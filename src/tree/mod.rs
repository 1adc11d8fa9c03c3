//! Indirection Tree Module
//!
//! Every stream is a tree of fixed fan-out pointer blocks over its data
//! blocks, in the style of classic inode indirection.
//!
//! ## Shape
//! ```text
//!                 ┌───────────────┐
//!   level 0       │ root pointers │            depth = 2
//!                 └──┬─────────┬──┘
//!             ┌──────▼──┐   ┌──▼──────┐
//!   level 1   │pointers │   │pointers │        fanout = block_size / 4
//!             └─┬────┬──┘   └─┬───────┘
//!             ┌─▼┐  ┌▼─┐    ┌─▼┐
//!   data      │D0│  │D1│ .. │Dk│                block_size bytes each
//!             └──┘  └──┘    └──┘
//! ```
//!
//! The depth of a stream depends only on its length and the block size
//! (see [`tree_depth`]); writer and reader compute it independently, so it
//! is never stored.
//!
//! A byte offset is a mixed-radix number: one digit per pointer level with
//! radix `fanout`, then the offset inside the data block with radix
//! `block_size`.

mod reader;
mod writer;

pub use reader::StreamReader;
pub use writer::{TreeSnapshot, TreeWriter};

use crate::error::{MuxError, Result};

/// Number of pointer levels between the root and the data blocks
///
/// The smallest `d` with `block_size * (block_size / 4)^d > length`. Fails if
/// the capacity overflows before exceeding `length`.
pub fn tree_depth(length: u64, block_size: u32) -> Result<usize> {
    let fanout = (block_size / 4) as u64;
    let mut capacity = block_size as u64;
    let mut depth = 0;
    while capacity <= length {
        depth += 1;
        capacity = capacity
            .checked_mul(fanout)
            .ok_or(MuxError::StreamTooLarge { length, block_size })?;
    }
    Ok(depth)
}

/// Split `position` into `depth + 1` mixed-radix digits
pub(crate) fn block_position(position: u64, depth: usize, block_size: usize) -> Vec<usize> {
    if depth == 0 {
        return vec![position as usize];
    }

    let fanout = (block_size / 4) as u64;
    let mut digits = vec![0usize; depth + 1];
    digits[depth] = (position % block_size as u64) as usize;
    let mut remaining = position / block_size as u64;
    for level in (1..depth).rev() {
        digits[level] = (remaining % fanout) as usize;
        remaining /= fanout;
    }
    digits[0] = remaining as usize;
    digits
}

/// Inverse of [`block_position`]
///
/// Also accepts a final digit equal to `block_size`, the state after
/// reading a data block to its end.
pub(crate) fn absolute_position(digits: &[usize], block_size: usize) -> u64 {
    let depth = digits.len() - 1;
    if depth == 0 {
        return digits[0] as u64;
    }

    let fanout = (block_size / 4) as u64;
    let mut blocks = digits[0] as u64;
    for &digit in &digits[1..depth] {
        blocks = blocks * fanout + digit as u64;
    }
    blocks * block_size as u64 + digits[depth] as u64
}
