//! Pointer block codec

use bytes::{Buf, BufMut, BytesMut};

use crate::format::ByteOrder;

/// Decode `out.len()` block addresses from the start of `raw`
pub fn decode_pointers(mut raw: &[u8], order: ByteOrder, out: &mut [u32]) {
    debug_assert!(raw.len() >= out.len() * 4);
    for slot in out.iter_mut() {
        *slot = match order {
            ByteOrder::Big => raw.get_u32(),
            ByteOrder::Little => raw.get_u32_le(),
        };
    }
}

/// Encode block addresses into a zero-padded block of `block_size` bytes
pub fn encode_pointers(pointers: &[u32], order: ByteOrder, block_size: usize) -> BytesMut {
    debug_assert!(pointers.len() * 4 <= block_size);
    let mut block = BytesMut::with_capacity(block_size);
    for &addr in pointers {
        match order {
            ByteOrder::Big => block.put_u32(addr),
            ByteOrder::Little => block.put_u32_le(addr),
        }
    }
    block.resize(block_size, 0);
    block
}
