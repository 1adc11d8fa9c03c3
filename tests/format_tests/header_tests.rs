//! Tests for the file header
//!
//! These tests verify:
//! - Header encoding and decoding
//! - Rejection of bad magic, block sizes and byte order markers
//! - Header validation when opening real files

#[path = "../common/mod.rs"]
mod common;

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use common::*;
use muxfile::format::{Header, HEADER_SIZE, MAGIC};
use muxfile::{ByteOrder, MultiplexedFileReader, MuxError};

// =============================================================================
// Helper Functions
// =============================================================================

fn patch(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
}

fn valid_header() -> Header {
    Header {
        block_size: 4096,
        byte_order: ByteOrder::Big,
        directory_root: 12,
        directory_length: 48,
    }
}

// =============================================================================
// Codec Tests
// =============================================================================

#[test]
fn test_header_round_trip() {
    for byte_order in [ByteOrder::Big, ByteOrder::Little] {
        let header = Header {
            byte_order,
            ..valid_header()
        };
        let bytes = header.encode().unwrap();

        assert_eq!(bytes.len() as u64, HEADER_SIZE);
        assert_eq!(Header::decode(&bytes).unwrap(), header);
    }
}

#[test]
fn test_header_ignores_trailing_bytes() {
    let mut bytes = valid_header().encode().unwrap();
    bytes.extend_from_slice(&[0xAA; 64]);

    assert_eq!(Header::decode(&bytes).unwrap(), valid_header());
}

#[test]
fn test_magic_constant() {
    let bytes = valid_header().encode().unwrap();
    assert_eq!(u32::from_be_bytes(bytes[0..4].try_into().unwrap()), MAGIC);
}

#[test]
fn test_placeholder_header() {
    let header = Header::placeholder(64, ByteOrder::Little);
    assert_eq!(header.directory_root, 0);
    assert_eq!(header.directory_length, 0);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_bad_magic_rejected() {
    let mut bytes = valid_header().encode().unwrap();
    bytes[0] ^= 0xFF;

    assert!(matches!(Header::decode(&bytes), Err(MuxError::Format(_))));
}

#[test]
fn test_block_size_not_multiple_of_four_rejected() {
    let header = Header {
        block_size: 4094,
        ..valid_header()
    };
    let bytes = header.encode().unwrap();

    assert!(matches!(Header::decode(&bytes), Err(MuxError::Format(_))));
}

#[test]
fn test_block_size_too_small_rejected() {
    for block_size in [0, 4] {
        let header = Header {
            block_size,
            ..valid_header()
        };
        let bytes = header.encode().unwrap();

        assert!(matches!(Header::decode(&bytes), Err(MuxError::Format(_))));
    }
}

#[test]
fn test_block_size_too_large_rejected() {
    for block_size in [(1 << 30) + 4, 0xFFFF_FFFC] {
        let header = Header {
            block_size,
            ..valid_header()
        };
        let bytes = header.encode().unwrap();

        assert!(matches!(Header::decode(&bytes), Err(MuxError::Format(_))));
    }

    let largest = Header {
        block_size: 1 << 30,
        ..valid_header()
    };
    assert_eq!(Header::decode(&largest.encode().unwrap()).unwrap(), largest);
}

#[test]
fn test_illegal_byte_order_rejected() {
    let mut bytes = valid_header().encode().unwrap();
    bytes[8] = 2;

    assert!(matches!(Header::decode(&bytes), Err(MuxError::Format(_))));
}

#[test]
fn test_short_header_rejected() {
    let bytes = valid_header().encode().unwrap();

    assert!(matches!(
        Header::decode(&bytes[..20]),
        Err(MuxError::Format(_))
    ));
}

// =============================================================================
// File-Level Tests
// =============================================================================

#[test]
fn test_open_rejects_corrupted_magic() {
    let (_temp, path) = setup_temp_file();
    write_single(&path, 64, ByteOrder::Big, b"payload");
    patch(&path, 0, &[0, 0, 0, 0]);

    assert!(matches!(
        MultiplexedFileReader::open_with(&path, direct()),
        Err(MuxError::Format(_))
    ));
}

#[test]
fn test_open_rejects_illegal_byte_order() {
    let (_temp, path) = setup_temp_file();
    write_single(&path, 64, ByteOrder::Big, b"payload");
    patch(&path, 8, &[7]);

    assert!(matches!(
        MultiplexedFileReader::open_with(&path, direct()),
        Err(MuxError::Format(_))
    ));
}

#[test]
fn test_open_rejects_file_smaller_than_header() {
    let (_temp, path) = setup_temp_file();
    std::fs::write(&path, [0u8; 10]).unwrap();

    assert!(matches!(
        MultiplexedFileReader::open_with(&path, direct()),
        Err(MuxError::Format(_))
    ));
}

#[test]
fn test_open_rejects_oversized_block_size_header() {
    let (_temp, path) = setup_temp_file();
    let header = Header {
        block_size: 0xFFFF_FFFC,
        byte_order: ByteOrder::Big,
        directory_root: 0,
        directory_length: 0,
    };
    std::fs::write(&path, header.encode().unwrap()).unwrap();

    for config in [direct(), mapped()] {
        assert!(matches!(
            MultiplexedFileReader::open_with(&path, config),
            Err(MuxError::Format(_))
        ));
    }
}

#[test]
fn test_open_rejects_partial_block() {
    let (_temp, path) = setup_temp_file();
    write_single(&path, 64, ByteOrder::Big, &random_bytes(1, 500));

    let len = std::fs::metadata(&path).unwrap().len();
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - 3).unwrap();

    assert!(matches!(
        MultiplexedFileReader::open_with(&path, direct()),
        Err(MuxError::Format(_))
    ));
}

#[test]
fn test_open_reports_header_fields() {
    let (_temp, path) = setup_temp_file();
    write_single(&path, 128, ByteOrder::Little, &random_bytes(2, 1000));

    let reader = MultiplexedFileReader::open_with(&path, direct()).unwrap();
    assert_eq!(reader.block_size(), 128);
    assert_eq!(reader.byte_order(), ByteOrder::Little);

    let len = std::fs::metadata(&path).unwrap().len();
    assert_eq!(len, HEADER_SIZE + reader.num_blocks() * 128);
}
