//! Tests for MultiplexedFileReader
//!
//! These tests verify:
//! - Directory lookups (ids, lengths, missing streams)
//! - Detection of corrupted directories and block pointers
//! - Reader accessors

#[path = "../common/mod.rs"]
mod common;

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use common::*;
use muxfile::block::{BlockAllocator, DirectBlockFile};
use muxfile::format::{Directory, Header, HEADER_SIZE};
use muxfile::tree::TreeWriter;
use muxfile::{ByteOrder, MultiplexedFileReader, MultiplexedFileWriter, MuxError};

// =============================================================================
// Helper Functions
// =============================================================================

fn patch(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
}

fn assert_corruption(path: &Path) {
    for config in [direct(), mapped()] {
        assert!(matches!(
            MultiplexedFileReader::open_with(path, config),
            Err(MuxError::Corruption(_))
        ));
    }
}

// =============================================================================
// Directory Lookups
// =============================================================================

#[test]
fn test_stream_lookup() {
    let (_temp, path) = setup_temp_file();
    let payloads = vec![random_bytes(1, 10), random_bytes(2, 0), random_bytes(3, 5000)];
    let ids = write_streams(&path, writer_config(64), &payloads);

    let reader = MultiplexedFileReader::open_with(&path, direct()).unwrap();
    assert_eq!(reader.stream_count(), 3);
    assert_eq!(reader.stream_ids(), ids);

    for (id, payload) in ids.iter().zip(&payloads) {
        assert!(reader.has_stream_id(*id));
        assert_eq!(reader.stream_length(*id), Some(payload.len() as u64));
        let stream = reader.input_stream(*id).unwrap().unwrap();
        assert_eq!(stream.id(), *id);
        assert_eq!(stream.data_length(), payload.len() as u64);
    }
}

#[test]
fn test_missing_stream() {
    let (_temp, path) = setup_temp_file();
    write_single(&path, 64, ByteOrder::Big, b"only");

    let reader = MultiplexedFileReader::open_with(&path, direct()).unwrap();
    assert!(!reader.has_stream_id(1));
    assert!(reader.input_stream(1).unwrap().is_none());
    assert_eq!(reader.stream_length(1), None);

    // The directory stream is not visible as a regular stream
    assert!(!reader.has_stream_id(-1));
    assert!(reader.input_stream(-1).unwrap().is_none());
}

#[test]
fn test_reader_accessors() {
    let (_temp, path) = setup_temp_file();
    write_single(&path, 256, ByteOrder::Little, &random_bytes(4, 100));

    for (config, mmap) in [(direct(), false), (mapped(), true)] {
        let reader = MultiplexedFileReader::open_with(&path, config).unwrap();
        assert_eq!(reader.block_size(), 256);
        assert_eq!(reader.byte_order(), ByteOrder::Little);
        assert_eq!(reader.uses_mmap(), mmap);
        assert_eq!(reader.path(), path.as_path());
        // one data block for the stream, one for the directory
        assert_eq!(reader.num_blocks(), 2);
        assert!(format!("{:?}", reader).contains("MultiplexedFileReader"));
        reader.close();
    }
}

#[test]
fn test_stream_outlives_file_reader() {
    let (_temp, path) = setup_temp_file();
    let payload = random_bytes(5, 4000);
    let id = write_single(&path, 32, ByteOrder::Big, &payload);

    let reader = MultiplexedFileReader::open_with(&path, mapped()).unwrap();
    let mut stream = reader.input_stream(id).unwrap().unwrap();
    reader.close();

    assert_eq!(read_all(&mut stream), payload);
}

// =============================================================================
// Corruption Detection
// =============================================================================

#[test]
fn test_directory_length_not_record_multiple() {
    let (_temp, path) = setup_temp_file();
    write_single(&path, 64, ByteOrder::Big, b"payload");

    // directory length field: bytes 13..21
    patch(&path, 13, &17u64.to_be_bytes());
    assert_corruption(&path);
}

#[test]
fn test_directory_length_exceeds_file() {
    let (_temp, path) = setup_temp_file();
    write_single(&path, 64, ByteOrder::Big, b"payload");

    patch(&path, 13, &(16u64 * 1000).to_be_bytes());
    assert_corruption(&path);
}

#[test]
fn test_truncated_directory_block() {
    let (_temp, path) = setup_temp_file();
    write_single(&path, 64, ByteOrder::Big, &random_bytes(6, 300));

    // The directory root is the last block written
    let len = std::fs::metadata(&path).unwrap().len();
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - 64).unwrap();

    assert_corruption(&path);
}

#[test]
fn test_pointer_outside_file() {
    let (_temp, path) = setup_temp_file();
    let writer = MultiplexedFileWriter::create(&path, writer_config(16)).unwrap();
    let stream = writer.new_stream().unwrap();
    stream.write_bytes(&random_bytes(7, 100)).unwrap();
    let entry = stream.close().unwrap();
    writer.close().unwrap();

    // First slot of the stream's root pointer block
    patch(&path, HEADER_SIZE + entry.root as u64 * 16, &[0xFF; 4]);

    for config in [direct(), mapped()] {
        let reader = MultiplexedFileReader::open_with(&path, config).unwrap();
        assert!(matches!(
            reader.input_stream(entry.id),
            Err(MuxError::Corruption(_))
        ));
    }
}

#[test]
fn test_duplicate_ids_in_directory() {
    let (_temp, path) = setup_temp_file();
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(&path)
        .unwrap();

    let storage = Arc::new(DirectBlockFile::create(file, 32, ByteOrder::Big, true, 1));
    let allocator = Arc::new(BlockAllocator::new());

    let mut stream = TreeWriter::new(4, storage.clone(), allocator.clone(), 32, ByteOrder::Big);
    stream.append(b"twice").unwrap();
    let entry = stream.seal().unwrap();

    let mut directory = TreeWriter::new(-1, storage.clone(), allocator.clone(), 32, ByteOrder::Big);
    directory
        .append(&Directory::encode(&[entry, entry]).unwrap())
        .unwrap();
    let directory_entry = directory.seal().unwrap();

    let header = Header {
        block_size: 32,
        byte_order: ByteOrder::Big,
        directory_root: directory_entry.root,
        directory_length: directory_entry.length,
    };
    storage.write_header(&header.encode().unwrap()).unwrap();
    storage.sync().unwrap();
    drop(storage);

    assert_corruption(&path);
}
