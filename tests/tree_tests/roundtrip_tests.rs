//! Tests for writing and reading back whole streams
//!
//! These tests verify:
//! - Streams of every interesting length survive a write/read cycle
//! - Both byte orders, both flush modes and both read backends agree
//! - Byte-at-a-time writes produce the same file as bulk writes

#[path = "../common/mod.rs"]
mod common;

use std::io::{Read, Write};

use common::*;
use muxfile::{ByteOrder, MultiplexedFileReader, MultiplexedFileWriter, WriterConfig};

// =============================================================================
// Helper Functions
// =============================================================================

/// Lengths around every block and tree boundary for `block_size`
fn interesting_lengths(block_size: usize) -> Vec<usize> {
    let fanout = block_size / 4;
    vec![
        0,
        1,
        block_size - 1,
        block_size,
        block_size + 1,
        fanout * block_size - 1,
        fanout * block_size,
        fanout * block_size + 1,
        fanout * fanout * block_size - 1,
        fanout * fanout * block_size,
        fanout * fanout * block_size + 1,
        fanout * fanout * block_size + 7,
    ]
}

fn assert_round_trip(config: WriterConfig) {
    let (_temp, path) = setup_temp_file();
    let block_size = config.block_size as usize;
    let payloads: Vec<Vec<u8>> = interesting_lengths(block_size)
        .into_iter()
        .enumerate()
        .map(|(i, len)| random_bytes(i as u64 * 31 + block_size as u64, len))
        .collect();

    let ids = write_streams(&path, config, &payloads);

    for reader_config in [direct(), mapped()] {
        for (id, payload) in ids.iter().zip(&payloads) {
            let data = read_stream(&path, reader_config.clone(), *id);
            assert_eq!(data.len(), payload.len(), "stream {} length", id);
            assert!(data == *payload, "stream {} content differs", id);
        }
    }
}

// =============================================================================
// Length Grid
// =============================================================================

#[test]
fn test_round_trip_small_blocks_big_endian() {
    assert_round_trip(
        WriterConfig::builder()
            .block_size(8)
            .byte_order(ByteOrder::Big)
            .build(),
    );
}

#[test]
fn test_round_trip_small_blocks_little_endian() {
    assert_round_trip(
        WriterConfig::builder()
            .block_size(12)
            .byte_order(ByteOrder::Little)
            .build(),
    );
}

#[test]
fn test_round_trip_medium_blocks() {
    for byte_order in [ByteOrder::Big, ByteOrder::Little] {
        assert_round_trip(
            WriterConfig::builder()
                .block_size(64)
                .byte_order(byte_order)
                .build(),
        );
    }
}

#[test]
fn test_round_trip_auto_flush() {
    assert_round_trip(
        WriterConfig::builder()
            .block_size(32)
            .auto_flush(true)
            .build(),
    );
}

#[test]
fn test_round_trip_tiny_write_buffer() {
    assert_round_trip(
        WriterConfig::builder()
            .block_size(16)
            .max_buffered_blocks(1)
            .build(),
    );
}

#[test]
fn test_round_trip_default_block_size() {
    let (_temp, path) = setup_temp_file();
    let payloads = vec![
        random_bytes(1, 0),
        random_bytes(2, 4095),
        random_bytes(3, 4096),
        random_bytes(4, 3 * 1024 * 1024 + 17),
    ];
    let ids = write_streams(&path, WriterConfig::default(), &payloads);

    for (id, payload) in ids.iter().zip(&payloads) {
        assert!(read_stream(&path, mapped(), *id) == *payload);
    }
}

// =============================================================================
// Write Granularity
// =============================================================================

#[test]
fn test_byte_at_a_time_matches_bulk_write() {
    let (_temp, bulk_path) = setup_temp_file();
    let (_temp2, bytes_path) = setup_temp_file();
    let payload = random_bytes(9, 5000);

    let bulk_id = write_single(&bulk_path, 16, ByteOrder::Little, &payload);

    let writer = MultiplexedFileWriter::create(
        &bytes_path,
        WriterConfig::builder()
            .block_size(16)
            .byte_order(ByteOrder::Little)
            .build(),
    )
    .unwrap();
    let stream = writer.new_stream().unwrap();
    for &byte in &payload {
        stream.write_byte(byte).unwrap();
    }
    assert_eq!(stream.id(), bulk_id);
    assert_eq!(stream.length(), payload.len() as u64);
    writer.close().unwrap();

    assert_eq!(
        std::fs::read(&bulk_path).unwrap(),
        std::fs::read(&bytes_path).unwrap()
    );
}

#[test]
fn test_io_write_and_read_traits() {
    let (_temp, path) = setup_temp_file();
    let payload = random_bytes(11, 2000);

    let writer = MultiplexedFileWriter::create(&path, writer_config(24)).unwrap();
    let mut stream = writer.new_stream().unwrap();
    for chunk in payload.chunks(333) {
        stream.write_all(chunk).unwrap();
    }
    stream.flush().unwrap();
    let id = stream.id();
    writer.close().unwrap();

    let reader = MultiplexedFileReader::open_with(&path, direct()).unwrap();
    let mut stream = reader.input_stream(id).unwrap().unwrap();
    let mut data = Vec::new();
    stream.read_to_end(&mut data).unwrap();
    assert_eq!(data, payload);
}

#[test]
fn test_read_byte_by_byte() {
    let (_temp, path) = setup_temp_file();
    let payload = random_bytes(12, 300);
    let id = write_single(&path, 8, ByteOrder::Big, &payload);

    let reader = MultiplexedFileReader::open_with(&path, mapped()).unwrap();
    let mut stream = reader.input_stream(id).unwrap().unwrap();
    let mut data = Vec::new();
    while let Some(byte) = stream.read_byte().unwrap() {
        data.push(byte);
    }
    assert_eq!(data, payload);
    assert!(stream.is_eof().unwrap());
    assert_eq!(stream.available(), 0);
}

#[test]
fn test_empty_stream_reads_nothing() {
    let (_temp, path) = setup_temp_file();
    let id = write_single(&path, 64, ByteOrder::Big, &[]);

    let reader = MultiplexedFileReader::open_with(&path, direct()).unwrap();
    let mut stream = reader.input_stream(id).unwrap().unwrap();
    assert_eq!(stream.data_length(), 0);
    assert_eq!(stream.depth(), 0);
    assert!(stream.is_eof().unwrap());
    assert_eq!(stream.read_byte().unwrap(), None);

    let mut buf = [0u8; 8];
    assert_eq!(stream.read_into(&mut buf).unwrap(), 0);
}
