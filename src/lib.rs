//! # muxfile
//!
//! A single-file, multi-stream storage engine:
//! - Any number of write-once byte streams multiplexed into one file
//! - Fixed-size blocks with a per-stream indirection tree
//! - Random access (seek) into any stream without loading the file
//! - Direct file I/O or memory-mapped reads
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────┐    ┌──────────────────────────────┐
//! │   MultiplexedFileWriter      │    │   MultiplexedFileReader      │
//! │ (allocator, stream table)    │    │ (header, directory)          │
//! └──────────────┬───────────────┘    └──────────────┬───────────────┘
//!                │                                   │
//!                ▼                                   ▼
//!        ┌──────────────┐                    ┌──────────────┐
//!        │  TreeWriter  │ (one per stream)   │ StreamReader │ (one per open)
//!        └──────┬───────┘                    └──────┬───────┘
//!               │                                   │
//!               ▼                                   ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Block storage                              │
//! │      DirectBlockFile (mutex, write-behind)  │  MappedBlockFile      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Read;
//! use muxfile::{MultiplexedFileReader, MultiplexedFileWriter, WriterConfig};
//!
//! # fn main() -> muxfile::Result<()> {
//! let writer = MultiplexedFileWriter::create("data.mux", WriterConfig::default())?;
//! let log = writer.new_stream()?;
//! log.write_bytes(b"hello")?;
//! let id = log.id();
//! writer.close()?;
//!
//! let reader = MultiplexedFileReader::open("data.mux")?;
//! let mut stream = reader.input_stream(id)?.expect("stream exists");
//! let mut text = String::new();
//! stream.read_to_string(&mut text)?;
//! assert_eq!(text, "hello");
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod format;
pub mod block;
pub mod tree;
pub mod file;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{MuxError, Result};
pub use config::{ReaderConfig, WriterConfig};
pub use format::ByteOrder;
pub use file::{FileSummary, MultiplexedFileReader, MultiplexedFileWriter, StreamWriter};
pub use tree::StreamReader;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of muxfile
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
