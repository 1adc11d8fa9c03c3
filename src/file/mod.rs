//! File Module
//!
//! Coordinators for a whole multiplexed file.
//!
//! ## Responsibilities
//! - [`MultiplexedFileWriter`]: own the block allocator and the write-side
//!   block store, hand out stream writers, and on close write the
//!   directory stream followed by the header
//! - [`MultiplexedFileReader`]: validate the header, bootstrap the directory
//!   stream from the header fields, and hand out stream readers by id
//!
//! ## Lifecycle
//! ```text
//! create ──► new_stream()* ──► write ... ──► close
//!                                             │ seal every stream
//!                                             │ write directory stream
//!                                             │ flush blocks
//!                                             └ write header, fsync
//!
//! open ──► header ──► directory stream ──► input_stream(id)*
//! ```

mod reader;
mod writer;

pub use reader::MultiplexedFileReader;
pub use writer::{MultiplexedFileWriter, StreamWriter};

/// Outcome of closing a writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSummary {
    /// Streams recorded in the directory
    pub stream_count: usize,
    /// Blocks in the file, directory blocks included
    pub block_count: u64,
    /// Root block of the directory stream
    pub directory_root: u32,
    /// Byte length of the directory stream
    pub directory_length: u64,
    /// Final file size in bytes
    pub file_size: u64,
}
