//! Multiplexed File Writer
//!
//! Creates a file and multiplexes any number of streams into it.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::block::{BlockAllocator, BlockSource, DirectBlockFile, OverlayBlockSource};
use crate::config::WriterConfig;
use crate::error::{MuxError, Result};
use crate::format::{ByteOrder, Directory, DirectoryEntry, Header, DIRECTORY_STREAM_ID, HEADER_SIZE};
use crate::tree::{StreamReader, TreeWriter};

use super::FileSummary;

/// Streams of one writer, in creation order
#[derive(Default)]
struct StreamTable {
    streams: Vec<Arc<Mutex<TreeWriter>>>,
    ids: HashSet<i32>,
    next_id: i32,
}

/// Writer for a new multiplexed file
///
/// ## Concurrency:
/// - `allocator`: atomic counter shared by every stream writer
/// - `storage`: internal mutex around the file handle
/// - each stream sits behind its own mutex, so different streams can be
///   written from different threads
pub struct MultiplexedFileWriter {
    path: PathBuf,
    config: WriterConfig,
    storage: Arc<DirectBlockFile>,
    allocator: Arc<BlockAllocator>,
    table: Mutex<StreamTable>,
    closed: bool,
}

impl MultiplexedFileWriter {
    /// Create (or truncate) `path` with the given settings
    ///
    /// A placeholder header is written right away; the real one follows the
    /// directory on close.
    pub fn create(path: impl AsRef<Path>, config: WriterConfig) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref().to_path_buf();
        let file: File = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        let storage = Arc::new(DirectBlockFile::create(
            file,
            config.block_size as usize,
            config.byte_order,
            config.auto_flush,
            config.max_buffered_blocks,
        ));
        storage.write_header(&Header::placeholder(config.block_size, config.byte_order).encode()?)?;

        tracing::debug!(
            path = %path.display(),
            block_size = config.block_size,
            byte_order = ?config.byte_order,
            auto_flush = config.auto_flush,
            "created multiplexed file"
        );

        Ok(Self {
            path,
            config,
            storage,
            allocator: Arc::new(BlockAllocator::new()),
            table: Mutex::new(StreamTable::default()),
            closed: false,
        })
    }

    /// Create with default settings
    pub fn create_default(path: impl AsRef<Path>) -> Result<Self> {
        Self::create(path, WriterConfig::default())
    }

    /// Open a new stream with the next free id
    pub fn new_stream(&self) -> Result<StreamWriter> {
        let mut table = self.table.lock();
        let mut id = table.next_id;
        while table.ids.contains(&id) || id == DIRECTORY_STREAM_ID {
            id = id.checked_add(1).ok_or(MuxError::DuplicateStream(id))?;
        }
        table.next_id = id.wrapping_add(1);
        Ok(self.register(&mut table, id))
    }

    /// Open a new stream with a caller-chosen id
    ///
    /// The directory's reserved id and ids already in use are rejected.
    pub fn new_stream_with_id(&self, id: i32) -> Result<StreamWriter> {
        let mut table = self.table.lock();
        if id == DIRECTORY_STREAM_ID || table.ids.contains(&id) {
            return Err(MuxError::DuplicateStream(id));
        }
        Ok(self.register(&mut table, id))
    }

    /// Number of streams opened so far
    pub fn stream_count(&self) -> usize {
        self.table.lock().streams.len()
    }

    /// Blocks allocated so far
    pub fn allocated_blocks(&self) -> u64 {
        self.allocator.allocated()
    }

    pub fn block_size(&self) -> u32 {
        self.config.block_size
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.config.byte_order
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seal all streams, write the directory and then the header
    pub fn close(mut self) -> Result<FileSummary> {
        self.finish()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn register(&self, table: &mut StreamTable, id: i32) -> StreamWriter {
        let tree = Arc::new(Mutex::new(TreeWriter::new(
            id,
            self.storage.clone(),
            self.allocator.clone(),
            self.config.block_size as usize,
            self.config.byte_order,
        )));
        table.ids.insert(id);
        table.streams.push(tree.clone());
        tracing::trace!(stream = id, "opened stream");
        StreamWriter {
            id,
            inner: tree,
            storage: self.storage.clone(),
        }
    }

    fn finish(&mut self) -> Result<FileSummary> {
        self.closed = true;

        // Step 1: Seal every stream (no-op for streams closed early)
        let streams = std::mem::take(&mut self.table.lock().streams);
        let mut entries: Vec<DirectoryEntry> = Vec::with_capacity(streams.len());
        for stream in &streams {
            entries.push(stream.lock().seal()?);
        }

        // Step 2: Write the directory as one more stream
        let mut directory = TreeWriter::new(
            DIRECTORY_STREAM_ID,
            self.storage.clone(),
            self.allocator.clone(),
            self.config.block_size as usize,
            self.config.byte_order,
        );
        directory.append(&Directory::encode(&entries)?)?;
        let directory_entry = directory.seal()?;

        // Step 3: All blocks must be on disk before the header points at them
        self.storage.flush()?;

        // Step 4: Header goes last
        let header = Header {
            block_size: self.config.block_size,
            byte_order: self.config.byte_order,
            directory_root: directory_entry.root,
            directory_length: directory_entry.length,
        };
        self.storage.write_header(&header.encode()?)?;
        self.storage.sync()?;

        let block_count = self.allocator.allocated();
        let file_size = self.storage.file_len()?;
        let expected = HEADER_SIZE + block_count * self.config.block_size as u64;
        if file_size != expected {
            return Err(MuxError::Corruption(format!(
                "file size {} does not match {} blocks of {} bytes",
                file_size, block_count, self.config.block_size
            )));
        }

        tracing::debug!(
            path = %self.path.display(),
            streams = entries.len(),
            blocks = block_count,
            file_size,
            "closed multiplexed file"
        );

        Ok(FileSummary {
            stream_count: entries.len(),
            block_count,
            directory_root: directory_entry.root,
            directory_length: directory_entry.length,
            file_size,
        })
    }
}

impl Drop for MultiplexedFileWriter {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        tracing::warn!(path = %self.path.display(), "writer dropped without close, finishing file");
        if let Err(e) = self.finish() {
            tracing::error!(path = %self.path.display(), error = %e, "failed to finish file");
        }
    }
}

/// Handle for appending to one stream
///
/// Writes go straight into the stream's tree; the handle can be closed
/// early, otherwise the stream is sealed when the file writer closes.
pub struct StreamWriter {
    id: i32,
    inner: Arc<Mutex<TreeWriter>>,
    storage: Arc<DirectBlockFile>,
}

impl StreamWriter {
    /// Stream id, the key for reading it back
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Bytes written so far
    pub fn length(&self) -> u64 {
        self.inner.lock().length()
    }

    /// Append bytes
    pub fn write_bytes(&self, buf: &[u8]) -> Result<()> {
        self.inner.lock().append(buf)
    }

    /// Append a single byte
    pub fn write_byte(&self, byte: u8) -> Result<()> {
        self.inner.lock().append(&[byte])
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_sealed()
    }

    /// Read back what has been written so far, starting at `start`
    ///
    /// Blocks already handed to the file are read from it (including ones
    /// still waiting in the write-behind buffer); the partial tail is
    /// snapshotted from memory. The reader sees the stream as it is now and
    /// ignores later writes.
    pub fn reader(&self, start: u64) -> Result<StreamReader> {
        let mut reader = {
            let tree = self.inner.lock();
            match tree.entry() {
                Some(entry) => {
                    StreamReader::open(self.id, self.storage.clone(), entry.root, entry.length)?
                }
                None => {
                    let snapshot = tree.snapshot()?;
                    let base: Arc<dyn BlockSource> = self.storage.clone();
                    let source = Arc::new(OverlayBlockSource::new(base, snapshot.blocks));
                    StreamReader::open(self.id, source, snapshot.root, snapshot.length)?
                }
            }
        };
        reader.seek_to(start)?;
        Ok(reader)
    }

    /// Seal the stream now; later writes fail with `StreamClosed`
    pub fn close(self) -> Result<DirectoryEntry> {
        self.inner.lock().seal()
    }
}

impl Write for StreamWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for StreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWriter").field("id", &self.id).finish()
    }
}
