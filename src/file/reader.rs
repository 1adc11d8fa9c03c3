//! Multiplexed File Reader
//!
//! Opens a finished file and serves its streams by id.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::block::{BlockSource, DirectBlockFile, MappedBlockFile};
use crate::config::ReaderConfig;
use crate::error::{MuxError, Result};
use crate::format::{
    ByteOrder, Directory, Header, DIRECTORY_ENTRY_SIZE, DIRECTORY_STREAM_ID, HEADER_SIZE,
    MAX_BLOCKS,
};
use crate::tree::StreamReader;

/// Reader for a finished multiplexed file
///
/// Immutable after open; stream readers created from it are independent and
/// can move to other threads.
pub struct MultiplexedFileReader {
    path: PathBuf,
    header: Header,
    source: Arc<dyn BlockSource>,
    directory: Directory,
    num_blocks: u64,
    uses_mmap: bool,
}

impl MultiplexedFileReader {
    /// Open with default settings (memory mapping on 64-bit targets)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ReaderConfig::default())
    }

    /// Open a file
    ///
    /// On open:
    /// 1. Validate the header and the block count
    /// 2. Set up the direct or mapped block source
    /// 3. Read the directory stream rooted at the header fields
    /// 4. Decode it into the id → entry map
    pub fn open_with(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;

        // Step 1: Header and block count
        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE {
            return Err(MuxError::Format(format!(
                "file too small: {} bytes",
                file_size
            )));
        }
        let mut raw = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut raw)?;
        let header = Header::decode(&raw)?;

        let block_size = header.block_size as u64;
        let region = file_size - HEADER_SIZE;
        let num_blocks = region / block_size;
        if region % block_size != 0 || num_blocks > MAX_BLOCKS {
            return Err(MuxError::Format(format!(
                "illegal number of blocks: {} bytes after the header with block size {}",
                region, block_size
            )));
        }

        // Step 2: Block source
        let source: Arc<dyn BlockSource> = if config.use_mmap {
            Arc::new(MappedBlockFile::map(
                &file,
                header.block_size as usize,
                header.byte_order,
                num_blocks,
            )?)
        } else {
            Arc::new(DirectBlockFile::open(
                file,
                header.block_size as usize,
                header.byte_order,
                num_blocks,
            ))
        };

        // Step 3: Directory stream, bootstrapped from the header
        if header.directory_length % DIRECTORY_ENTRY_SIZE as u64 != 0 {
            return Err(MuxError::Corruption(format!(
                "directory length {} is not a multiple of {}",
                header.directory_length, DIRECTORY_ENTRY_SIZE
            )));
        }
        if header.directory_length > region {
            return Err(MuxError::Corruption(format!(
                "directory length {} exceeds the {} byte block region",
                header.directory_length, region
            )));
        }
        let mut stream = StreamReader::open(
            DIRECTORY_STREAM_ID,
            source.clone(),
            header.directory_root,
            header.directory_length,
        )?;
        let mut raw = vec![0u8; header.directory_length as usize];
        let read = stream.read_into(&mut raw)?;
        if read != raw.len() {
            return Err(MuxError::Corruption(format!(
                "directory stream ended after {} of {} bytes",
                read,
                raw.len()
            )));
        }

        // Step 4: Decode
        let directory = Directory::decode(&raw)?;

        tracing::debug!(
            path = %path.display(),
            block_size = header.block_size,
            byte_order = ?header.byte_order,
            streams = directory.len(),
            blocks = num_blocks,
            mmap = config.use_mmap,
            "opened multiplexed file"
        );

        Ok(Self {
            path,
            header,
            source,
            directory,
            num_blocks,
            uses_mmap: config.use_mmap,
        })
    }

    /// All stream ids, ascending
    pub fn stream_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.directory.ids().collect();
        ids.sort_unstable();
        ids
    }

    pub fn has_stream_id(&self, id: i32) -> bool {
        self.directory.contains(id)
    }

    /// Open a reader for stream `id`, `None` if there is no such stream
    pub fn input_stream(&self, id: i32) -> Result<Option<StreamReader>> {
        match self.directory.get(id) {
            Some(entry) => Ok(Some(StreamReader::open(
                id,
                self.source.clone(),
                entry.root,
                entry.length,
            )?)),
            None => Ok(None),
        }
    }

    /// Length of stream `id` without opening it
    pub fn stream_length(&self, id: i32) -> Option<u64> {
        self.directory.get(id).map(|entry| entry.length)
    }

    pub fn stream_count(&self) -> usize {
        self.directory.len()
    }

    pub fn block_size(&self) -> u32 {
        self.header.block_size
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Blocks in the file, directory blocks included
    pub fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    pub fn uses_mmap(&self) -> bool {
        self.uses_mmap
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the file; open stream readers keep the block source alive
    pub fn close(self) {}
}

impl std::fmt::Debug for MultiplexedFileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplexedFileReader")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("streams", &self.directory.len())
            .field("uses_mmap", &self.uses_mmap)
            .finish()
    }
}
