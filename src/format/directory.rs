//! Stream Directory
//!
//! Maps stream ids to the root block and byte length of each stream.

use std::collections::HashMap;

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{MuxError, Result};

use super::record_codec;

/// Encoded size of one directory record: id (4) + root (4) + length (8)
pub const DIRECTORY_ENTRY_SIZE: usize = 16;

/// Raw directory record, field order is the on-disk order
#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    id: i32,
    root: u32,
    length: i64,
}

/// Location of one sealed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Stream id
    pub id: i32,
    /// Root block of the stream's indirection tree
    pub root: u32,
    /// Stream length in bytes
    pub length: u64,
}

impl DirectoryEntry {
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        let length = i64::try_from(self.length).map_err(|_| {
            MuxError::Corruption(format!(
                "stream {} length {} does not fit a directory record",
                self.id, self.length
            ))
        })?;
        let record = EntryRecord {
            id: self.id,
            root: self.root,
            length,
        };
        record_codec().serialize_into(out, &record)?;
        Ok(())
    }
}

/// Decoded directory: stream id → entry
#[derive(Debug, Default, Clone)]
pub struct Directory {
    entries: HashMap<i32, DirectoryEntry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode entries in the given order
    pub fn encode<'a>(entries: impl IntoIterator<Item = &'a DirectoryEntry>) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for entry in entries {
            entry.encode_into(&mut out)?;
        }
        Ok(out)
    }

    /// Decode the raw directory stream
    ///
    /// The byte length must be a multiple of 16, lengths must be
    /// non-negative and ids must be unique.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % DIRECTORY_ENTRY_SIZE != 0 {
            return Err(MuxError::Corruption(format!(
                "directory length {} is not a multiple of {}",
                bytes.len(),
                DIRECTORY_ENTRY_SIZE
            )));
        }

        let mut directory = Self::new();
        for chunk in bytes.chunks_exact(DIRECTORY_ENTRY_SIZE) {
            let record: EntryRecord = record_codec().deserialize(chunk)?;
            if record.length < 0 {
                return Err(MuxError::Corruption(format!(
                    "stream {} has negative length {}",
                    record.id, record.length
                )));
            }
            let entry = DirectoryEntry {
                id: record.id,
                root: record.root,
                length: record.length as u64,
            };
            if directory.insert(entry).is_some() {
                return Err(MuxError::Corruption(format!(
                    "duplicate stream id {} in directory",
                    record.id
                )));
            }
        }
        Ok(directory)
    }

    /// Insert an entry, returning the previous one with the same id
    pub fn insert(&mut self, entry: DirectoryEntry) -> Option<DirectoryEntry> {
        self.entries.insert(entry.id, entry)
    }

    pub fn get(&self, id: i32) -> Option<&DirectoryEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: i32) -> bool {
        self.entries.contains_key(&id)
    }

    /// All stream ids, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
