//! Partition addressing
//!
//! A partition id is a 32-bit address of one chunk:
//!
//! ```text
//! ┌──────────────────────┬──────────────────────┐
//! │ file id (high 16)    │ chunk id (low 16)    │
//! └──────────────────────┴──────────────────────┘
//! ```
//!
//! The split is part of the on-disk format; metadata logs store raw ids.

use std::fmt;

use bytes::Bytes;

/// Upper bound on partitions per file, so the count fits a u16 field
pub const MAX_PARTITION_NUM: usize = 0xffff - 1;

/// Composite address of a chunk: sequential file id + chunk id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(u32);

/// Ordered partitions making up a file's content
pub type Partitions = Vec<PartitionId>;

impl PartitionId {
    pub fn new(file_id: u16, chunk_id: u16) -> Self {
        Self(((file_id as u32) << 16) | chunk_id as u32)
    }

    /// Id of the sequential file holding the chunk
    pub fn file_id(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Id of the chunk within its sequential file
    pub fn chunk_id(self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for PartitionId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<PartitionId> for u32 {
    fn from(id: PartitionId) -> Self {
        id.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_id(), self.chunk_id())
    }
}

/// A chunk payload loaded through its partition id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    pub id: PartitionId,
    pub content: Bytes,
}

impl FileChunk {
    pub fn new(id: PartitionId, content: Bytes) -> Self {
        Self { id, content }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
