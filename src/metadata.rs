//! File metadata
//!
//! The `File` record and its persistence as an entry group in the metadata
//! log.
//!
//! ## Entry Group
//! ```text
//! ┌──────────┬───────────┬──────────────┬──────────────┬─────────────┬────────────────┐
//! │ name     │ size u32  │ content type │ created i64  │ count u16   │ count × id u32 │
//! └──────────┴───────────┴──────────────┴──────────────┴─────────────┴────────────────┘
//! ```
//! Each cell is one log entry. Groups are replayed in the order they were
//! appended; a group cut short by a crash is dropped together with anything
//! after it.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{FseError, Result};
use crate::esf::EntryReader;
use crate::storage::{PartitionId, Partitions, MAX_PARTITION_NUM};

/// Maximum encoded length of a file name
pub const MAX_FILE_NAME_LEN: usize = 128;

/// Maximum encoded length of a content type
pub const MAX_CONTENT_TYPE_LEN: usize = 32;

/// Entries in a group before the partition ids
pub const GROUP_HEADER_ENTRIES: usize = 5;

/// A stored file: its name, attributes and the partitions holding its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    name: String,
    size: u32,
    content_type: String,
    /// Unix epoch milliseconds
    created_at: i64,
    partitions: Partitions,
}

impl File {
    /// Create a file record stamped with the current time
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        size: u32,
        partitions: Partitions,
    ) -> Result<Self> {
        Self::from_parts(name, size, content_type, now_millis(), partitions)
    }

    /// Create a file record from all of its fields
    pub fn from_parts(
        name: impl Into<String>,
        size: u32,
        content_type: impl Into<String>,
        created_at: i64,
        partitions: Partitions,
    ) -> Result<Self> {
        let file = Self {
            name: name.into(),
            size,
            content_type: content_type.into(),
            created_at,
            partitions,
        };
        validate_file_name(&file.name)?;
        validate_content_type(&file.content_type)?;
        if file.partitions.len() > MAX_PARTITION_NUM {
            return Err(FseError::PartitionNumLimit {
                limit: MAX_PARTITION_NUM,
            });
        }
        Ok(file)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn partitions(&self) -> &[PartitionId] {
        &self.partitions
    }

    /// Encode this file as its metadata entry group
    pub fn to_entries(&self) -> Vec<Vec<u8>> {
        let mut entries = Vec::with_capacity(GROUP_HEADER_ENTRIES + self.partitions.len());
        entries.push(self.name.as_bytes().to_vec());

        let mut size = vec![0u8; 4];
        codec::encode_u32(self.size, &mut size, 0);
        entries.push(size);

        entries.push(self.content_type.as_bytes().to_vec());

        let mut created_at = vec![0u8; 8];
        codec::encode_i64(self.created_at, &mut created_at, 0);
        entries.push(created_at);

        let mut count = vec![0u8; 2];
        codec::encode_u16(self.partitions.len() as u16, &mut count, 0);
        entries.push(count);

        for id in &self.partitions {
            let mut raw = vec![0u8; 4];
            codec::encode_u32(id.as_u32(), &mut raw, 0);
            entries.push(raw);
        }
        entries
    }
}

/// Check a name fits the metadata format
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FseError::InvalidOperation("file name is empty".to_string()));
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(FseError::InvalidOperation(format!(
            "file name is {} bytes (max {})",
            name.len(),
            MAX_FILE_NAME_LEN
        )));
    }
    Ok(())
}

/// Check a content type fits the metadata format
pub fn validate_content_type(content_type: &str) -> Result<()> {
    if content_type.len() > MAX_CONTENT_TYPE_LEN {
        return Err(FseError::InvalidOperation(format!(
            "content type is {} bytes (max {})",
            content_type.len(),
            MAX_CONTENT_TYPE_LEN
        )));
    }
    Ok(())
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// =============================================================================
// Client-facing summary
// =============================================================================

/// File attributes without the partition list, as sent to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u32,
    pub content_type: String,
    pub created_at: i64,
    pub partition_count: u16,
}

impl From<&File> for FileInfo {
    fn from(file: &File) -> Self {
        Self {
            name: file.name.clone(),
            size: file.size,
            content_type: file.content_type.clone(),
            created_at: file.created_at,
            partition_count: file.partitions.len() as u16,
        }
    }
}

// =============================================================================
// Replay
// =============================================================================

/// Outcome of replaying a metadata log
#[derive(Debug, Default)]
pub struct ReplayResult {
    /// Files in log order
    pub files: Vec<File>,

    /// Byte length of the log up to the end of the last complete group
    pub valid_len: u64,

    /// Whether bytes after the last complete group were ignored
    pub dropped_tail: bool,
}

/// Replay every complete entry group in the metadata log
///
/// A missing log is an empty registry. Replay stops at the first group that
/// is cut short; that is not an error.
pub fn replay(path: &Path) -> Result<ReplayResult> {
    if !path.exists() {
        return Ok(ReplayResult::default());
    }

    let file_len = std::fs::metadata(path)?.len();
    let mut reader = EntryReader::open(path)?;
    let mut result = ReplayResult::default();

    while let Some(file) = read_group(&mut reader)? {
        result.files.push(file);
        result.valid_len = reader.position();
    }

    result.dropped_tail = file_len > result.valid_len;
    Ok(result)
}

/// Read one entry group; `None` when the log ends before the group completes
fn read_group(reader: &mut EntryReader) -> Result<Option<File>> {
    let Some(name) = reader.read_entry()? else {
        return Ok(None);
    };
    let Some(size) = reader.read_entry()? else {
        return Ok(None);
    };
    let Some(content_type) = reader.read_entry()? else {
        return Ok(None);
    };
    let Some(created_at) = reader.read_entry()? else {
        return Ok(None);
    };
    let Some(count) = reader.read_entry()? else {
        return Ok(None);
    };

    let name = decode_string(name, "file name")?;
    expect_width(&size, 4, "file size")?;
    let content_type = decode_string(content_type, "content type")?;
    expect_width(&created_at, 8, "created at")?;
    expect_width(&count, 2, "partition count")?;

    let count = codec::decode_u16(&count, 0) as usize;
    let mut partitions = Vec::with_capacity(count);
    for _ in 0..count {
        let Some(raw) = reader.read_entry()? else {
            return Ok(None);
        };
        expect_width(&raw, 4, "partition id")?;
        partitions.push(PartitionId::from(codec::decode_u32(&raw, 0)));
    }

    File::from_parts(
        name,
        codec::decode_u32(&size, 0),
        content_type,
        codec::decode_i64(&created_at, 0),
        partitions,
    )
    .map(Some)
    .map_err(|e| FseError::Corruption(format!("invalid file record: {}", e)))
}

fn expect_width(entry: &[u8], width: usize, field: &str) -> Result<()> {
    if entry.len() != width {
        return Err(FseError::Corruption(format!(
            "{} entry is {} bytes, expected {}",
            field,
            entry.len(),
            width
        )));
    }
    Ok(())
}

fn decode_string(entry: Vec<u8>, field: &str) -> Result<String> {
    String::from_utf8(entry)
        .map_err(|e| FseError::Corruption(format!("{} is not valid UTF-8: {}", field, e)))
}
