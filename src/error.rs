//! Error types for FSE
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::storage::PartitionId;

/// Result type alias using FseError
pub type Result<T> = std::result::Result<T, FseError>;

/// Unified error type for FSE operations
#[derive(Debug, Error)]
pub enum FseError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("not enough space to write chunk data: {size} bytes (max {max})")]
    DataOutOfChunk { size: usize, max: u32 },

    #[error("not enough space to write data to file {file_id}")]
    DataOutOfFile { file_id: u16 },

    #[error("partition num limit exceeded (max {limit})")]
    PartitionNumLimit { limit: usize },

    #[error("entry is too large: {size} bytes (max {max})")]
    EntryTooLarge { size: usize, max: u32 },

    // -------------------------------------------------------------------------
    // Addressing Errors
    // -------------------------------------------------------------------------
    #[error("invalid partition id: {0}")]
    InvalidPartitionId(PartitionId),

    #[error("invalid chunk id {chunk_id} in data file {file_id}")]
    InvalidChunkId { file_id: u16, chunk_id: u16 },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    #[error("duplicate file name: {0}")]
    DuplicateFileName(String),

    #[error("invalid ret value: expected to copy {expected} bytes, copied {actual}")]
    InvalidRetValue { expected: usize, actual: usize },

    #[error("corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Stream Termination
    // -------------------------------------------------------------------------
    /// Not a failure: a file data reader has no partitions left.
    #[error("end of partition stream")]
    EndOfPartitionStream,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FseError {
    /// True for the normal end-of-stream signal of a file data reader
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, FseError::EndOfPartitionStream)
    }
}

impl From<bincode::Error> for FseError {
    fn from(e: bincode::Error) -> Self {
        FseError::Serialization(e.to_string())
    }
}
