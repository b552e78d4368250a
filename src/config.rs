//! Configuration for FSE
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{FseError, Result};

/// Largest payload a single chunk may be configured to hold (16 MiB)
pub const MAX_CHUNK_DATA_SIZE_LIMIT: u32 = 16 * 1024 * 1024;

/// Chunk ids are the low 16 bits of a partition id
pub const MAX_CHUNKS_PER_FILE_LIMIT: u32 = 1 << 16;

/// Main configuration for an FSE instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {storage_path}/
    ///     ├── metadata.esf     (file metadata log)
    ///     └── datafiles/       (sequential files, named by id)
    pub storage_path: PathBuf,

    /// Maximum payload bytes per chunk.
    ///
    /// Part of the on-disk format: changing it for an existing storage
    /// directory makes its data files unreadable.
    pub max_chunk_data_size: u32,

    /// Maximum number of chunks per sequential file (at most 65536).
    ///
    /// Part of the on-disk format, like `max_chunk_data_size`.
    pub max_chunks_per_file: u32,

    /// Number of chunk payloads kept in the partition cache (0 disables it)
    pub cache_capacity: usize,

    // -------------------------------------------------------------------------
    // Metadata Log Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the metadata log
    pub metadata_sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// Metadata log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every file record (a saved file is durable once acknowledged)
    EveryGroup,

    /// fsync after N file records.
    ///
    /// Up to N - 1 acknowledged files can be lost on power failure. Replay
    /// never applies a partial record.
    EveryNGroups { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./.fse"),
            max_chunk_data_size: 64 * 1024, // 64 KB
            max_chunks_per_file: 16 * 1024, // 1 GB per data file
            cache_capacity: 1024,
            metadata_sync_strategy: SyncStrategy::EveryGroup,
            listen_addr: "127.0.0.1:9330".to_string(),
            max_connections: 1024,
            read_timeout_ms: 30_000,
            write_timeout_ms: 30_000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the storage geometry is addressable by a partition id
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_data_size == 0 || self.max_chunk_data_size > MAX_CHUNK_DATA_SIZE_LIMIT {
            return Err(FseError::Config(format!(
                "max_chunk_data_size must be in 1..={}, got {}",
                MAX_CHUNK_DATA_SIZE_LIMIT, self.max_chunk_data_size
            )));
        }
        if self.max_chunks_per_file == 0 || self.max_chunks_per_file > MAX_CHUNKS_PER_FILE_LIMIT {
            return Err(FseError::Config(format!(
                "max_chunks_per_file must be in 1..={}, got {}",
                MAX_CHUNKS_PER_FILE_LIMIT, self.max_chunks_per_file
            )));
        }
        if let SyncStrategy::EveryNGroups { count: 0 } = self.metadata_sync_strategy {
            return Err(FseError::Config(
                "metadata sync interval must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the storage directory (root for all data)
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_path = path.into();
        self
    }

    /// Set the maximum payload size of one chunk (in bytes)
    pub fn max_chunk_data_size(mut self, size: u32) -> Self {
        self.config.max_chunk_data_size = size;
        self
    }

    /// Set the maximum number of chunks per sequential file
    pub fn max_chunks_per_file(mut self, count: u32) -> Self {
        self.config.max_chunks_per_file = count;
        self
    }

    /// Set the partition cache capacity (in chunks)
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Set the metadata log sync strategy
    pub fn metadata_sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.metadata_sync_strategy = strategy;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
