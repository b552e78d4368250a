//! File Storage Registry
//!
//! The top-level engine that coordinates all components.
//!
//! ## Responsibilities
//! - Rebuild the file index from the metadata log on startup
//! - Split incoming streams into chunks across the data files
//! - Log file metadata before a file becomes visible
//! - Serve chunks through the partition cache

use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{FseError, Result};
use crate::esf::EntryWriter;
use crate::index::FileIndex;
use crate::metadata::{self, File, FileInfo};
use crate::protocol::Command;
use crate::reader::{ChunkSource, FileDataReader};
use crate::storage::{
    DataFileManager, FileChunk, PartitionCache, PartitionId, Partitions, MAX_PARTITION_NUM,
};

/// The file storage registry
///
/// ## Concurrency Model
///
/// - **Ingest** (save_file_data): chunk writes are serialized per data file
///   inside `DataFileManager`; independent uploads proceed in parallel.
/// - **Registration** (register_file): serialized by the `metadata_log`
///   mutex, which spans duplicate check → log append → index insert. A file
///   is never visible before its metadata is on disk.
/// - **Reads** (lookup/get_chunk): index RwLock read + lock-free positional
///   chunk reads; the cache has its own mutex.
pub struct FileStorage {
    /// Engine configuration
    config: Config,

    /// Sequential data files
    data_files: DataFileManager,

    /// Metadata log writer; its mutex is the registration lock
    metadata_log: Mutex<EntryWriter>,

    /// Name → file
    index: FileIndex,

    /// Recently read chunk payloads
    cache: PartitionCache,
}

impl FileStorage {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const METADATA_FILENAME: &'static str = "metadata.esf";
    const DATAFILE_DIR: &'static str = "datafiles";

    /// Open or create a registry with the given config
    ///
    /// On startup:
    /// 1. Create the storage directory if needed
    /// 2. Open every data file under `datafiles/`
    /// 3. Replay complete entry groups from `metadata.esf`
    /// 4. Cut any torn tail off the log and open it for appends
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Create storage directory if it doesn't exist
        fs::create_dir_all(&config.storage_path)?;

        // Step 2: Open data files
        let data_files = DataFileManager::open(
            &config.storage_path.join(Self::DATAFILE_DIR),
            config.max_chunk_data_size,
            config.max_chunks_per_file,
        )?;

        // Step 3: Replay metadata
        let metadata_path = config.storage_path.join(Self::METADATA_FILENAME);
        let replayed = metadata::replay(&metadata_path)?;
        if replayed.dropped_tail {
            tracing::warn!(
                "Metadata log ends with an incomplete record, replay stopped at byte {}",
                replayed.valid_len
            );
        }

        let index = FileIndex::new();
        for file in replayed.files {
            if let Some(missing) = file
                .partitions()
                .iter()
                .find(|id| data_files.get(id.file_id()).is_none())
            {
                tracing::warn!(
                    "File {} references partition {} in a missing data file",
                    file.name(),
                    missing
                );
            }
            if let Err(e) = index.insert(file) {
                tracing::warn!("Skipping replayed record: {}", e);
            }
        }

        // Step 4: Open the log for appends after the last complete group
        let metadata_log = EntryWriter::open(
            &metadata_path,
            replayed.valid_len,
            config.metadata_sync_strategy,
        )?;

        tracing::info!(
            "File storage opened at {}: {} files, {} data files",
            config.storage_path.display(),
            index.len(),
            data_files.file_count()
        );

        let cache = PartitionCache::new(config.cache_capacity);

        Ok(Self {
            config,
            data_files,
            metadata_log: Mutex::new(metadata_log),
            index,
            cache,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified storage directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().storage_path(path).build();
        Self::open(config)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Find a file by name
    pub fn lookup(&self, name: &str) -> Option<Arc<File>> {
        self.index.get(name)
    }

    /// All files ordered by name
    pub fn list(&self) -> Vec<Arc<File>> {
        self.index.list()
    }

    /// Open a byte stream over a file's content
    pub fn open_stream(&self, file: &File) -> FileDataReader<'_, Self> {
        FileDataReader::new(self, file.partitions().to_vec())
    }

    // =========================================================================
    // Ingest
    // =========================================================================

    /// Store a whole stream and register it under `name`
    ///
    /// Steps:
    /// 1. Validate the name and reject known duplicates early
    /// 2. Write the stream into chunks
    /// 3. Log the metadata group and index the file
    pub fn save_file<R: Read>(&self, name: &str, content_type: &str, input: R) -> Result<Arc<File>> {
        metadata::validate_file_name(name)?;
        metadata::validate_content_type(content_type)?;
        if self.index.contains(name) {
            return Err(FseError::DuplicateFileName(name.to_string()));
        }

        let (partitions, size) = self.write_stream(input)?;
        let file = File::new(name, content_type, size, partitions)?;
        let file = self.register_file(file)?;

        tracing::info!(
            "Saved file {} ({} bytes, {} partitions)",
            file.name(),
            file.size(),
            file.partitions().len()
        );
        Ok(file)
    }

    /// Write a stream into chunks and return their partition ids in order
    ///
    /// The chunks are on stable storage when this returns, but belong to no
    /// file until a `File` built from them is passed to `register_file`.
    pub fn save_file_data<R: Read>(&self, input: R) -> Result<Partitions> {
        self.write_stream(input).map(|(partitions, _)| partitions)
    }

    /// Log a file's metadata and make it visible
    pub fn register_file(&self, file: File) -> Result<Arc<File>> {
        let mut log = self.metadata_log.lock();
        if self.index.contains(file.name()) {
            return Err(FseError::DuplicateFileName(file.name().to_string()));
        }

        log.append_group(&file.to_entries())?;
        self.index.insert(file)
    }

    // =========================================================================
    // Chunk Access
    // =========================================================================

    /// Load a chunk: cache first, then its data file
    pub fn get_chunk(&self, id: PartitionId) -> Result<FileChunk> {
        if let Some(content) = self.cache.get(id) {
            return Ok(FileChunk::new(id, content));
        }

        let data_file = self
            .data_files
            .get(id.file_id())
            .ok_or(FseError::InvalidPartitionId(id))?;
        let content = data_file.read_chunk(id.chunk_id())?;
        self.cache.put(id, content.clone());

        Ok(FileChunk::new(id, content))
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Execute a non-streaming command
    ///
    /// PUT and GET carry file content on the connection and are handled by
    /// the network layer directly.
    pub fn execute(&self, command: Command) -> Result<Option<Vec<u8>>> {
        match command {
            Command::Stat { name } => {
                let file = self
                    .lookup(&name)
                    .ok_or(FseError::FileNotFound(name))?;
                Ok(Some(bincode::serialize(&FileInfo::from(file.as_ref()))?))
            }
            Command::List => {
                let infos: Vec<FileInfo> =
                    self.list().iter().map(|f| FileInfo::from(f.as_ref())).collect();
                Ok(Some(bincode::serialize(&infos)?))
            }
            Command::Ping => Ok(Some(b"PONG".to_vec())),
            Command::Put { .. } | Command::Get { .. } => Err(FseError::InvalidOperation(
                "streaming command must be handled by the connection".to_string(),
            )),
        }
    }

    /// Close the registry gracefully
    ///
    /// Syncs the metadata log so acknowledged files survive a restart
    pub fn close(self) -> Result<()> {
        let mut log = self.metadata_log.into_inner();
        log.sync()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the storage directory path
    pub fn storage_path(&self) -> &Path {
        &self.config.storage_path
    }

    /// Get the metadata log path
    pub fn metadata_path(&self) -> PathBuf {
        self.config.storage_path.join(Self::METADATA_FILENAME)
    }

    /// Get the number of stored files
    pub fn file_count(&self) -> usize {
        self.index.len()
    }

    /// Get the number of data files
    pub fn data_file_count(&self) -> usize {
        self.data_files.file_count()
    }

    /// Get the partition cache
    pub fn cache(&self) -> &PartitionCache {
        &self.cache
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Split `input` into chunk-sized writes; returns partitions and byte count
    fn write_stream<R: Read>(&self, mut input: R) -> Result<(Partitions, u32)> {
        let chunk_size = self.config.max_chunk_data_size as usize;
        let mut buf = vec![0u8; chunk_size];
        let mut partitions = Vec::new();
        let mut touched = BTreeSet::new();
        let mut total: u64 = 0;

        loop {
            let n = read_full(&mut input, &mut buf)?;
            if n == 0 {
                break;
            }
            if partitions.len() >= MAX_PARTITION_NUM {
                return Err(FseError::PartitionNumLimit {
                    limit: MAX_PARTITION_NUM,
                });
            }
            total += n as u64;
            if total > u32::MAX as u64 {
                return Err(FseError::InvalidOperation(format!(
                    "file exceeds {} bytes",
                    u32::MAX
                )));
            }

            let id = self.data_files.write_chunk(&buf[..n])?;
            touched.insert(id.file_id());
            partitions.push(id);

            if n < chunk_size {
                break;
            }
        }

        // Chunks must be durable before any metadata references them
        self.data_files.sync_files(&touched)?;

        Ok((partitions, total as u32))
    }
}

impl ChunkSource for FileStorage {
    fn get_chunk(&self, id: PartitionId) -> Result<FileChunk> {
        FileStorage::get_chunk(self, id)
    }
}

/// Fill `buf` until it is full or the input ends; returns bytes read
fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
