//! Data File Manager
//!
//! Manages the set of sequential files and allocates chunks across them.
//!
//! ## Responsibilities
//! - Discover existing data files on startup
//! - Write chunks to the newest data file, allocating a new one when full
//! - Resolve partition ids back to data files for reads
//! - Sync data files before their chunks are referenced by metadata

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{FseError, Result};

use super::sequential_file::HEADER_SIZE;
use super::{PartitionId, SequentialFile};

/// Manages the data files under `datafiles/`
///
/// ## Concurrency:
/// - `files`: RwLock over an append-only array (slot i holds data file i)
/// - `alloc_lock`: serializes creation of new data files
/// - Chunk writes are serialized per data file by `SequentialFile` itself
/// - All methods use `&self`
pub struct DataFileManager {
    /// Directory holding the data files
    data_dir: PathBuf,

    /// Open data files, indexed by id
    files: RwLock<Vec<Arc<SequentialFile>>>,

    /// Held while a new data file is created
    alloc_lock: Mutex<()>,

    max_chunk_data_size: u32,
    max_chunks_per_file: u32,
}

impl DataFileManager {
    /// Open or create the data file directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Parse every file name as a u16 id (anything else is fatal)
    /// 3. Require ids to be contiguous from 0
    /// 4. Drop the newest file if a crash cut it off before its header
    /// 5. Open each data file (recovers its allocation cursor)
    pub fn open(path: &Path, max_chunk_data_size: u32, max_chunks_per_file: u32) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut ids = BTreeMap::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let name = entry.file_name();
            let id = Self::parse_data_file_id(&name.to_string_lossy()).ok_or_else(|| {
                FseError::Corruption(format!(
                    "unexpected entry in data file directory: {}",
                    entry.path().display()
                ))
            })?;
            if !entry.file_type()?.is_file() {
                return Err(FseError::Corruption(format!(
                    "data file {} is not a regular file",
                    entry.path().display()
                )));
            }
            if ids.insert(id, entry.path()).is_some() {
                return Err(FseError::Corruption(format!(
                    "data file id {} appears more than once",
                    id
                )));
            }
        }

        if let Some((&id, file_path)) = ids.last_key_value() {
            let len = fs::metadata(file_path)?.len();
            if len < HEADER_SIZE {
                tracing::warn!(
                    "Removing data file {} left without a header ({} bytes)",
                    id,
                    len
                );
                fs::remove_file(file_path)?;
                sync_dir(path)?;
                ids.remove(&id);
            }
        }

        let mut files = Vec::with_capacity(ids.len());
        for (expected, (id, file_path)) in ids.into_iter().enumerate() {
            if id as usize != expected {
                return Err(FseError::Corruption(format!(
                    "data file {} is missing (found {})",
                    expected, id
                )));
            }
            let file = SequentialFile::open(
                &file_path,
                id,
                max_chunk_data_size,
                max_chunks_per_file,
            )?;
            files.push(Arc::new(file));
        }

        tracing::info!("Opened {} data files in {}", files.len(), path.display());

        Ok(Self {
            data_dir: path.to_path_buf(),
            files: RwLock::new(files),
            alloc_lock: Mutex::new(()),
            max_chunk_data_size,
            max_chunks_per_file,
        })
    }

    /// Write a chunk to the newest data file
    ///
    /// A full data file is answered by allocating the next one and retrying,
    /// so callers never see `DataOutOfFile` unless the id space is exhausted.
    pub fn write_chunk(&self, data: &[u8]) -> Result<PartitionId> {
        loop {
            let file = match self.active_file() {
                Some(file) => file,
                None => self.allocate_after(None)?,
            };

            match file.write_chunk(data) {
                Ok(chunk_id) => return Ok(PartitionId::new(file.id(), chunk_id)),
                Err(FseError::DataOutOfFile { file_id }) => {
                    self.allocate_after(Some(file_id))?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Get the data file with the given id
    pub fn get(&self, file_id: u16) -> Option<Arc<SequentialFile>> {
        self.files.read().get(file_id as usize).cloned()
    }

    /// Sync the given data files to stable storage
    pub fn sync_files(&self, file_ids: &BTreeSet<u16>) -> Result<()> {
        for &id in file_ids {
            if let Some(file) = self.get(id) {
                file.sync()?;
            }
        }
        Ok(())
    }

    /// Get the number of data files
    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    /// Get the data file directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn max_chunk_data_size(&self) -> u32 {
        self.max_chunk_data_size
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn active_file(&self) -> Option<Arc<SequentialFile>> {
        self.files.read().last().cloned()
    }

    /// Create a new data file unless another writer already did
    ///
    /// `full_id` is the data file that just reported full (None when there
    /// are no data files yet).
    fn allocate_after(&self, full_id: Option<u16>) -> Result<Arc<SequentialFile>> {
        let _alloc_guard = self.alloc_lock.lock();

        {
            let files = self.files.read();
            let newest = files.last().map(|f| f.id());
            if newest != full_id {
                if let Some(file) = files.last() {
                    return Ok(Arc::clone(file));
                }
            }
        }

        let next_id = self.file_count();
        let id = u16::try_from(next_id).map_err(|_| FseError::DataOutOfFile {
            file_id: u16::MAX,
        })?;

        let file = Arc::new(SequentialFile::create(
            &self.data_file_path(id),
            id,
            self.max_chunk_data_size,
            self.max_chunks_per_file,
        )?);
        sync_dir(&self.data_dir)?;

        self.files.write().push(Arc::clone(&file));
        tracing::debug!("Allocated data file {}", id);
        Ok(file)
    }

    fn data_file_path(&self, id: u16) -> PathBuf {
        self.data_dir.join(id.to_string())
    }

    /// Parse a data file id from its file name
    /// "42" → Some(42)
    fn parse_data_file_id(name: &str) -> Option<u16> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        name.parse().ok()
    }
}

/// Make file creation and removal in `dir` durable
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
