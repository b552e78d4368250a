//! ESF Writer
//!
//! Handles appending entries to an entry sequence file.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::codec;
use crate::config::SyncStrategy;
use crate::error::{FseError, Result};

use super::{LENGTH_PREFIX_SIZE, MAX_ENTRY_SIZE};

/// Appends entries to an entry sequence file
pub struct EntryWriter {
    path: PathBuf,
    file: File,
    sync_strategy: SyncStrategy,
    /// Length of the log in bytes (end of the last complete entry)
    len: u64,
    /// Groups appended since the last fsync
    uncommitted: usize,
}

impl EntryWriter {
    /// Open or create an entry sequence file for appending
    ///
    /// Bytes beyond `valid_len` are a torn tail from an interrupted append
    /// and are cut off so new entries follow the last complete one.
    pub fn open(path: &Path, valid_len: u64, sync_strategy: SyncStrategy) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let file_len = file.metadata()?.len();
        if file_len > valid_len {
            tracing::warn!(
                "Truncating {} torn bytes from {}",
                file_len - valid_len,
                path.display()
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        let len = file_len.min(valid_len);
        file.seek(SeekFrom::Start(len))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            sync_strategy,
            len,
            uncommitted: 0,
        })
    }

    /// Append a single entry and commit it
    pub fn append_entry(&mut self, data: &[u8]) -> Result<()> {
        self.append_group(&[data])
    }

    /// Append several entries as one unit
    ///
    /// Sizes are checked before anything is written. If the write or its
    /// fsync fails the log is cut back to where the group started, so a
    /// group reported as failed is never replayed.
    pub fn append_group<T: AsRef<[u8]>>(&mut self, entries: &[T]) -> Result<()> {
        let mut total = 0;
        for entry in entries {
            let size = entry.as_ref().len();
            if size > MAX_ENTRY_SIZE as usize {
                return Err(FseError::EntryTooLarge {
                    size,
                    max: MAX_ENTRY_SIZE,
                });
            }
            total += LENGTH_PREFIX_SIZE + size;
        }

        let mut buf = vec![0u8; total];
        let mut offset = 0;
        for entry in entries {
            let data = entry.as_ref();
            codec::encode_u32(data.len() as u32, &mut buf, offset);
            offset += LENGTH_PREFIX_SIZE;
            buf[offset..offset + data.len()].copy_from_slice(data);
            offset += data.len();
        }

        let result = self
            .file
            .write_all(&buf)
            .map_err(FseError::from)
            .and_then(|_| self.commit());
        match result {
            Ok(()) => {
                self.len += total as u64;
                Ok(())
            }
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Current length of the log in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Groups appended but not yet fsynced
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count a written group and fsync when the strategy asks for it
    ///
    /// On error the group is not counted; the caller rolls it back.
    fn commit(&mut self) -> Result<()> {
        let pending = self.uncommitted + 1;
        let due = match self.sync_strategy {
            SyncStrategy::EveryGroup => true,
            SyncStrategy::EveryNGroups { count } => pending >= count,
        };
        if due {
            self.sync()
        } else {
            self.uncommitted = pending;
            Ok(())
        }
    }

    /// Drop whatever part of a failed group reached the file
    fn rollback(&mut self) {
        let result = self
            .file
            .set_len(self.len)
            .and_then(|_| self.file.seek(SeekFrom::Start(self.len)).map(|_| ()));
        if let Err(e) = result {
            tracing::error!("Failed to roll back {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for EntryWriter {
    fn drop(&mut self) {
        if self.uncommitted > 0 {
            if let Err(e) = self.sync() {
                tracing::warn!("Failed to sync {} on close: {}", self.path.display(), e);
            }
        }
    }
}
