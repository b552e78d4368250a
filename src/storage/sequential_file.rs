//! Sequential File
//!
//! Capacity-bounded container of fixed-size chunk slots.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (16 bytes)                                            │
//! │   Magic "FSEQ" (4) | Version u16 | Reserved u16              │
//! │   ChunkSize u32 | MaxChunks u32                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Slot 0  (12 + ChunkSize bytes)                               │
//! │   Used u8 | Reserved (3) | Len u32 | CRC32 u32 | Payload     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Slot 1 ...                                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Slots are allocated strictly in order, so the file only ever grows at
//! the tail. All integers are big-endian.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::codec;
use crate::error::{FseError, Result};

/// Magic bytes identifying a sequential data file
pub(crate) const MAGIC: &[u8; 4] = b"FSEQ";

/// Current data file format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + Reserved (2) + ChunkSize (4) + MaxChunks (4)
pub(crate) const HEADER_SIZE: u64 = 16;

/// Slot header size: Used (1) + Reserved (3) + Len (4) + CRC (4)
pub(crate) const SLOT_HEADER_SIZE: usize = 12;

const SLOT_USED: u8 = 1;

/// One physical data file under `datafiles/`
///
/// ## Concurrency:
/// - `write_chunk`: serialized by the `next_chunk` mutex
/// - `read_chunk`: positional reads, no lock; only chunks counted in
///   `chunk_count` (fully written) are readable
pub struct SequentialFile {
    id: u16,
    path: PathBuf,
    file: File,
    max_chunk_data_size: u32,
    max_chunks: u32,
    /// Next free slot, held for the duration of a chunk write
    next_chunk: Mutex<u32>,
    /// Chunks fully written and visible to readers
    chunk_count: AtomicU32,
}

impl SequentialFile {
    /// Create a new, empty data file
    pub fn create(path: &Path, id: u16, max_chunk_data_size: u32, max_chunks: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        header[0..4].copy_from_slice(MAGIC);
        codec::encode_u16(VERSION, &mut header, 4);
        codec::encode_u32(max_chunk_data_size, &mut header, 8);
        codec::encode_u32(max_chunks, &mut header, 12);
        write_all_at(&file, &header, 0)?;
        file.sync_all()?;

        tracing::debug!("Created data file {} at {}", id, path.display());

        Ok(Self {
            id,
            path: path.to_path_buf(),
            file,
            max_chunk_data_size,
            max_chunks,
            next_chunk: Mutex::new(0),
            chunk_count: AtomicU32::new(0),
        })
    }

    /// Open an existing data file
    ///
    /// The header geometry must match the configured one. The allocation
    /// cursor is recovered by scanning slot headers; a torn final chunk is
    /// left as free space.
    pub fn open(path: &Path, id: u16, max_chunk_data_size: u32, max_chunks: u32) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let file_len = file.metadata()?.len();

        if file_len < HEADER_SIZE {
            return Err(FseError::Corruption(format!(
                "data file {} is too short for a header ({} bytes)",
                path.display(),
                file_len
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        read_exact_at(&file, &mut header, 0)?;

        if &header[0..4] != MAGIC {
            return Err(FseError::Corruption(format!(
                "invalid data file magic in {}: {:?}",
                path.display(),
                &header[0..4]
            )));
        }
        let version = codec::decode_u16(&header, 4);
        if version != VERSION {
            return Err(FseError::Corruption(format!(
                "unsupported data file version {} in {}",
                version,
                path.display()
            )));
        }
        let chunk_size = codec::decode_u32(&header, 8);
        let chunk_limit = codec::decode_u32(&header, 12);
        if chunk_size != max_chunk_data_size || chunk_limit != max_chunks {
            return Err(FseError::Corruption(format!(
                "data file {} geometry {}x{} does not match configured {}x{}",
                path.display(),
                chunk_limit,
                chunk_size,
                max_chunks,
                max_chunk_data_size
            )));
        }

        let mut sequential_file = Self {
            id,
            path: path.to_path_buf(),
            file,
            max_chunk_data_size,
            max_chunks,
            next_chunk: Mutex::new(0),
            chunk_count: AtomicU32::new(0),
        };

        let count = sequential_file.recover_chunk_count(file_len)?;
        *sequential_file.next_chunk.get_mut() = count;
        sequential_file.chunk_count = AtomicU32::new(count);

        tracing::debug!("Opened data file {} with {} chunks", id, count);
        Ok(sequential_file)
    }

    /// Read the payload of a written chunk
    pub fn read_chunk(&self, chunk_id: u16) -> Result<Bytes> {
        if chunk_id as u32 >= self.chunk_count.load(Ordering::Acquire) {
            return Err(self.invalid_chunk(chunk_id));
        }

        let offset = self.slot_offset(chunk_id as u32);
        let mut header = [0u8; SLOT_HEADER_SIZE];
        read_exact_at(&self.file, &mut header, offset)?;
        if header[0] != SLOT_USED {
            return Err(self.invalid_chunk(chunk_id));
        }

        let len = codec::decode_u32(&header, 4);
        let crc = codec::decode_u32(&header, 8);
        if len > self.max_chunk_data_size {
            return Err(FseError::Corruption(format!(
                "chunk {} in data file {} declares {} bytes",
                chunk_id, self.id, len
            )));
        }

        let mut payload = vec![0u8; len as usize];
        read_exact_at(&self.file, &mut payload, offset + SLOT_HEADER_SIZE as u64)?;
        if crc32fast::hash(&payload) != crc {
            return Err(FseError::Corruption(format!(
                "checksum mismatch for chunk {} in data file {}",
                chunk_id, self.id
            )));
        }

        Ok(Bytes::from(payload))
    }

    /// Store `data` in the next free slot and return its chunk id
    pub fn write_chunk(&self, data: &[u8]) -> Result<u16> {
        if data.len() > self.max_chunk_data_size as usize {
            return Err(FseError::DataOutOfChunk {
                size: data.len(),
                max: self.max_chunk_data_size,
            });
        }

        let mut next_chunk = self.next_chunk.lock();
        if *next_chunk >= self.max_chunks {
            return Err(FseError::DataOutOfFile { file_id: self.id });
        }

        let chunk_id = *next_chunk;
        let mut slot = vec![0u8; SLOT_HEADER_SIZE + data.len()];
        slot[0] = SLOT_USED;
        codec::encode_u32(data.len() as u32, &mut slot, 4);
        codec::encode_u32(crc32fast::hash(data), &mut slot, 8);
        slot[SLOT_HEADER_SIZE..].copy_from_slice(data);
        write_all_at(&self.file, &slot, self.slot_offset(chunk_id))?;

        *next_chunk += 1;
        self.chunk_count.store(*next_chunk, Ordering::Release);

        tracing::trace!("Wrote chunk {} ({} bytes) to data file {}", chunk_id, data.len(), self.id);
        Ok(chunk_id as u16)
    }

    /// Flush written chunks to stable storage
    pub fn sync(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of chunks written so far
    pub fn chunk_count(&self) -> u32 {
        self.chunk_count.load(Ordering::Acquire)
    }

    pub fn max_chunks(&self) -> u32 {
        self.max_chunks
    }

    /// Whether every slot has been allocated
    pub fn is_full(&self) -> bool {
        self.chunk_count() >= self.max_chunks
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn slot_offset(&self, chunk_id: u32) -> u64 {
        HEADER_SIZE + chunk_id as u64 * (SLOT_HEADER_SIZE as u64 + self.max_chunk_data_size as u64)
    }

    fn invalid_chunk(&self, chunk_id: u16) -> FseError {
        FseError::InvalidChunkId {
            file_id: self.id,
            chunk_id,
        }
    }

    /// Count the leading run of complete slots
    ///
    /// Only the last used slot can be torn (one writer, in-order slots), so
    /// its checksum is the only one verified here.
    fn recover_chunk_count(&self, file_len: u64) -> Result<u32> {
        let mut count = 0;
        let mut last: Option<(u64, u32, u32)> = None;

        while count < self.max_chunks {
            let offset = self.slot_offset(count);
            if offset + SLOT_HEADER_SIZE as u64 > file_len {
                break;
            }

            let mut header = [0u8; SLOT_HEADER_SIZE];
            read_exact_at(&self.file, &mut header, offset)?;
            let len = codec::decode_u32(&header, 4);
            if header[0] != SLOT_USED
                || len > self.max_chunk_data_size
                || offset + (SLOT_HEADER_SIZE as u64) + len as u64 > file_len
            {
                break;
            }

            last = Some((offset, len, codec::decode_u32(&header, 8)));
            count += 1;
        }

        if let Some((offset, len, crc)) = last {
            let mut payload = vec![0u8; len as usize];
            read_exact_at(&self.file, &mut payload, offset + SLOT_HEADER_SIZE as u64)?;
            if crc32fast::hash(&payload) != crc {
                tracing::warn!(
                    "Discarding torn chunk {} in data file {}",
                    count - 1,
                    self.id
                );
                count -= 1;
            }
        }

        Ok(count)
    }
}

// =============================================================================
// Positional I/O
// =============================================================================

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut std::mem::take(&mut buf)[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ))
            }
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
