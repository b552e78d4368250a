//! File Data Reader
//!
//! Streams a file's bytes by walking its partitions in order and pulling
//! each chunk on demand.

use std::io::{self, Read};

use crate::error::{FseError, Result};
use crate::storage::{FileChunk, PartitionId, Partitions};

/// Anything that can resolve a partition id to its chunk
pub trait ChunkSource {
    fn get_chunk(&self, id: PartitionId) -> Result<FileChunk>;
}

/// Single-use forward cursor over one file's partitions
///
/// Not meant to be shared between threads; every stream consumer opens its
/// own reader.
pub struct FileDataReader<'a, S: ChunkSource + ?Sized> {
    source: &'a S,
    partitions: Partitions,
    /// Index of the next partition to load
    next_partition: usize,
    current_chunk: Option<FileChunk>,
    /// Read offset within the current chunk
    chunk_offset: usize,
    bytes_read: u64,
}

impl<'a, S: ChunkSource + ?Sized> FileDataReader<'a, S> {
    pub fn new(source: &'a S, partitions: Partitions) -> Self {
        Self {
            source,
            partitions,
            next_partition: 0,
            current_chunk: None,
            chunk_offset: 0,
            bytes_read: 0,
        }
    }

    /// Copy the next bytes of the file into `buf`
    ///
    /// Returns `Err(FseError::EndOfPartitionStream)` once every partition has
    /// been consumed. Chunk fetch errors are returned as-is, without retry; the
    /// failed partition is fetched again on the next call.
    pub fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let data = self.available_chunk()?.content.clone();
        let n = (data.len() - self.chunk_offset).min(buf.len());

        let src = data
            .get(self.chunk_offset..self.chunk_offset + n)
            .ok_or(FseError::InvalidRetValue {
                expected: n,
                actual: data.len().saturating_sub(self.chunk_offset),
            })?;
        buf[..n].copy_from_slice(src);

        self.chunk_offset += n;
        self.bytes_read += n as u64;
        Ok(n)
    }

    /// Number of partitions this reader walks
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Total bytes handed out so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Current chunk, loading the next partition when it is used up
    fn available_chunk(&mut self) -> Result<&FileChunk> {
        loop {
            if let Some(chunk) = &self.current_chunk {
                if self.chunk_offset < chunk.content.len() {
                    break;
                }
            }

            let Some(&id) = self.partitions.get(self.next_partition) else {
                self.current_chunk = None;
                return Err(FseError::EndOfPartitionStream);
            };
            // A failed fetch leaves the cursor on `id` so a retry reloads it
            let chunk = self.source.get_chunk(id)?;
            self.next_partition += 1;
            self.current_chunk = Some(chunk);
            self.chunk_offset = 0;
        }

        self.current_chunk
            .as_ref()
            .ok_or(FseError::EndOfPartitionStream)
    }
}

impl<S: ChunkSource + ?Sized> Read for FileDataReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_some(buf) {
            Ok(n) => Ok(n),
            Err(FseError::EndOfPartitionStream) => Ok(0),
            Err(FseError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    }
}
