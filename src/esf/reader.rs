//! ESF Reader
//!
//! Handles reading entries from an entry sequence file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::codec;
use crate::error::{FseError, Result};

use super::{LENGTH_PREFIX_SIZE, MAX_ENTRY_SIZE};

/// Reads entries from an entry sequence file
pub struct EntryReader {
    reader: BufReader<File>,
    /// Offset just past the last complete entry
    position: u64,
    /// Set once a torn final entry has been seen
    truncated: bool,
}

impl EntryReader {
    /// Open an entry sequence file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            truncated: false,
        })
    }

    /// Read the next entry
    ///
    /// Returns:
    /// - `Ok(Some(data))`: a complete entry
    /// - `Ok(None)`: end of stream, including a torn final entry
    /// - `Err(_)`: an I/O failure or a corrupt length prefix
    pub fn read_entry(&mut self) -> Result<Option<Vec<u8>>> {
        if self.truncated {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        let got = self.read_full(&mut prefix)?;
        if got == 0 {
            return Ok(None);
        }
        if got < LENGTH_PREFIX_SIZE {
            tracing::trace!("Torn length prefix at offset {}", self.position);
            self.truncated = true;
            return Ok(None);
        }

        let len = codec::decode_u32(&prefix, 0);
        let mut data = vec![0u8; len.min(MAX_ENTRY_SIZE) as usize];
        let got = self.read_full(&mut data)?;
        if got < data.len() {
            tracing::trace!("Torn entry payload at offset {}", self.position);
            self.truncated = true;
            return Ok(None);
        }

        if len > MAX_ENTRY_SIZE {
            return Err(FseError::Corruption(format!(
                "entry at offset {} declares {} bytes (max {})",
                self.position, len, MAX_ENTRY_SIZE
            )));
        }

        self.position += (LENGTH_PREFIX_SIZE + data.len()) as u64;
        Ok(Some(data))
    }

    /// Offset just past the last complete entry read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether reading stopped at a torn final entry
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Fill `buf` until it is full or the file ends; returns bytes read
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl Iterator for EntryReader {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_entry().transpose()
    }
}
