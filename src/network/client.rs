//! Blocking client
//!
//! One request at a time over a single TCP connection.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::{FseError, Result};
use crate::metadata::{self, FileInfo, MAX_FILE_NAME_LEN};
use crate::protocol::{
    read_response, read_response_header, write_command, Command, Response, Status,
};

/// Client connection to an FSE server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| FseError::Network(format!("connect failed: {}", e)))?;
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Upload `data` under `name`
    pub fn put(&mut self, name: &str, content_type: &str, data: &[u8]) -> Result<FileInfo> {
        let size = u32::try_from(data.len()).map_err(|_| {
            FseError::InvalidOperation(format!("file exceeds {} bytes", u32::MAX))
        })?;
        self.put_from(name, content_type, size, data)
    }

    /// Upload exactly `size` bytes read from `input`
    pub fn put_from<R: Read>(
        &mut self,
        name: &str,
        content_type: &str,
        size: u32,
        input: R,
    ) -> Result<FileInfo> {
        // Checked before encoding: the frame carries u16 string lengths
        metadata::validate_file_name(name)?;
        metadata::validate_content_type(content_type)?;

        let command = Command::Put {
            name: name.to_string(),
            content_type: content_type.to_string(),
            size,
        };
        write_command(&mut self.writer, &command)?;

        let sent = io::copy(&mut input.take(size as u64), &mut self.writer)?;
        self.writer.flush()?;
        if sent != size as u64 {
            return Err(FseError::InvalidRetValue {
                expected: size as usize,
                actual: sent as usize,
            });
        }

        let response = read_response(&mut self.reader)?;
        let payload = Self::expect_ok(response, name)?;
        Self::decode_payload(payload)
    }

    /// Download a whole file; `None` if the server does not have it
    pub fn get(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut data = Vec::new();
        Ok(self.get_to(name, &mut data)?.map(|_| data))
    }

    /// Stream a file into `out`; returns the byte count, or `None` if not found
    ///
    /// Names longer than any stored name are answered locally.
    pub fn get_to<W: Write>(&mut self, name: &str, out: &mut W) -> Result<Option<u64>> {
        if name.len() > MAX_FILE_NAME_LEN {
            return Ok(None);
        }
        write_command(
            &mut self.writer,
            &Command::Get {
                name: name.to_string(),
            },
        )?;

        let (status, len) = read_response_header(&mut self.reader)?;
        if status != Status::Ok {
            let mut payload = vec![0u8; len as usize];
            self.reader.read_exact(&mut payload)?;
            let response = Response {
                status,
                payload: (!payload.is_empty()).then_some(payload),
            };
            return match Self::expect_ok(response, name) {
                Err(FseError::FileNotFound(_)) => Ok(None),
                Err(e) => Err(e),
                Ok(_) => Err(FseError::Protocol("unexpected GET status".to_string())),
            };
        }

        let received = io::copy(&mut (&mut self.reader).take(len as u64), out)?;
        if received != len as u64 {
            return Err(FseError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("GET {}: expected {} bytes, got {}", name, len, received),
            )));
        }
        Ok(Some(received))
    }

    /// Metadata for one file; `None` if not found
    pub fn stat(&mut self, name: &str) -> Result<Option<FileInfo>> {
        if name.len() > MAX_FILE_NAME_LEN {
            return Ok(None);
        }
        let command = Command::Stat {
            name: name.to_string(),
        };
        match self.request(&command, name) {
            Ok(payload) => Self::decode_payload(payload).map(Some),
            Err(FseError::FileNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Metadata for every stored file, ordered by name
    pub fn list(&mut self) -> Result<Vec<FileInfo>> {
        let payload = self.request(&Command::List, "")?;
        Self::decode_payload(payload)
    }

    /// Round trip a PING
    pub fn ping(&mut self) -> Result<()> {
        let payload = self.request(&Command::Ping, "")?;
        match payload.as_deref() {
            Some(b"PONG") => Ok(()),
            _ => Err(FseError::Protocol("unexpected PING reply".to_string())),
        }
    }

    fn request(&mut self, command: &Command, name: &str) -> Result<Option<Vec<u8>>> {
        write_command(&mut self.writer, command)?;
        let response = read_response(&mut self.reader)?;
        Self::expect_ok(response, name)
    }

    fn expect_ok(response: Response, name: &str) -> Result<Option<Vec<u8>>> {
        match response.status {
            Status::Ok => Ok(response.payload),
            Status::NotFound => Err(FseError::FileNotFound(name.to_string())),
            Status::Conflict => Err(FseError::DuplicateFileName(name.to_string())),
            Status::Error => Err(FseError::Network(response.message())),
        }
    }

    fn decode_payload<T: serde::de::DeserializeOwned>(payload: Option<Vec<u8>>) -> Result<T> {
        let payload =
            payload.ok_or_else(|| FseError::Protocol("missing response payload".to_string()))?;
        Ok(bincode::deserialize(&payload)?)
    }
}
