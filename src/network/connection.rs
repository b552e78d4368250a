//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{FseError, Result};
use crate::metadata::FileInfo;
use crate::protocol::{
    read_command, write_response, write_response_header, Command, Response, Status,
};
use crate::registry::FileStorage;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the file storage
    storage: Arc<FileStorage>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O
    pub fn new(stream: TcpStream, storage: Arc<FileStorage>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            storage,
            peer_addr,
        })
    }

    /// Configure connection timeouts
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads commands in a loop and sends responses.
    /// Returns when the client disconnects or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let command = match read_command(&mut self.reader) {
                Ok(cmd) => cmd,
                Err(FseError::Io(ref e)) if is_disconnect(e) => {
                    tracing::debug!("Client {} disconnected ({})", self.peer_addr, e.kind());
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    let _ = self.send_response(Response::error(&e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!("Received command from {}: {:?}", self.peer_addr, command);

            let result = match command {
                Command::Put {
                    name,
                    content_type,
                    size,
                } => self.handle_put(&name, &content_type, size),
                Command::Get { name } => self.handle_get(&name),
                other => {
                    let response = Self::to_response(self.storage.execute(other));
                    self.send_response(response)
                }
            };

            if let Err(e) = result {
                if let FseError::Io(ref io_err) = e {
                    if is_disconnect(io_err) {
                        tracing::debug!(
                            "Client {} disconnected mid-request: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error serving {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Store `size` content bytes following the PUT frame
    ///
    /// Whatever the outcome, all `size` bytes are consumed so the next frame
    /// starts at the right place.
    fn handle_put(&mut self, name: &str, content_type: &str, size: u32) -> Result<()> {
        let mut content = ExactReader::new(&mut self.reader, size as u64);
        let saved = self.storage.save_file(name, content_type, &mut content);
        io::copy(&mut content, &mut io::sink())?;

        let response = match saved {
            Ok(file) => {
                let info = FileInfo::from(file.as_ref());
                Response::ok(Some(bincode::serialize(&info)?))
            }
            // Content stream broke; the connection is unusable
            Err(FseError::Io(e)) if is_disconnect(&e) => return Err(FseError::Io(e)),
            Err(e) => {
                tracing::debug!("PUT {} from {} failed: {}", name, self.peer_addr, e);
                Self::error_response(e)
            }
        };
        self.send_response(response)
    }

    /// Stream a file's content as the response payload
    fn handle_get(&mut self, name: &str) -> Result<()> {
        let Some(file) = self.storage.lookup(name) else {
            return self.send_response(Response::not_found());
        };

        write_response_header(&mut self.writer, Status::Ok, file.size())?;
        let mut stream = self.storage.open_stream(&file);
        let sent = io::copy(&mut stream, &mut self.writer)?;
        self.writer.flush()?;

        // The header promised `size` bytes; a short body cannot be repaired
        if sent != file.size() as u64 {
            return Err(FseError::InvalidRetValue {
                expected: file.size() as usize,
                actual: sent as usize,
            });
        }
        Ok(())
    }

    fn to_response(result: Result<Option<Vec<u8>>>) -> Response {
        match result {
            Ok(payload) => Response::ok(payload),
            Err(e) => Self::error_response(e),
        }
    }

    fn error_response(e: FseError) -> Response {
        match e {
            FseError::FileNotFound(_) => Response::not_found(),
            FseError::DuplicateFileName(_) => Response::conflict(&e.to_string()),
            e => Response::error(&e.to_string()),
        }
    }

    /// Send a response to the client
    fn send_response(&mut self, response: Response) -> Result<()> {
        write_response(&mut self.writer, &response)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// Reads exactly `remaining` bytes; running dry early is `UnexpectedEof`
struct ExactReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> ExactReader<R> {
    fn new(inner: R, remaining: u64) -> Self {
        Self { inner, remaining }
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(self.remaining as usize);
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("content ended {} bytes early", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
