//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Command Type
//! - PUT:  name_len (2) + name + type_len (2) + type + size (4)
//! - GET:  name_len (2) + name
//! - STAT: name_len (2) + name
//! - LIST: empty
//! - PING: empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```

use std::io::{Read, Write};

use crate::codec;
use crate::error::{FseError, Result};

use super::{Command, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum framed payload size (16 MB); streamed file content is not framed
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command frame to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload. PUT content is not part
/// of the frame; it is written after it.
pub fn encode_command(command: &Command) -> Vec<u8> {
    let cmd_type = command.command_type() as u8;

    let mut payload = Vec::new();
    match command {
        Command::Put {
            name,
            content_type,
            size,
        } => {
            put_str(&mut payload, name);
            put_str(&mut payload, content_type);
            payload.extend_from_slice(&size.to_be_bytes());
        }
        Command::Get { name } | Command::Stat { name } => put_str(&mut payload, name),
        Command::List | Command::Ping => {}
    }

    frame(cmd_type, &payload)
}

/// Decode a command frame from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_type, payload) = split_frame(bytes, "command")?;
    let mut pos = 0;

    let command = match cmd_type {
        0x01 => {
            let name = get_str(payload, &mut pos, "PUT name")?;
            let content_type = get_str(payload, &mut pos, "PUT content type")?;
            if payload.len() < pos + 4 {
                return Err(FseError::Protocol(
                    "PUT command: missing content size".to_string(),
                ));
            }
            let size = codec::decode_u32(payload, pos);
            pos += 4;
            Command::Put {
                name,
                content_type,
                size,
            }
        }
        0x02 => Command::Get {
            name: get_str(payload, &mut pos, "GET name")?,
        },
        0x03 => Command::Stat {
            name: get_str(payload, &mut pos, "STAT name")?,
        },
        0x04 => Command::List,
        0x05 => Command::Ping,
        _ => {
            return Err(FseError::Protocol(format!(
                "Unknown command type: 0x{:02x}",
                cmd_type
            )))
        }
    };

    if pos != payload.len() {
        return Err(FseError::Protocol(format!(
            "command 0x{:02x}: {} unexpected trailing bytes",
            cmd_type,
            payload.len() - pos
        )));
    }
    Ok(command)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    frame(response.status as u8, payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = split_frame(bytes, "response")?;
    let status = parse_status(status_byte)?;

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command frame from a stream
///
/// Blocks until a complete frame is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let message = read_frame(reader)?;
    decode_command(&message)
}

/// Write a command frame to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete framed response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let message = read_frame(reader)?;
    decode_response(&message)
}

/// Write a framed response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read only a response header; the caller consumes `len` payload bytes
pub fn read_response_header<R: Read>(reader: &mut R) -> Result<(Status, u32)> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;
    let status = parse_status(header[0])?;
    Ok((status, codec::decode_u32(&header, 1)))
}

/// Write only a response header; the caller streams `len` payload bytes
pub fn write_response_header<W: Write>(writer: &mut W, status: Status, len: u32) -> Result<()> {
    let mut header = [0u8; HEADER_SIZE];
    header[0] = status as u8;
    codec::encode_u32(len, &mut header, 1);
    writer.write_all(&header)?;
    Ok(())
}

// =============================================================================
// Private Helpers
// =============================================================================

fn frame(kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(kind);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);
    message
}

/// Validate a frame and return (kind, payload)
fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(FseError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = codec::decode_u32(bytes, 1) as usize;
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(FseError::Protocol(format!(
            "{} payload too large: {} bytes (max {})",
            what, payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(FseError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((bytes[0], &bytes[HEADER_SIZE..total_len]))
}

fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = codec::decode_u32(&header, 1) as usize;
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(FseError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let mut message = vec![0u8; HEADER_SIZE + payload_len];
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[HEADER_SIZE..])?;
    Ok(message)
}

fn parse_status(byte: u8) -> Result<Status> {
    Status::from_u8(byte)
        .ok_or_else(|| FseError::Protocol(format!("Unknown response status: 0x{:02x}", byte)))
}

fn put_str(payload: &mut Vec<u8>, s: &str) {
    payload.extend_from_slice(&(s.len() as u16).to_be_bytes());
    payload.extend_from_slice(s.as_bytes());
}

fn get_str(payload: &[u8], pos: &mut usize, field: &str) -> Result<String> {
    if payload.len() < *pos + 2 {
        return Err(FseError::Protocol(format!("{}: missing length", field)));
    }
    let len = codec::decode_u16(payload, *pos) as usize;
    *pos += 2;

    if payload.len() < *pos + len {
        return Err(FseError::Protocol(format!(
            "{}: incomplete (expected {}, got {})",
            field,
            len,
            payload.len() - *pos
        )));
    }
    let bytes = payload[*pos..*pos + len].to_vec();
    *pos += len;

    String::from_utf8(bytes).map_err(|_| FseError::Protocol(format!("{}: not valid UTF-8", field)))
}
