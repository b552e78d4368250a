//! Command definitions
//!
//! Represents commands from clients.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Put = 0x01,
    Get = 0x02,
    Stat = 0x03,
    List = 0x04,
    Ping = 0x05,
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store a file; `size` content bytes follow the frame on the stream
    Put {
        name: String,
        content_type: String,
        size: u32,
    },

    /// Fetch a file's content
    Get { name: String },

    /// Fetch a file's attributes
    Stat { name: String },

    /// List all files
    List,

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Put { .. } => CommandType::Put,
            Command::Get { .. } => CommandType::Get,
            Command::Stat { .. } => CommandType::Stat,
            Command::List => CommandType::List,
            Command::Ping => CommandType::Ping,
        }
    }
}
