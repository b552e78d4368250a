//! # FSE
//!
//! A local chunked file storage engine with:
//! - Append-only sequential data files holding fixed-size chunks
//! - A durable, append-only metadata log replayed on startup
//! - Crash recovery that drops torn chunks and torn log records
//! - Streaming reads that reassemble files from scattered chunks
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (one thread per connection)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 FileStorage (registry)                       │
//! │        save_file / lookup / open_stream / execute            │
//! └──────┬──────────────────┬──────────────────────┬────────────┘
//!        │                  │                      │
//!        ▼                  ▼                      ▼
//! ┌─────────────┐   ┌───────────────┐      ┌──────────────┐
//! │ metadata.esf│   │   FileIndex   │      │ FileDataReader│
//! │  (append)   │   │   (RwLock)    │      │  (per stream) │
//! └─────────────┘   └───────────────┘      └──────┬───────┘
//!                                                 │
//!                          ┌──────────────────────┤
//!                          ▼                      ▼
//!                  ┌───────────────┐      ┌───────────────┐
//!                  │PartitionCache │      │  datafiles/N  │
//!                  │    (LRU)      │      │ (sequential)  │
//!                  └───────────────┘      └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod codec;
pub mod config;
pub mod error;

pub mod esf;
pub mod index;
pub mod metadata;
pub mod network;
pub mod protocol;
pub mod reader;
pub mod registry;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, SyncStrategy};
pub use error::{FseError, Result};
pub use metadata::{File, FileInfo};
pub use reader::{ChunkSource, FileDataReader};
pub use registry::FileStorage;
pub use storage::{PartitionId, Partitions};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of FSE
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
