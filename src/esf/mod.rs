//! Entry Sequence File (ESF) Module
//!
//! Append-only log of length-prefixed binary records. Used to persist file
//! metadata durably and replay it on startup.
//!
//! ## Responsibilities
//! - Append records, fsync according to the configured strategy
//! - Read records back in order
//! - Treat a torn final record as the end of the log
//! - Cut a torn tail off before new records are appended
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌──────────────┬──────────────────────┐ │
//! │ │ Len (4, BE)  │ Data (Len bytes)     │ │
//! │ └──────────────┴──────────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌──────────────┬──────────────────────┐ │
//! │ │ Len (4, BE)  │ Data (Len bytes)     │ │
//! │ └──────────────┴──────────────────────┘ │
//! └─────────────────────────────────────────┘
//! ```

mod reader;
mod writer;

pub use reader::EntryReader;
pub use writer::EntryWriter;

/// Size of the big-endian length prefix in front of every entry
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload a single entry may carry (16 MB)
pub const MAX_ENTRY_SIZE: u32 = 16 * 1024 * 1024;
