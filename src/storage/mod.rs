//! Storage Module
//!
//! Physical chunk storage: sequential data files, partition addressing and
//! the partition cache.
//!
//! ## Responsibilities
//! - Persist chunk payloads in append-only sequential files
//! - Map partition ids to (data file, chunk) pairs
//! - Allocate new data files when the newest one is full
//! - Cache hot chunk payloads in memory
//!
//! ## Layout
//! ```text
//! {storage_path}/datafiles/
//!   ├── 0     ┌────────┬────────┬────────┬─────┐
//!   │         │ Header │ Slot 0 │ Slot 1 │ ... │
//!   │         └────────┴────────┴────────┴─────┘
//!   ├── 1
//!   └── ...
//! ```

mod cache;
mod manager;
mod partition;
mod sequential_file;

pub use cache::{CacheStats, PartitionCache};
pub use manager::DataFileManager;
pub use partition::{FileChunk, PartitionId, Partitions, MAX_PARTITION_NUM};
pub use sequential_file::SequentialFile;
