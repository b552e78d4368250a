//! File Index
//!
//! In-memory name → file map rebuilt from the metadata log on startup.
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in a parking_lot RwLock:
//! - Many concurrent lookups, rare inserts
//! - Ordered names give a stable listing order

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{FseError, Result};
use crate::metadata::File;

/// Concurrent name index over stored files
#[derive(Default)]
pub struct FileIndex {
    files: RwLock<BTreeMap<String, Arc<File>>>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a file by name (read lock)
    pub fn get(&self, name: &str) -> Option<Arc<File>> {
        self.files.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    /// Insert a file (write lock); existing names are never replaced
    pub fn insert(&self, file: File) -> Result<Arc<File>> {
        let mut files = self.files.write();
        if files.contains_key(file.name()) {
            return Err(FseError::DuplicateFileName(file.name().to_string()));
        }
        let file = Arc::new(file);
        files.insert(file.name().to_string(), Arc::clone(&file));
        Ok(file)
    }

    /// All files ordered by name
    pub fn list(&self) -> Vec<Arc<File>> {
        self.files.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}
