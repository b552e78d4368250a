//! Partition Cache
//!
//! Bounded cache of chunk payloads keyed by partition id, backed by moka.
//!
//! Payloads of a partition never change once written, so the cache is never
//! invalidated. Eviction is least recently used and runs as part of moka's
//! pending maintenance, so `len` settles that work before counting.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use super::PartitionId;

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe LRU cache of chunk payloads
///
/// A capacity of zero disables caching: `put` is a no-op and every `get`
/// misses.
pub struct PartitionCache {
    capacity: usize,
    inner: Option<Cache<PartitionId, Bytes>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PartitionCache {
    pub fn new(capacity: usize) -> Self {
        let inner = (capacity > 0).then(|| {
            Cache::builder()
                .max_capacity(capacity as u64)
                .eviction_policy(EvictionPolicy::lru())
                .build()
        });

        Self {
            capacity,
            inner,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a payload, marking it most recently used
    pub fn get(&self, id: PartitionId) -> Option<Bytes> {
        let found = self.inner.as_ref().and_then(|cache| cache.get(&id));
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Insert a payload; the least recently used entry goes when full
    pub fn put(&self, id: PartitionId, content: Bytes) {
        if let Some(cache) = &self.inner {
            cache.insert(id, content);
        }
    }

    pub fn len(&self) -> usize {
        match &self.inner {
            Some(cache) => {
                cache.run_pending_tasks();
                cache.entry_count() as usize
            }
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, id: PartitionId) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|cache| cache.contains_key(&id))
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
            cache.run_pending_tasks();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
