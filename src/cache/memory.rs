//! In-memory tier backed by moka

use super::CacheEntry;
use moka::future::Cache;

/// Fixed per-entry overhead charged on top of the body size
const ENTRY_OVERHEAD: usize = 256;

/// Byte-bounded in-memory response store
#[derive(Clone)]
pub(crate) struct MemoryTier {
    cache: Cache<String, CacheEntry>,
    capacity: u64,
}

impl MemoryTier {
    pub(crate) fn new(capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .weigher(|_key: &String, entry: &CacheEntry| -> u32 {
                weight_of(entry).try_into().unwrap_or(u32::MAX)
            })
            .build();

        Self { cache, capacity }
    }

    pub(crate) async fn get(&self, fingerprint: &str) -> Option<CacheEntry> {
        self.cache.get(fingerprint).await
    }

    /// Insert an entry; returns false when it can never fit
    pub(crate) async fn insert(&self, fingerprint: String, entry: CacheEntry) -> bool {
        if weight_of(&entry) as u64 > self.capacity {
            return false;
        }
        self.cache.insert(fingerprint, entry).await;
        true
    }

    pub(crate) async fn remove(&self, fingerprint: &str) {
        self.cache.invalidate(fingerprint).await;
    }

    pub(crate) fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// `(entries, weighted bytes)` after applying pending evictions
    pub(crate) async fn usage(&self) -> (u64, u64) {
        self.cache.run_pending_tasks().await;
        (self.cache.entry_count(), self.cache.weighted_size())
    }

    pub(crate) fn capacity(&self) -> u64 {
        self.capacity
    }
}

fn weight_of(entry: &CacheEntry) -> usize {
    entry.body.len() + ENTRY_OVERHEAD
}
