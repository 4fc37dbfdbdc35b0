//! Cache store and refetch traits.

use async_trait::async_trait;
use plaza_core::PlazaResult;

use crate::entry::{CacheEntry, EntryOrigin, Version};
use crate::key::CacheKey;

/// Shared read cache the coordinator and the query layer write through.
///
/// # Implementation Requirements
///
/// - `set` must stamp a version newer than any version it handed out before.
/// - `invalidate` must mark the entry stale and may schedule a refetch. A
///   scheduled refetch must not overwrite a value written after it started.
/// - `cancel_pending_refetch` must guarantee the cancelled refetch never
///   writes.
#[async_trait]
pub trait CacheStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry<V>>;

    /// Write a value and return the version stamped on it.
    async fn set(&self, key: &CacheKey, value: V, origin: EntryOrigin) -> Version;

    async fn remove(&self, key: &CacheKey) -> Option<CacheEntry<V>>;

    /// Mark stale and schedule a background refetch.
    async fn invalidate(&self, key: &CacheKey);

    /// Invalidate every key starting with `prefix`. Returns how many matched.
    async fn invalidate_prefix(&self, prefix: &CacheKey) -> u64;

    async fn cancel_pending_refetch(&self, key: &CacheKey);

    async fn stats(&self) -> CacheStats;
}

/// Loads server truth for a cache key.
#[async_trait]
pub trait Refetcher<V>: Send + Sync {
    /// Fetch the current value, or `None` when the resource no longer exists.
    async fn refetch(&self, key: &CacheKey) -> PlazaResult<Option<V>>;
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
    pub refetches_started: u64,
    pub refetches_applied: u64,
    pub refetches_discarded: u64,
    pub refetches_cancelled: u64,
    pub refetch_failures: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
