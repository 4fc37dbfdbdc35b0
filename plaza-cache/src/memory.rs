//! In-memory cache store with background refetch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use plaza_core::PlazaResult;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::entry::{CacheEntry, EntryOrigin, Version};
use crate::key::CacheKey;
use crate::query::CacheConfig;
use crate::traits::{CacheStats, CacheStore, Refetcher};

/// A background refetch tracked per key.
struct RefetchTask {
    id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    refetches_started: AtomicU64,
    refetches_applied: AtomicU64,
    refetches_discarded: AtomicU64,
    refetches_cancelled: AtomicU64,
    refetch_failures: AtomicU64,
}

struct StoreInner<V> {
    entries: RwLock<HashMap<CacheKey, CacheEntry<V>>>,
    in_flight: Mutex<HashMap<CacheKey, RefetchTask>>,
    refetcher: Option<Arc<dyn Refetcher<V>>>,
    config: CacheConfig,
    clock: AtomicU64,
    next_task: AtomicU64,
    counters: Counters,
}

impl<V> StoreInner<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn next_version(&self) -> Version {
        Version::new(self.clock.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Write a refetch result if the entry is still at the version the
    /// refetch started from.
    async fn complete_refetch(
        &self,
        key: &CacheKey,
        task_id: u64,
        started_from: Option<Version>,
        result: PlazaResult<Option<V>>,
    ) {
        match result {
            Ok(fetched) => {
                let mut entries = self.entries.write().await;
                let current = entries.get(key).map(|e| e.version);
                if current != started_from {
                    self.counters.refetches_discarded.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = %key, "Discarding refetch result superseded by a newer write");
                } else {
                    match fetched {
                        Some(value) => {
                            let version = self.next_version();
                            entries.insert(key.clone(), CacheEntry::new(value, version, EntryOrigin::Server));
                            tracing::debug!(key = %key, version = %version, "Refetch applied");
                        }
                        None => {
                            entries.remove(key);
                            tracing::debug!(key = %key, "Refetch found no resource, entry dropped");
                        }
                    }
                    self.counters.refetches_applied.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(err) => {
                self.counters.refetch_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %key, error = %err, "Background refetch failed, keeping stale entry");
            }
        }

        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(key).map(|task| task.id) == Some(task_id) {
            in_flight.remove(key);
        }
    }
}

/// Cache store backed by a `HashMap` behind a tokio `RwLock`.
///
/// Cloning is cheap and clones share the same entries.
pub struct InMemoryCacheStore<V> {
    inner: Arc<StoreInner<V>>,
}

impl<V> InMemoryCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Store without a refetcher: invalidation only marks entries stale.
    pub fn new(config: CacheConfig) -> Self {
        Self::build(None, config)
    }

    pub fn with_refetcher(refetcher: Arc<dyn Refetcher<V>>, config: CacheConfig) -> Self {
        Self::build(Some(refetcher), config)
    }

    fn build(refetcher: Option<Arc<dyn Refetcher<V>>>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                refetcher,
                config,
                clock: AtomicU64::new(0),
                next_task: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub async fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.inner.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn has_pending_refetch(&self, key: &CacheKey) -> bool {
        self.inner.in_flight.lock().await.contains_key(key)
    }

    /// Wait until every background refetch scheduled so far has finished.
    pub async fn await_refetches(&self) {
        loop {
            let tasks: Vec<RefetchTask> = {
                let mut in_flight = self.inner.in_flight.lock().await;
                in_flight.drain().map(|(_, task)| task).collect()
            };
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                // A cancelled task reports a JoinError; nothing to do.
                let _ = task.handle.await;
            }
        }
    }

    /// Drop every entry and cancel every refetch.
    pub async fn clear(&self) {
        let tasks: Vec<RefetchTask> = {
            let mut in_flight = self.inner.in_flight.lock().await;
            in_flight.drain().map(|(_, task)| task).collect()
        };
        for task in tasks {
            task.handle.abort();
        }
        self.inner.entries.write().await.clear();
    }

    async fn schedule_refetch(&self, key: &CacheKey, started_from: Option<Version>) {
        let Some(refetcher) = self.inner.refetcher.clone() else {
            return;
        };
        if !self.inner.config.background_refetch {
            return;
        }

        // Hold the in-flight map while spawning so the task cannot finish
        // and deregister before it is registered.
        let mut in_flight = self.inner.in_flight.lock().await;
        if let Some(previous) = in_flight.remove(key) {
            previous.handle.abort();
            self.inner.counters.refetches_cancelled.fetch_add(1, Ordering::Relaxed);
        }

        let task_id = self.inner.next_task.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = refetcher.refetch(&task_key).await;
            inner.complete_refetch(&task_key, task_id, started_from, result).await;
        });
        in_flight.insert(key.clone(), RefetchTask { id: task_id, handle });
        self.inner.counters.refetches_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, "Background refetch scheduled");
    }
}

impl<V> Clone for InMemoryCacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl<V> CacheStore<V> for InMemoryCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let entry = self.inner.entries.read().await.get(key).cloned();
        let counter = if entry.is_some() {
            &self.inner.counters.hits
        } else {
            &self.inner.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        entry
    }

    async fn set(&self, key: &CacheKey, value: V, origin: EntryOrigin) -> Version {
        let mut entries = self.inner.entries.write().await;
        let version = self.inner.next_version();
        entries.insert(key.clone(), CacheEntry::new(value, version, origin));
        version
    }

    async fn remove(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        self.cancel_pending_refetch(key).await;
        self.inner.entries.write().await.remove(key)
    }

    async fn invalidate(&self, key: &CacheKey) {
        let started_from = {
            let mut entries = self.inner.entries.write().await;
            match entries.get_mut(key) {
                Some(entry) => {
                    entry.stale = true;
                    entry.version
                }
                None => return,
            }
        };
        tracing::debug!(key = %key, "Cache entry invalidated");
        self.schedule_refetch(key, Some(started_from)).await;
    }

    async fn invalidate_prefix(&self, prefix: &CacheKey) -> u64 {
        let matched: Vec<CacheKey> = {
            let entries = self.inner.entries.read().await;
            entries.keys().filter(|k| k.starts_with(prefix)).cloned().collect()
        };
        for key in &matched {
            self.invalidate(key).await;
        }
        matched.len() as u64
    }

    async fn cancel_pending_refetch(&self, key: &CacheKey) {
        let task = self.inner.in_flight.lock().await.remove(key);
        if let Some(task) = task {
            task.handle.abort();
            self.inner.counters.refetches_cancelled.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "Pending refetch cancelled");
        }
    }

    async fn stats(&self) -> CacheStats {
        let entry_count = self.inner.entries.read().await.len() as u64;
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            entry_count,
            refetches_started: c.refetches_started.load(Ordering::Relaxed),
            refetches_applied: c.refetches_applied.load(Ordering::Relaxed),
            refetches_discarded: c.refetches_discarded.load(Ordering::Relaxed),
            refetches_cancelled: c.refetches_cancelled.load(Ordering::Relaxed),
            refetch_failures: c.refetch_failures.load(Ordering::Relaxed),
        }
    }
}
