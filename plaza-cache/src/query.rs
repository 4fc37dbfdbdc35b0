//! Read-through queries over a [`CacheStore`].

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use plaza_core::PlazaResult;

use crate::entry::EntryOrigin;
use crate::freshness::{CacheRead, Freshness};
use crate::key::CacheKey;
use crate::traits::{CacheStore, Refetcher};

/// Configuration shared by the store and the query layer.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum staleness for best-effort reads when not specified.
    pub default_max_staleness: Duration,
    /// Whether invalidation schedules a background refetch.
    pub background_refetch: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_max_staleness: Duration::from_secs(30),
            background_refetch: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_staleness(mut self, duration: Duration) -> Self {
        self.default_max_staleness = duration;
        self
    }

    pub fn with_background_refetch(mut self, enabled: bool) -> Self {
        self.background_refetch = enabled;
        self
    }

    /// Best-effort freshness using the configured staleness bound.
    pub fn default_freshness(&self) -> Freshness {
        Freshness::best_effort(self.default_max_staleness)
    }
}

/// Read-through cache: serve from the store when the entry satisfies the
/// caller's [`Freshness`], otherwise load from the server and write back.
///
/// # Example
///
/// ```ignore
/// let queries = QueryCache::new(store, refetcher, CacheConfig::default());
///
/// // Render whatever is cached if it is younger than a minute
/// let read = queries.fetch(&key, Freshness::best_effort(Duration::from_secs(60))).await?;
///
/// // Never show invalidated data
/// let read = queries.fetch(&key, Freshness::Consistent).await?;
/// ```
pub struct QueryCache<V, S, R> {
    store: Arc<S>,
    refetcher: Arc<R>,
    config: CacheConfig,
    _value: PhantomData<fn() -> V>,
}

impl<V, S, R> QueryCache<V, S, R>
where
    V: Clone + Send + Sync + 'static,
    S: CacheStore<V>,
    R: Refetcher<V>,
{
    pub fn new(store: Arc<S>, refetcher: Arc<R>, config: CacheConfig) -> Self {
        Self {
            store,
            refetcher,
            config,
            _value: PhantomData,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read a key, refetching when the cached entry does not satisfy
    /// `freshness`. Returns `Ok(None)` when the server has no such resource.
    pub async fn fetch(&self, key: &CacheKey, freshness: Freshness) -> PlazaResult<Option<CacheRead<V>>> {
        if let Some(entry) = self.store.get(key).await {
            if freshness.accepts(&entry) {
                return Ok(Some(CacheRead::from_cache(entry)));
            }
            tracing::debug!(key = %key, stale = entry.stale, "Cached entry rejected by freshness requirement");
        }
        self.fetch_and_cache(key).await
    }

    /// Read with the configured default best-effort bound.
    pub async fn fetch_default(&self, key: &CacheKey) -> PlazaResult<Option<CacheRead<V>>> {
        self.fetch(key, self.config.default_freshness()).await
    }

    async fn fetch_and_cache(&self, key: &CacheKey) -> PlazaResult<Option<CacheRead<V>>> {
        // Our own fetch supersedes a background one for the same key.
        self.store.cancel_pending_refetch(key).await;
        match self.refetcher.refetch(key).await? {
            Some(value) => {
                let version = self.store.set(key, value.clone(), EntryOrigin::Server).await;
                Ok(Some(CacheRead::from_server(value, version)))
            }
            None => Ok(None),
        }
    }
}

impl<V, S, R> Clone for QueryCache<V, S, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            refetcher: Arc::clone(&self.refetcher),
            config: self.config.clone(),
            _value: PhantomData,
        }
    }
}
