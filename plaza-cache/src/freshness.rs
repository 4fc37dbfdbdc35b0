//! Freshness contracts for cache reads.
//!
//! Callers state how stale a value they are willing to show, and reads carry
//! the metadata needed to check it afterwards.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::entry::{CacheEntry, EntryOrigin, Version};

/// Freshness requirement for cache reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Accept cached data (even if invalidated) up to the given age.
    ///
    /// Use this for screens that render immediately and let the background
    /// refetch catch up.
    BestEffort {
        /// Maximum acceptable age of the cached value.
        max_staleness: Duration,
    },

    /// Accept cached data only while it has not been invalidated; otherwise
    /// refetch before returning.
    #[default]
    Consistent,
}

impl Freshness {
    pub fn best_effort(max_staleness: Duration) -> Self {
        Self::BestEffort { max_staleness }
    }

    pub fn consistent() -> Self {
        Self::Consistent
    }

    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::BestEffort { .. })
    }

    pub fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent)
    }

    /// Get the max staleness for BestEffort, or zero for Consistent.
    pub fn max_staleness(&self) -> Duration {
        match self {
            Self::BestEffort { max_staleness } => *max_staleness,
            Self::Consistent => Duration::ZERO,
        }
    }

    /// Whether a cached entry satisfies this requirement.
    pub fn accepts<V>(&self, entry: &CacheEntry<V>) -> bool {
        match self {
            Self::BestEffort { max_staleness } => entry.staleness() <= *max_staleness,
            Self::Consistent => !entry.stale,
        }
    }
}

/// Result of a cache read, carrying freshness metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    version: Version,
    cached_at: DateTime<Utc>,
    stale: bool,
    origin: EntryOrigin,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// Create a read from a cache hit.
    pub fn from_cache(entry: CacheEntry<T>) -> Self {
        Self {
            value: entry.value,
            version: entry.version,
            cached_at: entry.updated_at,
            stale: entry.stale,
            origin: entry.origin,
            was_cache_hit: true,
        }
    }

    /// Create a read from a server fetch (cache miss).
    pub fn from_server(value: T, version: Version) -> Self {
        Self {
            value,
            version,
            cached_at: Utc::now(),
            stale: false,
            origin: EntryOrigin::Server,
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Check if the data was cached at or after the given time.
    pub fn is_fresh_as_of(&self, timestamp: DateTime<Utc>) -> bool {
        self.cached_at >= timestamp
    }

    /// Duration since the value was cached.
    pub fn staleness(&self) -> Duration {
        let now = Utc::now();
        if now > self.cached_at {
            (now - self.cached_at).to_std().unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        }
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    /// True when the entry was invalidated and a refresh is pending.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// True when the value is a prediction that has not settled yet.
    pub fn is_speculative(&self) -> bool {
        self.origin == EntryOrigin::Speculative
    }

    pub fn origin(&self) -> EntryOrigin {
        self.origin
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            version: self.version,
            cached_at: self.cached_at,
            stale: self.stale,
            origin: self.origin,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_default_is_consistent() {
        assert_eq!(Freshness::default(), Freshness::Consistent);
    }

    #[test]
    fn test_freshness_best_effort() {
        let f = Freshness::best_effort(Duration::from_secs(60));
        assert!(f.is_best_effort());
        assert!(!f.is_consistent());
        assert_eq!(f.max_staleness(), Duration::from_secs(60));
    }

    #[test]
    fn test_freshness_consistent_max_staleness() {
        assert_eq!(Freshness::consistent().max_staleness(), Duration::ZERO);
    }

    #[test]
    fn test_consistent_rejects_invalidated_entry() {
        let mut entry = CacheEntry::new("v", Version::new(1), EntryOrigin::Server);
        assert!(Freshness::Consistent.accepts(&entry));
        entry.stale = true;
        assert!(!Freshness::Consistent.accepts(&entry));
        assert!(Freshness::best_effort(Duration::from_secs(60)).accepts(&entry));
    }

    #[test]
    fn test_best_effort_rejects_old_entry() {
        let mut entry = CacheEntry::new("v", Version::new(1), EntryOrigin::Server);
        entry.updated_at = Utc::now() - chrono::Duration::seconds(120);
        assert!(!Freshness::best_effort(Duration::from_secs(60)).accepts(&entry));
    }

    #[test]
    fn test_cache_read_from_cache() {
        let entry = CacheEntry::new(42, Version::new(7), EntryOrigin::Speculative);
        let read = CacheRead::from_cache(entry);
        assert!(read.was_cache_hit());
        assert!(read.is_speculative());
        assert_eq!(read.version(), Version::new(7));
        assert_eq!(*read.value(), 42);
    }

    #[test]
    fn test_cache_read_from_server() {
        let read = CacheRead::from_server("x", Version::new(2));
        assert!(read.was_cache_miss());
        assert!(!read.is_stale());
        assert_eq!(read.origin(), EntryOrigin::Server);
        assert!(read.staleness() < Duration::from_secs(1));
    }

    #[test]
    fn test_cache_read_map() {
        let read = CacheRead::from_server(21, Version::new(1));
        let mapped = read.map(|x| x * 2);
        assert_eq!(mapped.into_value(), 42);
    }

    #[test]
    fn test_cache_read_is_fresh_as_of() {
        let before = Utc::now() - chrono::Duration::seconds(1);
        let read = CacheRead::from_server(1, Version::new(1));
        assert!(read.is_fresh_as_of(before));
    }
}
