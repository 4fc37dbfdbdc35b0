//! Read cache keyed by logical resource identifiers.
//!
//! # Design Philosophy
//!
//! Every entry carries a [`Version`] stamped by the store on each write and a
//! `stale` flag set by invalidation. Writers that raced a newer write (a late
//! background refetch, a rollback after an external overwrite) detect it by
//! comparing versions instead of trusting timing.
//!
//! Invalidation marks an entry stale and, when a [`Refetcher`] is installed,
//! schedules a background refetch on the tokio runtime. A refetch only lands
//! if the entry was not written or cancelled while it was in flight.
//!
//! Reads through [`QueryCache`] state their staleness tolerance with
//! [`Freshness`] and get a [`CacheRead<V>`] carrying the metadata back.
//!
//! # Example
//!
//! ```ignore
//! let store = InMemoryCacheStore::with_refetcher(refetcher.clone(), CacheConfig::default());
//! let queries = QueryCache::new(Arc::new(store), refetcher, CacheConfig::default());
//!
//! let read = queries.fetch(&CacheKey::new("posts").with("feeds"), Freshness::Consistent).await?;
//! ```

pub mod entry;
pub mod freshness;
pub mod key;
pub mod memory;
pub mod query;
pub mod traits;

pub use entry::{CacheEntry, EntryOrigin, Version};
pub use freshness::{CacheRead, Freshness};
pub use key::{CacheKey, KeySegment};
pub use memory::InMemoryCacheStore;
pub use query::{CacheConfig, QueryCache};
pub use traits::{CacheStats, CacheStore, Refetcher};
