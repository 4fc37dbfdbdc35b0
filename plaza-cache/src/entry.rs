//! Cache entries and write versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Store-wide write counter stamped on every entry write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    pub const ZERO: Version = Version(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }

    pub fn is_newer_than(&self, other: &Version) -> bool {
        self.0 > other.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Who wrote an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryOrigin {
    /// Fetched from the server.
    Server,
    /// Predicted value written before the mutation settled.
    Speculative,
    /// Restored after a failed mutation.
    Rollback,
    /// Placeholder identifiers replaced after a successful mutation.
    Reconciled,
}

/// A cached value with its version and freshness metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub version: Version,
    pub updated_at: DateTime<Utc>,
    pub stale: bool,
    pub origin: EntryOrigin,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, version: Version, origin: EntryOrigin) -> Self {
        Self {
            value,
            version,
            updated_at: Utc::now(),
            stale: false,
            origin,
        }
    }

    /// Time since the entry was written.
    pub fn staleness(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.updated_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_speculative(&self) -> bool {
        self.origin == EntryOrigin::Speculative
    }
}
