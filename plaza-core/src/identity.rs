//! Identity types for Plaza records and mutations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier of a domain record.
///
/// Server-assigned identifiers are strictly positive. Records created
/// optimistically carry a negative placeholder until the server answers, so
/// the two spaces can never collide inside one cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Build a server identifier, rejecting zero and negative values.
    pub fn server(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    pub const fn is_placeholder(&self) -> bool {
        self.0 < 0
    }

    pub const fn is_server(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Allocator for placeholder record identifiers: `-1, -2, -3, ...`.
///
/// One allocator is shared per client so placeholders stay unique across
/// every cached collection for the lifetime of the process.
#[derive(Debug)]
pub struct PlaceholderIds {
    next: AtomicI64,
}

impl PlaceholderIds {
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(-1),
        }
    }

    pub fn next_id(&self) -> RecordId {
        RecordId(self.next.fetch_sub(1, Ordering::Relaxed))
    }
}

impl Default for PlaceholderIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of one dispatched mutation (UUIDv7, sortable by dispatch time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(Uuid);

impl MutationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
