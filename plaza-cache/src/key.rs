//! Composite cache keys.

use plaza_core::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One segment of a [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySegment {
    Int(i64),
    Str(String),
}

impl KeySegment {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Str(_) => None,
        }
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for KeySegment {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<RecordId> for KeySegment {
    fn from(id: RecordId) -> Self {
        Self::Int(id.as_i64())
    }
}

/// Cache key: a resource type followed by the scope inside that resource,
/// e.g. `comments/post/42`.
///
/// The resource segment is always a string; keys can only be started from
/// [`CacheKey::new`]. A key is a prefix of another when its segments are a
/// leading run of the other's, which is what bulk invalidation matches on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    segments: Vec<KeySegment>,
}

impl CacheKey {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            segments: vec![KeySegment::Str(resource.into())],
        }
    }

    /// Append a scope segment.
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn resource(&self) -> &str {
        self.segments
            .first()
            .and_then(KeySegment::as_str)
            .unwrap_or_default()
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    /// Segments after the resource type.
    pub fn scope(&self) -> &[KeySegment] {
        self.segments.get(1..).unwrap_or_default()
    }

    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_joins_segments() {
        let key = CacheKey::new("comments").with("post").with(42);
        assert_eq!(key.to_string(), "comments/post/42");
        assert_eq!(key.resource(), "comments");
        assert_eq!(key.scope().len(), 2);
    }

    #[test]
    fn test_prefix_matching() {
        let chat = CacheKey::new("chat");
        let conversation = CacheKey::new("chat").with("conversation").with(7);
        assert!(conversation.starts_with(&chat));
        assert!(conversation.starts_with(&conversation));
        assert!(!chat.starts_with(&conversation));
        assert!(!CacheKey::new("chatter").starts_with(&chat));
    }

    #[test]
    fn test_int_and_string_segments_differ() {
        let a = CacheKey::new("posts").with(7);
        let b = CacheKey::new("posts").with("7");
        assert_ne!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_record_id_segment() {
        let key = CacheKey::new("posts").with(RecordId::new(9));
        assert_eq!(key.segments()[1].as_int(), Some(9));
    }

    proptest! {
        #[test]
        fn prop_every_key_extends_its_resource(resource in "[a-z]{1,8}", ids in proptest::collection::vec(any::<i64>(), 0..4)) {
            let mut key = CacheKey::new(resource.clone());
            for id in ids {
                key = key.with(id);
            }
            prop_assert!(key.starts_with(&CacheKey::new(resource)));
        }
    }
}
