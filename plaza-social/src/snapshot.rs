//! The value type held by the social cache.

use plaza_core::{
    replace_record_id, Comment, Conversation, FollowStatus, Message, Notification, Post, Profile,
    RecordId,
};
use plaza_sync::Reconcile;
use serde::{Deserialize, Serialize};

/// One cached server response. Every query key maps to exactly one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "records", rename_all = "snake_case")]
pub enum Snapshot {
    Comments(Vec<Comment>),
    Posts(Vec<Post>),
    Messages(Vec<Message>),
    Conversations(Vec<Conversation>),
    Profiles(Vec<Profile>),
    Notifications(Vec<Notification>),
    Profile(Profile),
    Post(Post),
    FollowStatus(FollowStatus),
}

impl Snapshot {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Comments(_) => "comments",
            Self::Posts(_) => "posts",
            Self::Messages(_) => "messages",
            Self::Conversations(_) => "conversations",
            Self::Profiles(_) => "profiles",
            Self::Notifications(_) => "notifications",
            Self::Profile(_) => "profile",
            Self::Post(_) => "post",
            Self::FollowStatus(_) => "follow_status",
        }
    }

    pub fn as_comments(&self) -> Option<&[Comment]> {
        match self {
            Self::Comments(records) => Some(records),
            _ => None,
        }
    }

    pub fn as_posts(&self) -> Option<&[Post]> {
        match self {
            Self::Posts(records) => Some(records),
            _ => None,
        }
    }

    pub fn as_messages(&self) -> Option<&[Message]> {
        match self {
            Self::Messages(records) => Some(records),
            _ => None,
        }
    }

    pub fn as_profiles(&self) -> Option<&[Profile]> {
        match self {
            Self::Profiles(records) => Some(records),
            _ => None,
        }
    }

    // Copy-on-write helpers for predictions. A snapshot of another kind is
    // returned unchanged.

    pub fn with_comments(&self, update: impl FnOnce(&mut Vec<Comment>)) -> Self {
        let mut next = self.clone();
        if let Self::Comments(records) = &mut next {
            update(records);
        }
        next
    }

    pub fn with_posts(&self, update: impl FnOnce(&mut Vec<Post>)) -> Self {
        let mut next = self.clone();
        if let Self::Posts(records) = &mut next {
            update(records);
        }
        next
    }

    pub fn with_messages(&self, update: impl FnOnce(&mut Vec<Message>)) -> Self {
        let mut next = self.clone();
        if let Self::Messages(records) = &mut next {
            update(records);
        }
        next
    }

    pub fn with_profiles(&self, update: impl FnOnce(&mut Vec<Profile>)) -> Self {
        let mut next = self.clone();
        if let Self::Profiles(records) = &mut next {
            update(records);
        }
        next
    }
}

impl Reconcile for Snapshot {
    fn replace_record_id(&mut self, from: RecordId, to: RecordId) -> usize {
        match self {
            Self::Comments(records) => replace_record_id(records, from, to),
            Self::Posts(records) => replace_record_id(records, from, to),
            Self::Messages(records) => replace_record_id(records, from, to),
            Self::Conversations(records) => replace_record_id(records, from, to),
            Self::Profiles(records) => replace_record_id(records, from, to),
            Self::Notifications(records) => replace_record_id(records, from, to),
            Self::Profile(profile) => replace_record_id(std::slice::from_mut(profile), from, to),
            Self::Post(post) => replace_record_id(std::slice::from_mut(post), from, to),
            Self::FollowStatus(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_test_utils::fixtures::{comment, message, post, reply};

    #[test]
    fn test_with_helpers_ignore_other_kinds() {
        let posts = Snapshot::Posts(vec![post(1)]);
        let unchanged = posts.with_comments(|comments| comments.clear());
        assert_eq!(unchanged, posts);

        let cleared = posts.with_posts(|records| records.clear());
        assert_eq!(cleared, Snapshot::Posts(Vec::new()));
        assert_eq!(posts.as_posts().map(<[Post]>::len), Some(1));
    }

    #[test]
    fn test_reconcile_rewrites_nested_placeholder() {
        let mut root = comment(10, 42, "root");
        root.child_comments.push(reply(-1, 42, 10, "pending"));
        root.child_comments[0]
            .child_comments
            .push(reply(-2, 42, -1, "reply to pending"));
        let mut snapshot = Snapshot::Comments(vec![root]);

        assert_eq!(snapshot.replace_record_id(RecordId::new(-1), RecordId::new(101)), 2);
        let comments = snapshot.as_comments().unwrap();
        let rewritten = &comments[0].child_comments[0];
        assert_eq!(rewritten.id, RecordId::new(101));
        assert_eq!(rewritten.child_comments[0].parent_id, Some(RecordId::new(101)));
    }

    #[test]
    fn test_reconcile_messages() {
        let mut snapshot = Snapshot::Messages(vec![message(5, 7, "a"), message(-3, 7, "b")]);
        assert_eq!(snapshot.replace_record_id(RecordId::new(-3), RecordId::new(55)), 1);
        assert_eq!(snapshot.as_messages().unwrap()[1].id, RecordId::new(55));
    }

    #[test]
    fn test_serde_tagging() {
        let value = serde_json::to_value(Snapshot::Posts(Vec::new())).unwrap();
        assert_eq!(value, serde_json::json!({ "kind": "posts", "records": [] }));
    }
}
