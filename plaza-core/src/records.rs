//! Domain records cached by the social client, plus tree helpers shared by
//! every record collection.
//!
//! Wire names are camelCase to match the REST API. Counters use saturating
//! arithmetic so a speculative decrement never underflows.

use crate::identity::RecordId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// RECORD TRAIT
// ============================================================================

/// A record identified by a [`RecordId`], optionally owning child records of
/// the same type (comment reply trees).
pub trait DomainRecord: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    fn record_id(&self) -> RecordId;

    fn set_record_id(&mut self, id: RecordId);

    /// Nested records of the same type.
    fn children(&self) -> &[Self] {
        &[]
    }

    /// Mutable access to nested records, `None` when the type has no tree.
    fn children_mut(&mut self) -> Option<&mut Vec<Self>> {
        None
    }

    /// Rewrite references to another record (e.g. a reply's parent id).
    /// Returns true when something changed.
    fn replace_reference(&mut self, _from: RecordId, _to: RecordId) -> bool {
        false
    }
}

/// Find a record anywhere in a (possibly nested) collection.
pub fn find_record<R: DomainRecord>(records: &[R], id: RecordId) -> Option<&R> {
    for record in records {
        if record.record_id() == id {
            return Some(record);
        }
        if let Some(found) = find_record(record.children(), id) {
            return Some(found);
        }
    }
    None
}

/// Apply `update` to the first record with `id`. Returns false when absent.
pub fn update_record<R, F>(records: &mut [R], id: RecordId, mut update: F) -> bool
where
    R: DomainRecord,
    F: FnMut(&mut R),
{
    update_in(records, id, &mut update)
}

fn update_in<R: DomainRecord>(records: &mut [R], id: RecordId, update: &mut dyn FnMut(&mut R)) -> bool {
    for record in records.iter_mut() {
        if record.record_id() == id {
            update(record);
            return true;
        }
        if let Some(children) = record.children_mut() {
            if update_in(children, id, update) {
                return true;
            }
        }
    }
    false
}

/// Remove the record with `id` (and its subtree) wherever it sits.
pub fn remove_record<R: DomainRecord>(records: &mut Vec<R>, id: RecordId) -> Option<R> {
    if let Some(index) = records.iter().position(|r| r.record_id() == id) {
        return Some(records.remove(index));
    }
    for record in records.iter_mut() {
        if let Some(children) = record.children_mut() {
            if let Some(removed) = remove_record(children, id) {
                return Some(removed);
            }
        }
    }
    None
}

/// Append `child` under the record with id `parent`.
///
/// Hands the child back when the parent is missing or cannot hold children.
pub fn insert_child<R: DomainRecord>(records: &mut [R], parent: RecordId, child: R) -> Result<(), R> {
    let mut pending = Some(child);
    insert_child_in(records, parent, &mut pending);
    match pending {
        Some(child) => Err(child),
        None => Ok(()),
    }
}

fn insert_child_in<R: DomainRecord>(records: &mut [R], parent: RecordId, pending: &mut Option<R>) {
    for record in records.iter_mut() {
        if pending.is_none() {
            return;
        }
        if record.record_id() == parent {
            if let Some(children) = record.children_mut() {
                if let Some(child) = pending.take() {
                    children.push(child);
                }
            }
            return;
        }
        if let Some(children) = record.children_mut() {
            insert_child_in(children, parent, pending);
        }
    }
}

/// Replace every occurrence of `from` (as an id or a reference) with `to`,
/// recursing into children. Returns the number of records rewritten.
pub fn replace_record_id<R: DomainRecord>(records: &mut [R], from: RecordId, to: RecordId) -> usize {
    let mut rewritten = 0;
    for record in records.iter_mut() {
        let mut touched = record.replace_reference(from, to);
        if record.record_id() == from {
            record.set_record_id(to);
            touched = true;
        }
        if touched {
            rewritten += 1;
        }
        if let Some(children) = record.children_mut() {
            rewritten += replace_record_id(children, from, to);
        }
    }
    rewritten
}

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionType {
    Like,
    Love,
    Haha,
    Wow,
    Sad,
    Angry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Public,
    Followers,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Followers => "FOLLOWERS",
            Self::Private => "PRIVATE",
        }
    }
}

/// Relationship between the current user and another account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowStatus {
    #[default]
    None,
    Pending,
    Accepted,
    Declined,
    /// A status this client does not know yet.
    #[serde(other)]
    Unknown,
}

// ============================================================================
// RECORDS
// ============================================================================

/// Author summary embedded in posts, comments and messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: RecordId,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: RecordId,
    pub post_id: RecordId,
    #[serde(default)]
    pub parent_id: Option<RecordId>,
    pub content: String,
    pub user: UserSummary,
    #[serde(default)]
    pub reply_to_username: Option<String>,
    #[serde(default)]
    pub reacted_by_current_user: bool,
    #[serde(default)]
    pub reaction_count: u32,
    #[serde(default)]
    pub child_comments: Vec<Comment>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl Comment {
    /// Flip the current user's reaction and adjust the counter.
    pub fn toggle_reaction(&mut self) {
        if self.reacted_by_current_user {
            self.reacted_by_current_user = false;
            self.reaction_count = self.reaction_count.saturating_sub(1);
        } else {
            self.reacted_by_current_user = true;
            self.reaction_count = self.reaction_count.saturating_add(1);
        }
    }
}

impl DomainRecord for Comment {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn set_record_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn children(&self) -> &[Self] {
        &self.child_comments
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Self>> {
        Some(&mut self.child_comments)
    }

    fn replace_reference(&mut self, from: RecordId, to: RecordId) -> bool {
        if self.parent_id == Some(from) {
            self.parent_id = Some(to);
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: RecordId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub user: Option<UserSummary>,
    #[serde(default)]
    pub reacted_by_current_user: bool,
    #[serde(default)]
    pub total_reactions: u32,
    #[serde(default)]
    pub total_comments: u32,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl Post {
    pub fn toggle_reaction(&mut self) {
        if self.reacted_by_current_user {
            self.reacted_by_current_user = false;
            self.total_reactions = self.total_reactions.saturating_sub(1);
        } else {
            self.reacted_by_current_user = true;
            self.total_reactions = self.total_reactions.saturating_add(1);
        }
    }
}

impl DomainRecord for Post {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn set_record_id(&mut self, id: RecordId) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReaction {
    pub id: RecordId,
    pub user_id: RecordId,
    pub username: String,
    #[serde(rename = "type")]
    pub reaction_type: ReactionType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: RecordId,
    pub conversation_id: RecordId,
    pub sender: UserSummary,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub reactions: Vec<MessageReaction>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl Message {
    /// Set, replace or clear the reaction left by `user`.
    pub fn set_reaction(&mut self, reaction: Option<MessageReaction>, user: RecordId) {
        self.reactions.retain(|r| r.user_id != user);
        if let Some(reaction) = reaction {
            self.reactions.push(reaction);
        }
    }
}

impl DomainRecord for Message {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn set_record_id(&mut self, id: RecordId) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: RecordId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub users: Vec<UserSummary>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl DomainRecord for Conversation {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn set_record_id(&mut self, id: RecordId) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: RecordId,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub sender: Option<UserSummary>,
    #[serde(default)]
    pub conversation_id: Option<RecordId>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl DomainRecord for Notification {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn set_record_id(&mut self, id: RecordId) {
        self.id = id;
    }
}

/// Account profile. Follow lists are lists of profiles whose `id` is the
/// identifier the follow endpoints expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: RecordId,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub followers_count: Option<u32>,
    #[serde(default)]
    pub following_count: Option<u32>,
}

impl DomainRecord for Profile {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn set_record_id(&mut self, id: RecordId) {
        self.id = id;
    }
}
