//! Comment threads: tree assembly and optimistic mutations.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use plaza_core::{
    insert_child, remove_record, update_record, Comment, Endpoint, Payload, RecordId, UserSummary,
};
use plaza_sync::MutationRequest;
use serde_json::json;

use crate::keys;
use crate::snapshot::Snapshot;

/// Assemble a comment thread from a flat, nested or mixed list.
///
/// A payload that is already nested and carries no flat replies is returned
/// as its roots. Otherwise replies are attached under their parent once,
/// keeping any children a root already carried. Replies whose parent is not
/// in the list are dropped.
pub fn build_comment_tree(comments: Vec<Comment>) -> Vec<Comment> {
    let has_flat_replies = comments.iter().any(|c| c.parent_id.is_some());
    let has_nested_roots = comments
        .iter()
        .any(|c| c.parent_id.is_none() && !c.child_comments.is_empty());
    if has_nested_roots && !has_flat_replies {
        return comments;
    }

    let mut order: Vec<RecordId> = Vec::new();
    let mut by_id: HashMap<RecordId, Comment> = HashMap::new();
    for mut comment in comments {
        if comment.parent_id.is_some() {
            // Replies are rebuilt from the flat entries.
            comment.child_comments.clear();
        }
        if !by_id.contains_key(&comment.id) {
            order.push(comment.id);
        }
        by_id.insert(comment.id, comment);
    }

    let mut replies: HashMap<RecordId, Vec<RecordId>> = HashMap::new();
    let mut roots: Vec<RecordId> = Vec::new();
    for id in &order {
        let Some(comment) = by_id.get(id) else {
            continue;
        };
        match comment.parent_id {
            Some(parent) if by_id.contains_key(&parent) => {
                let siblings = replies.entry(parent).or_default();
                if !siblings.contains(id) {
                    siblings.push(*id);
                }
            }
            Some(_) => {}
            None => roots.push(*id),
        }
    }

    let mut visited = HashSet::new();
    roots
        .into_iter()
        .filter_map(|id| assemble(id, &mut by_id, &replies, &mut visited))
        .collect()
}

fn assemble(
    id: RecordId,
    by_id: &mut HashMap<RecordId, Comment>,
    replies: &HashMap<RecordId, Vec<RecordId>>,
    visited: &mut HashSet<RecordId>,
) -> Option<Comment> {
    if !visited.insert(id) {
        return None;
    }
    let mut comment = by_id.remove(&id)?;
    for child_id in replies.get(&id).into_iter().flatten() {
        if comment.child_comments.iter().any(|c| c.id == *child_id) {
            continue;
        }
        if let Some(child) = assemble(*child_id, by_id, replies, visited) {
            comment.child_comments.push(child);
        }
    }
    Some(comment)
}

/// A comment or reply to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub post_id: RecordId,
    pub content: String,
    /// Parent comment when replying.
    pub parent_id: Option<RecordId>,
    /// Username shown as the reply target.
    pub reply_to_username: Option<String>,
}

impl NewComment {
    pub fn new(post_id: RecordId, content: impl Into<String>) -> Self {
        Self {
            post_id,
            content: content.into(),
            parent_id: None,
            reply_to_username: None,
        }
    }

    pub fn reply_to(mut self, parent_id: RecordId, username: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id);
        self.reply_to_username = Some(username.into());
        self
    }
}

/// Create a comment. The placeholder is appended to the thread (under its
/// parent when replying) and the post's comment counter is bumped in the
/// feed.
pub fn create_comment(
    input: &NewComment,
    placeholder: RecordId,
    author: &UserSummary,
) -> MutationRequest<Snapshot> {
    let post_id = input.post_id;
    let optimistic = Comment {
        id: placeholder,
        post_id,
        parent_id: input.parent_id,
        content: input.content.clone(),
        user: author.clone(),
        reply_to_username: input.reply_to_username.clone(),
        reacted_by_current_user: false,
        reaction_count: 0,
        child_comments: Vec::new(),
        created_at: Some(Utc::now().naive_utc()),
    };

    MutationRequest::new(
        "create_comment",
        Endpoint::post("comments"),
        Payload::Json(json!({
            "content": input.content,
            "postId": post_id,
            "parentId": input.parent_id,
        })),
    )
    .placeholder(placeholder)
    .predict(keys::comments_for_post(post_id), move |snapshot: &Snapshot| {
        snapshot.with_comments(|comments| append_comment(comments, optimistic.clone()))
    })
    .predict(keys::feeds(), move |snapshot: &Snapshot| {
        snapshot.with_posts(|posts| {
            update_record(posts, post_id, |post| {
                post.total_comments = post.total_comments.saturating_add(1);
            });
        })
    })
    .invalidate(keys::comments_for_post(post_id))
    .invalidate(keys::feeds())
}

fn append_comment(comments: &mut Vec<Comment>, comment: Comment) {
    let Some(parent) = comment.parent_id else {
        comments.push(comment);
        return;
    };
    // Parent not loaded: keep the reply visible at the top level.
    if let Err(orphan) = insert_child(comments, parent, comment) {
        comments.push(orphan);
    }
}

/// Number of comments in the thread rooted at `comment`, itself included.
pub fn thread_size(comment: &Comment) -> u32 {
    comment
        .child_comments
        .iter()
        .fold(1u32, |total, child| total.saturating_add(thread_size(child)))
}

/// Delete a comment and its replies. `removed` is the size of the deleted
/// thread (see [`thread_size`]) and comes off the post's comment counter.
pub fn delete_comment(post_id: RecordId, comment_id: RecordId, removed: u32) -> MutationRequest<Snapshot> {
    MutationRequest::new(
        "delete_comment",
        Endpoint::delete(format!("comments/{comment_id}")),
        Payload::Empty,
    )
    .expect_data()
    .predict(keys::comments_for_post(post_id), move |snapshot: &Snapshot| {
        snapshot.with_comments(|comments| {
            remove_record(comments, comment_id);
        })
    })
    .predict(keys::feeds(), move |snapshot: &Snapshot| {
        snapshot.with_posts(|posts| {
            update_record(posts, post_id, |post| {
                post.total_comments = post.total_comments.saturating_sub(removed);
            });
        })
    })
    .invalidate(keys::comments_for_post(post_id))
    .invalidate(keys::feeds())
}

/// Toggle the current user's reaction on a comment anywhere in the thread.
pub fn toggle_comment_reaction(post_id: RecordId, comment_id: RecordId) -> MutationRequest<Snapshot> {
    MutationRequest::new(
        "toggle_comment_reaction",
        Endpoint::post(format!("/comments/{comment_id}/reaction")),
        Payload::Empty,
    )
    .expect_data()
    .predict(keys::comments_for_post(post_id), move |snapshot: &Snapshot| {
        snapshot.with_comments(|comments| {
            update_record(comments, comment_id, Comment::toggle_reaction);
        })
    })
    .invalidate(keys::comments_for_post(post_id))
    .invalidate(keys::feeds())
}
