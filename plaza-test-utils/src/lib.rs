//! Plaza Test Utilities
//!
//! Shared test infrastructure for the Plaza workspace:
//! - A scripted [`MockTransport`] whose responses can be held back to observe
//!   the pending window of a mutation
//! - A [`MockRefetcher`] serving canned server truth to the cache store
//! - Proptest generators for domain records
//! - Fixtures and assertions

pub use plaza_core::{
    Comment, Endpoint, Message, Method, Payload, PlazaError, PlazaResult, Post, Profile, RecordId,
    RemoteError, Transport, UserSummary,
};

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use plaza_cache::{CacheKey, Refetcher};
use serde_json::{json, Value};
use tokio::sync::{oneshot, Notify};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

/// A call received by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    pub payload: Payload,
}

enum Scripted {
    Ready(Result<Value, RemoteError>),
    Gated(oneshot::Receiver<Result<Value, RemoteError>>),
}

/// Releases one held-back response.
pub struct ResponseGate {
    sender: oneshot::Sender<Result<Value, RemoteError>>,
}

impl ResponseGate {
    pub fn succeed(self, body: Value) {
        let _ = self.sender.send(Ok(body));
    }

    pub fn fail(self, error: RemoteError) {
        let _ = self.sender.send(Err(error));
    }
}

/// Transport double.
///
/// Routed endpoints (typically GETs used by refetches) always answer with
/// their configured response. Every other call consumes the next scripted
/// response in order; a call with nothing scripted fails as a network error.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), Result<Value, RemoteError>>>,
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
    notify: Notify,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call to `endpoint` with `body`.
    pub fn route(&self, endpoint: Endpoint, body: Value) {
        lock(&self.routes).insert((endpoint.method, endpoint.path), Ok(body));
    }

    pub fn route_error(&self, endpoint: Endpoint, error: RemoteError) {
        lock(&self.routes).insert((endpoint.method, endpoint.path), Err(error));
    }

    /// Queue a successful response.
    pub fn respond(&self, body: Value) {
        lock(&self.script).push_back(Scripted::Ready(Ok(body)));
    }

    /// Queue a failed response.
    pub fn fail(&self, error: RemoteError) {
        lock(&self.script).push_back(Scripted::Ready(Err(error)));
    }

    /// Queue a response that is held until the returned gate is released.
    pub fn respond_later(&self) -> ResponseGate {
        let (sender, receiver) = oneshot::channel();
        lock(&self.script).push_back(Scripted::Gated(receiver));
        ResponseGate { sender }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.endpoint.method == method && call.endpoint.path == path)
            .count()
    }

    /// Wait until at least `count` calls have been received.
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            let seen = lock(&self.calls).len();
            if seen >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(&self, endpoint: &Endpoint, payload: &Payload) -> Result<Value, RemoteError> {
        lock(&self.calls).push(RecordedCall {
            endpoint: endpoint.clone(),
            payload: payload.clone(),
        });
        self.notify.notify_waiters();

        let routed = lock(&self.routes)
            .get(&(endpoint.method, endpoint.path.clone()))
            .cloned();
        if let Some(response) = routed {
            return response;
        }

        let next = lock(&self.script).pop_front();
        match next {
            Some(Scripted::Ready(response)) => response,
            Some(Scripted::Gated(receiver)) => receiver
                .await
                .unwrap_or_else(|_| Err(RemoteError::network("response gate dropped"))),
            None => Err(RemoteError::network(format!("no scripted response for {endpoint}"))),
        }
    }
}

// ============================================================================
// MOCK REFETCHER
// ============================================================================

/// Serves canned server truth per cache key.
pub struct MockRefetcher<V> {
    values: Mutex<HashMap<CacheKey, V>>,
    calls: Mutex<Vec<CacheKey>>,
}

impl<V: Clone> MockRefetcher<V> {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, key: CacheKey, value: V) {
        lock(&self.values).insert(key, value);
    }

    pub fn calls(&self) -> Vec<CacheKey> {
        lock(&self.calls).clone()
    }
}

impl<V: Clone> Default for MockRefetcher<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> Refetcher<V> for MockRefetcher<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn refetch(&self, key: &CacheKey) -> PlazaResult<Option<V>> {
        lock(&self.calls).push(key.clone());
        Ok(lock(&self.values).get(key).cloned())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Plaza records.

    use super::*;
    use plaza_core::ReactionType;
    use proptest::prelude::*;

    pub fn arb_reaction_type() -> impl Strategy<Value = ReactionType> {
        prop_oneof![
            Just(ReactionType::Like),
            Just(ReactionType::Love),
            Just(ReactionType::Haha),
            Just(ReactionType::Wow),
            Just(ReactionType::Sad),
            Just(ReactionType::Angry),
        ]
    }

    pub fn arb_content() -> impl Strategy<Value = String> {
        "[a-z][a-z ]{0,24}"
    }

    /// Root comments with up to two replies each. Ids are positive and
    /// unique across the whole tree, assigned in depth-first order.
    pub fn arb_comment_tree(post_id: i64) -> impl Strategy<Value = Vec<Comment>> {
        let reply = (arb_content(), any::<bool>(), 0u32..50);
        let root = (
            arb_content(),
            any::<bool>(),
            0u32..50,
            proptest::collection::vec(reply, 0..3),
        );
        proptest::collection::vec(root, 0..6).prop_map(move |roots| {
            let mut next_id = 1;
            let mut tree = Vec::with_capacity(roots.len());
            for (content, reacted, count, replies) in roots {
                let root_id = next_id;
                next_id += 1;
                let mut root = fixtures::comment(root_id, post_id, &content);
                root.reacted_by_current_user = reacted;
                root.reaction_count = count;
                for (content, reacted, count) in replies {
                    let mut child = fixtures::reply(next_id, post_id, root_id, &content);
                    next_id += 1;
                    child.reacted_by_current_user = reacted;
                    child.reaction_count = count;
                    root.child_comments.push(child);
                }
                tree.push(root);
            }
            tree
        })
    }

    /// Feed posts with unique positive ids.
    pub fn arb_feed() -> impl Strategy<Value = Vec<Post>> {
        proptest::collection::vec((any::<bool>(), 0u32..500, 0u32..500), 0..8).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (reacted, reactions, comments))| {
                    let mut post = fixtures::post(i as i64 + 1);
                    post.reacted_by_current_user = reacted;
                    post.total_reactions = reactions;
                    post.total_comments = comments;
                    post
                })
                .collect()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and envelopes.

    use super::*;
    use plaza_core::Visibility;

    pub fn user(id: i64, username: &str) -> UserSummary {
        UserSummary {
            id: RecordId::new(id),
            username: username.to_string(),
            full_name: None,
            avatar_url: None,
        }
    }

    /// The signed-in user in every fixture.
    pub fn current_user() -> UserSummary {
        user(1, "ana")
    }

    pub fn comment(id: i64, post_id: i64, content: &str) -> Comment {
        Comment {
            id: RecordId::new(id),
            post_id: RecordId::new(post_id),
            parent_id: None,
            content: content.to_string(),
            user: current_user(),
            reply_to_username: None,
            reacted_by_current_user: false,
            reaction_count: 0,
            child_comments: Vec::new(),
            created_at: None,
        }
    }

    pub fn reply(id: i64, post_id: i64, parent_id: i64, content: &str) -> Comment {
        Comment {
            parent_id: Some(RecordId::new(parent_id)),
            reply_to_username: Some(current_user().username),
            ..comment(id, post_id, content)
        }
    }

    pub fn post(id: i64) -> Post {
        Post {
            id: RecordId::new(id),
            content: format!("post {id}"),
            visibility: Visibility::Public,
            media_urls: Vec::new(),
            user: Some(user(2, "bo")),
            reacted_by_current_user: false,
            total_reactions: 0,
            total_comments: 0,
            created_at: None,
        }
    }

    pub fn message(id: i64, conversation_id: i64, content: &str) -> Message {
        Message {
            id: RecordId::new(id),
            conversation_id: RecordId::new(conversation_id),
            sender: current_user(),
            content: Some(content.to_string()),
            media_urls: Vec::new(),
            reactions: Vec::new(),
            created_at: None,
        }
    }

    pub fn profile(id: i64, username: &str) -> Profile {
        Profile {
            id: RecordId::new(id),
            username: username.to_string(),
            full_name: None,
            avatar_url: None,
            bio: None,
            website: None,
            followers_count: None,
            following_count: None,
        }
    }

    /// Success envelope around `data`.
    pub fn ok_envelope(data: Value) -> Value {
        json!({ "data": data, "message": "Success", "status": 200 })
    }

    /// Success envelope around a serializable record or list.
    pub fn ok_records<T: serde::Serialize>(records: &T) -> Value {
        ok_envelope(serde_json::to_value(records).unwrap_or(Value::Null))
    }

    pub fn server_error(status: u16, error: &str, message: &str) -> RemoteError {
        RemoteError::Server {
            message: message.to_string(),
            error: error.to_string(),
            status,
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Plaza-specific results.

    use super::*;

    /// Assert that a result failed with a remote error of the given status.
    #[track_caller]
    pub fn assert_remote_status<T: std::fmt::Debug>(result: &PlazaResult<T>, status: u16) {
        match result {
            Err(PlazaError::Remote(err)) => assert_eq!(err.status(), status, "Wrong status in {err:?}"),
            other => panic!("Expected remote error with status {status}, got: {other:?}"),
        }
    }

    /// Assert that no placeholder id is left anywhere in a comment tree.
    #[track_caller]
    pub fn assert_no_placeholders(comments: &[Comment]) {
        for comment in comments {
            assert!(
                !comment.id.is_placeholder(),
                "Placeholder {} left in comment tree",
                comment.id
            );
            if let Some(parent) = comment.parent_id {
                assert!(!parent.is_placeholder(), "Placeholder parent {parent} left in comment tree");
            }
            assert_no_placeholders(&comment.child_comments);
        }
    }
}
