//! Server refetch for social query keys.

use std::sync::Arc;

use async_trait::async_trait;
use plaza_cache::{CacheKey, Refetcher};
use plaza_core::{CacheError, DataEnvelope, Payload, PlazaResult, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::comments::build_comment_tree;
use crate::keys::Route;
use crate::snapshot::Snapshot;

/// Loads the server's current value for a query key.
pub struct SocialRefetcher<T> {
    transport: Arc<T>,
}

impl<T: Transport> SocialRefetcher<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Fetch and decode one route.
    pub async fn load(&self, route: Route) -> PlazaResult<Snapshot> {
        let endpoint = route.endpoint();
        tracing::debug!(route = ?route, endpoint = %endpoint, "Refetching");
        let body = self.transport.call(&endpoint, &Payload::Empty).await?;

        let snapshot = match route {
            Route::CommentsForPost(_) => Snapshot::Comments(build_comment_tree(decode(body)?)),
            Route::Feeds | Route::OwnPosts | Route::UserPosts(_) => Snapshot::Posts(decode(body)?),
            Route::Conversation(_) => Snapshot::Messages(decode(body)?),
            Route::MyConversations => Snapshot::Conversations(decode(body)?),
            Route::FollowRequests | Route::Followers | Route::Following => {
                Snapshot::Profiles(decode(body)?)
            }
            Route::Profile | Route::OtherProfile(_) | Route::Session => Snapshot::Profile(decode(body)?),
            Route::Notifications => Snapshot::Notifications(decode(body)?),
            Route::PostDetail(_) => Snapshot::Post(decode(body)?),
            Route::FollowStatus(_) => Snapshot::FollowStatus(decode(body)?),
            Route::UserSearch(_) => Snapshot::Profiles(decode(body)?),
        };
        Ok(snapshot)
    }
}

fn decode<D: DeserializeOwned>(body: Value) -> PlazaResult<D> {
    Ok(DataEnvelope::decode_data(body)?)
}

#[async_trait]
impl<T: Transport + 'static> Refetcher<Snapshot> for SocialRefetcher<T> {
    async fn refetch(&self, key: &CacheKey) -> PlazaResult<Option<Snapshot>> {
        let route = Route::from_key(key).ok_or_else(|| CacheError::UnknownKey {
            key: key.to_string(),
        })?;
        self.load(route).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_core::{Endpoint, PlazaError, RecordId, RemoteError};
    use plaza_test_utils::fixtures::{comment, ok_records, post, profile, reply};
    use plaza_test_utils::MockTransport;
    use serde_json::json;

    use crate::keys;

    fn refetcher() -> (Arc<MockTransport>, SocialRefetcher<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        (Arc::clone(&transport), SocialRefetcher::new(transport))
    }

    #[tokio::test]
    async fn test_comments_are_assembled_into_a_tree() {
        let (transport, refetcher) = refetcher();
        transport.route(
            Endpoint::get("comments/post/42"),
            ok_records(&vec![comment(1, 42, "root"), reply(2, 42, 1, "reply")]),
        );

        let snapshot = refetcher
            .refetch(&keys::comments_for_post(RecordId::new(42)))
            .await
            .unwrap()
            .unwrap();
        let comments = snapshot.as_comments().unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].child_comments[0].id, RecordId::new(2));
    }

    #[tokio::test]
    async fn test_routes_decode_their_variant() {
        let (transport, refetcher) = refetcher();
        transport.route(Endpoint::get("/posts/me"), ok_records(&vec![post(5)]));
        transport.route(Endpoint::get("/accounts/profile"), ok_records(&profile(1, "ana")));
        transport.route(Endpoint::get("/follows/followers"), ok_records(&vec![profile(3, "cy")]));

        assert_eq!(
            refetcher.refetch(&keys::own_posts()).await.unwrap(),
            Some(Snapshot::Posts(vec![post(5)]))
        );
        assert_eq!(
            refetcher.refetch(&keys::profile()).await.unwrap(),
            Some(Snapshot::Profile(profile(1, "ana")))
        );
        assert_eq!(
            refetcher.refetch(&keys::followers()).await.unwrap(),
            Some(Snapshot::Profiles(vec![profile(3, "cy")]))
        );
    }

    #[tokio::test]
    async fn test_lookup_routes_decode_their_variant() {
        let (transport, refetcher) = refetcher();
        transport.route(Endpoint::get("/posts/9"), ok_records(&post(9)));
        transport.route(Endpoint::get("/follows/status/3"), json!({ "data": "PENDING" }));
        transport.route(
            Endpoint::get("/users/search?username=bo"),
            ok_records(&vec![profile(2, "bo"), profile(6, "bobby")]),
        );
        transport.route(Endpoint::get("/users/profile/bo"), ok_records(&profile(2, "bo")));

        assert_eq!(
            refetcher.refetch(&keys::post_detail(RecordId::new(9))).await.unwrap(),
            Some(Snapshot::Post(post(9)))
        );
        assert_eq!(
            refetcher.refetch(&keys::follow_status(RecordId::new(3))).await.unwrap(),
            Some(Snapshot::FollowStatus(plaza_core::FollowStatus::Pending))
        );
        let found = refetcher.refetch(&keys::user_search("bo")).await.unwrap().unwrap();
        assert_eq!(found.as_profiles().map(<[_]>::len), Some(2));
        assert_eq!(
            refetcher.refetch(&keys::other_profile("bo")).await.unwrap(),
            Some(Snapshot::Profile(profile(2, "bo")))
        );
    }

    #[tokio::test]
    async fn test_missing_data_is_malformed() {
        let (transport, refetcher) = refetcher();
        transport.route(Endpoint::get("/notifications"), json!({ "message": "ok" }));

        let err = refetcher.refetch(&keys::notifications()).await.unwrap_err();
        assert!(matches!(err, PlazaError::Remote(RemoteError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_unknown_key_rejected() {
        let (_transport, refetcher) = refetcher();
        let err = refetcher.refetch(&keys::chat()).await.unwrap_err();
        assert_eq!(
            err,
            PlazaError::Cache(CacheError::UnknownKey {
                key: "chat".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_server_failure_propagates() {
        let (transport, refetcher) = refetcher();
        transport.route_error(
            Endpoint::get("/chat/me"),
            RemoteError::Server {
                message: "nope".to_string(),
                error: "Unauthorized".to_string(),
                status: 401,
            },
        );
        let err = refetcher.refetch(&keys::my_conversations()).await.unwrap_err();
        assert_eq!(err.remote().map(RemoteError::status), Some(401));
    }
}
