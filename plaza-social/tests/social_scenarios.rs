//! End-to-end behaviour of the social client over a scripted transport.

use std::sync::Arc;

use plaza_cache::{CacheConfig, CacheStore, EntryOrigin};
use plaza_client::{
    AuthConfig, ClientConfig, ClientError, ConfigError, LogFormat, RefetchConfig, TelemetryConfig,
};
use plaza_core::{
    find_record, Comment, Endpoint, FollowStatus, Method, Payload, PlazaError, RecordId, Visibility,
};
use plaza_social::{
    comments, keys, Credentials, MediaFile, NewComment, NewPost, Registration, Snapshot, SocialClient,
};
use plaza_test_utils::assertions::{assert_no_placeholders, assert_remote_status};
use plaza_test_utils::fixtures::{
    comment, current_user, message, ok_envelope, ok_records, post, profile, reply, server_error,
};
use plaza_test_utils::MockTransport;
use serde_json::json;

const POST: RecordId = RecordId::new(42);
const CONVERSATION: RecordId = RecordId::new(7);

fn client(background_refetch: bool) -> (Arc<MockTransport>, SocialClient<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let cache = CacheConfig::default().with_background_refetch(background_refetch);
    let client = SocialClient::with_transport(Arc::clone(&transport), cache, current_user());
    (transport, client)
}

fn comments_endpoint() -> Endpoint {
    Endpoint::get("comments/post/42")
}

async fn cached(client: &SocialClient<MockTransport>, key: &plaza_cache::CacheKey) -> Snapshot {
    client.store().get(key).await.expect("key cached").value
}

async fn cached_comments(client: &SocialClient<MockTransport>) -> Vec<Comment> {
    match cached(client, &keys::comments_for_post(POST)).await {
        Snapshot::Comments(records) => records,
        other => panic!("expected comments, got {other:?}"),
    }
}

#[tokio::test]
async fn test_placeholder_comment_converges_on_server_id() {
    let (transport, client) = client(true);
    transport.route(comments_endpoint(), ok_records(&Vec::<Comment>::new()));
    assert!(client.comments(POST).await.unwrap().is_empty());

    let gate = transport.respond_later();
    let placeholder = client.next_placeholder();
    assert_eq!(placeholder, RecordId::new(-1));
    let request = comments::create_comment(&NewComment::new(POST, "hi"), placeholder, &client.current_user());
    let in_flight = client.begin(request).await.unwrap();

    let pending = cached_comments(&client).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, RecordId::new(-1));
    assert_eq!(pending[0].content, "hi");

    transport.route(comments_endpoint(), ok_records(&vec![comment(101, 42, "hi")]));
    gate.succeed(ok_envelope(json!({ "id": 101, "content": "hi", "postId": 42 })));
    let outcome = in_flight.settle().await.unwrap();
    assert_eq!(outcome.server_id, Some(RecordId::new(101)));

    client.await_refetches().await;
    let settled = client.comments(POST).await.unwrap();
    assert_eq!(settled, vec![comment(101, 42, "hi")]);
    assert_no_placeholders(&settled);
}

#[tokio::test]
async fn test_failed_comment_restores_empty_thread() {
    let (transport, client) = client(true);
    transport.route(comments_endpoint(), ok_records(&Vec::<Comment>::new()));
    client.comments(POST).await.unwrap();

    transport.fail(server_error(500, "Internal Server Error", "boom"));
    let result = client.create_comment(&NewComment::new(POST, "hi")).await;

    assert_remote_status(&result, 500);
    assert_eq!(cached_comments(&client).await, Vec::<Comment>::new());
    assert_eq!(client.coordinator().open_slots().await, 0);
}

#[tokio::test]
async fn test_nested_reply_is_reconciled_inside_the_tree() {
    let (transport, client) = client(false);
    transport.route(comments_endpoint(), ok_records(&vec![comment(10, 42, "root")]));
    client.comments(POST).await.unwrap();

    transport.respond(ok_envelope(json!({ "id": 101 })));
    let input = NewComment::new(POST, "agreed").reply_to(RecordId::new(10), "ana");
    let outcome = client.create_comment(&input).await.unwrap();
    assert_eq!(outcome.reconciled_records, 1);

    let entry = client.store().get(&keys::comments_for_post(POST)).await.unwrap();
    assert_eq!(entry.origin, EntryOrigin::Reconciled);
    assert!(entry.stale);
    let comments = entry.value.as_comments().unwrap().to_vec();
    let root = &comments[0];
    assert_eq!(root.child_comments.len(), 1);
    assert_eq!(root.child_comments[0].id, RecordId::new(101));
    assert_eq!(root.child_comments[0].parent_id, Some(RecordId::new(10)));
    assert_no_placeholders(&comments);

    let call = transport.calls().into_iter().find(|c| c.endpoint.method == Method::Post).unwrap();
    assert_eq!(
        call.payload,
        Payload::Json(json!({ "content": "agreed", "postId": 42, "parentId": 10 }))
    );
}

#[tokio::test]
async fn test_nested_reply_rolls_back_on_failure() {
    let (transport, client) = client(false);
    let mut root = comment(10, 42, "root");
    root.child_comments.push(reply(11, 42, 10, "first"));
    let thread = vec![root];
    transport.route(comments_endpoint(), ok_records(&thread));
    client.comments(POST).await.unwrap();

    transport.fail(server_error(403, "Forbidden", "Replies are closed"));
    let input = NewComment::new(POST, "late").reply_to(RecordId::new(11), "ana");
    let result = client.create_comment(&input).await;

    assert_remote_status(&result, 403);
    let entry = client.store().get(&keys::comments_for_post(POST)).await.unwrap();
    assert_eq!(entry.origin, EntryOrigin::Rollback);
    assert_eq!(entry.value, Snapshot::Comments(thread));
}

#[tokio::test]
async fn test_comment_reaction_toggles_and_rolls_back() {
    let (transport, client) = client(false);
    let mut target = comment(5, 42, "nice");
    target.reaction_count = 3;
    transport.route(comments_endpoint(), ok_records(&vec![target]));
    client.comments(POST).await.unwrap();

    let gate = transport.respond_later();
    let in_flight = client
        .begin(comments::toggle_comment_reaction(POST, RecordId::new(5)))
        .await
        .unwrap();
    let speculative = cached_comments(&client).await;
    assert!(speculative[0].reacted_by_current_user);
    assert_eq!(speculative[0].reaction_count, 4);

    gate.fail(server_error(500, "Server Error", "nope"));
    assert!(in_flight.settle().await.is_err());

    let restored = cached_comments(&client).await;
    assert!(!restored[0].reacted_by_current_user);
    assert_eq!(restored[0].reaction_count, 3);
    assert_eq!(transport.calls_to(Method::Post, "/comments/5/reaction"), 1);
}

#[tokio::test]
async fn test_post_reaction_in_feed_settles_and_invalidates() {
    let (transport, client) = client(false);
    transport.route(Endpoint::get("/posts/feeds"), ok_records(&vec![post(1), post(2)]));
    assert_eq!(client.feeds().await.unwrap().len(), 2);

    transport.respond(ok_envelope(json!({ "reacted": true })));
    client.toggle_post_reaction(RecordId::new(2)).await.unwrap();

    let entry = client.store().get(&keys::feeds()).await.unwrap();
    assert!(entry.stale);
    let posts = entry.value.as_posts().unwrap();
    assert!(posts[1].reacted_by_current_user);
    assert_eq!(posts[1].total_reactions, 1);
}

#[tokio::test]
async fn test_sent_message_replaces_placeholder() {
    let (transport, client) = client(false);
    transport.route(
        Endpoint::get("/chat/conversation/7"),
        ok_records(&vec![message(1, 7, "hello")]),
    );
    client.messages(CONVERSATION).await.unwrap();

    transport.respond(ok_envelope(json!({ "id": 55, "conversationId": 7 })));
    let outcome = client.send_message(CONVERSATION, "hey").await.unwrap();
    assert_eq!(outcome.server_id, Some(RecordId::new(55)));

    let messages = cached(&client, &keys::conversation(CONVERSATION)).await;
    let messages = messages.as_messages().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].id, RecordId::new(55));
    assert!(outcome.invalidated.contains(&keys::my_conversations()));
}

#[tokio::test]
async fn test_message_reaction_rolls_back_on_network_error() {
    let (transport, client) = client(false);
    let conversation = vec![message(1, 7, "hello")];
    transport.route(Endpoint::get("/chat/conversation/7"), ok_records(&conversation));
    client.messages(CONVERSATION).await.unwrap();

    let result = client
        .react_message(CONVERSATION, RecordId::new(1), plaza_core::ReactionType::Love)
        .await;

    assert!(matches!(&result, Err(PlazaError::Remote(err)) if err.is_network()));
    assert_eq!(
        cached(&client, &keys::conversation(CONVERSATION)).await,
        Snapshot::Messages(conversation)
    );
}

#[tokio::test]
async fn test_deleting_a_message_refreshes_every_chat_query() {
    let (transport, client) = client(false);
    transport.route(Endpoint::get("/chat/conversation/7"), ok_records(&vec![message(1, 7, "a")]));
    transport.route(Endpoint::get("/chat/me"), ok_records(&Vec::<serde_json::Value>::new()));
    client.messages(CONVERSATION).await.unwrap();
    client.conversations().await.unwrap();

    transport.respond(json!({ "message": "Message deleted", "status": 200 }));
    client.delete_message(CONVERSATION, RecordId::new(1)).await.unwrap();

    let me = client.store().get(&keys::my_conversations()).await.unwrap();
    assert!(me.stale);
    let thread = client.store().get(&keys::conversation(CONVERSATION)).await.unwrap();
    assert!(thread.stale);
    assert_eq!(thread.value, Snapshot::Messages(Vec::new()));
}

#[tokio::test]
async fn test_accepting_a_follow_request() {
    let (transport, client) = client(false);
    transport.route(
        Endpoint::get("/follows/requests"),
        ok_records(&vec![profile(3, "cy"), profile(4, "di")]),
    );
    transport.route(Endpoint::get("/follows/followers"), ok_records(&vec![profile(8, "ed")]));
    client.follow_requests().await.unwrap();
    client.followers().await.unwrap();

    transport.fail(server_error(404, "Not Found", "No such request"));
    assert!(client.accept_follow_request(RecordId::new(3)).await.is_err());
    assert_eq!(client.follow_requests().await.unwrap().len(), 2);

    transport.respond(ok_envelope(json!({ "accepted": true })));
    client.accept_follow_request(RecordId::new(3)).await.unwrap();

    let requests = client.store().get(&keys::follow_requests()).await.unwrap();
    assert_eq!(requests.value, Snapshot::Profiles(vec![profile(4, "di")]));
    assert!(client.store().get(&keys::followers()).await.unwrap().stale);
    assert_eq!(transport.calls_to(Method::Put, "/follows/accept/3"), 2);
}

#[tokio::test]
async fn test_creating_a_post_sends_multipart_and_refreshes_feeds() {
    let (transport, client) = client(false);
    transport.route(Endpoint::get("/posts/feeds"), ok_records(&vec![post(1)]));
    client.feeds().await.unwrap();

    transport.respond(ok_envelope(json!({ "id": 9 })));
    let input = NewPost {
        content: "sunset".to_string(),
        visibility: Visibility::Public,
        media: vec![MediaFile::new("a.jpg", "image/jpeg", vec![1, 2, 3])],
    };
    client.create_post(&input).await.unwrap();

    let call = transport
        .calls()
        .into_iter()
        .find(|c| c.endpoint == Endpoint::post("/posts"))
        .unwrap();
    assert!(matches!(call.payload, Payload::Multipart(ref parts) if parts.len() == 3));
    assert!(client.store().get(&keys::feeds()).await.unwrap().stale);
}

#[tokio::test]
async fn test_mutation_without_data_is_rolled_back() {
    let (transport, client) = client(false);
    transport.route(comments_endpoint(), ok_records(&vec![comment(5, 42, "x")]));
    client.comments(POST).await.unwrap();

    transport.respond(json!({ "message": "ok", "status": 200 }));
    let result = client.delete_comment(POST, RecordId::new(5)).await;

    assert_remote_status(&result, 500);
    assert!(find_record(&cached_comments(&client).await, RecordId::new(5)).is_some());
    // A 2xx reached the server, so the thread is refreshed from it.
    let thread = client.store().get(&keys::comments_for_post(POST)).await.unwrap();
    assert!(thread.stale);
}

#[tokio::test]
async fn test_deleting_a_comment_thread_decrements_the_feed_counter() {
    let (transport, client) = client(false);
    let mut root = comment(5, 42, "root");
    root.child_comments.push(reply(6, 42, 5, "reply"));
    transport.route(comments_endpoint(), ok_records(&vec![root, comment(7, 42, "keep")]));
    let mut counted = post(42);
    counted.total_comments = 3;
    transport.route(Endpoint::get("/posts/feeds"), ok_records(&vec![counted]));
    client.comments(POST).await.unwrap();
    client.feeds().await.unwrap();

    let gate = transport.respond_later();
    let in_flight = client.begin(comments::delete_comment(POST, RecordId::new(5), 2)).await.unwrap();
    match cached(&client, &keys::feeds()).await {
        Snapshot::Posts(posts) => assert_eq!(posts[0].total_comments, 1),
        other => panic!("expected posts, got {other:?}"),
    }

    gate.fail(server_error(403, "Forbidden", "Not your comment"));
    assert!(in_flight.settle().await.is_err());
    match cached(&client, &keys::feeds()).await {
        Snapshot::Posts(posts) => assert_eq!(posts[0].total_comments, 3),
        other => panic!("expected posts, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_delete_comment_counts_the_cached_thread() {
    let (transport, client) = client(false);
    let mut root = comment(5, 42, "root");
    root.child_comments.push(reply(6, 42, 5, "reply"));
    transport.route(comments_endpoint(), ok_records(&vec![root]));
    let mut counted = post(42);
    counted.total_comments = 2;
    transport.route(Endpoint::get("/posts/feeds"), ok_records(&vec![counted]));
    client.comments(POST).await.unwrap();
    client.feeds().await.unwrap();

    transport.respond(ok_envelope(json!({ "id": 5 })));
    client.delete_comment(POST, RecordId::new(5)).await.unwrap();

    let feed = client.store().get(&keys::feeds()).await.unwrap();
    assert_eq!(feed.value.as_posts().unwrap()[0].total_comments, 0);
    assert!(cached_comments(&client).await.is_empty());
}

#[tokio::test]
async fn test_login_stores_tokens_and_refreshes_session_queries() {
    let (transport, client) = client(false);
    transport.route(Endpoint::get("/accounts/profile"), ok_records(&profile(1, "ana")));
    client.profile().await.unwrap();

    transport.respond(ok_envelope(json!({
        "token": "access-1",
        "refreshToken": "refresh-1",
        "id": 12,
        "username": "eve",
        "email": "eve@plaza.dev"
    })));
    let session = client.login(&Credentials::new("eve@plaza.dev", "pw")).await.unwrap();

    assert_eq!(session.id, RecordId::new(12));
    assert_eq!(client.tokens().access_token().await.as_deref(), Some("access-1"));
    assert_eq!(client.tokens().refresh_token().await.as_deref(), Some("refresh-1"));
    assert_eq!(client.current_user().username, "eve");
    assert!(client.store().get(&keys::profile()).await.unwrap().stale);
    let call = &transport.calls()[1];
    assert_eq!(call.endpoint, Endpoint::post("/auth/login"));
    assert!(matches!(&call.payload, Payload::Json(body) if body["email"] == "eve@plaza.dev"));
}

#[tokio::test]
async fn test_login_without_data_keeps_tokens_untouched() {
    let (transport, client) = client(false);
    transport.respond(json!({ "message": "ok", "status": 200 }));

    let result = client.login(&Credentials::new("eve@plaza.dev", "pw")).await;

    assert_remote_status(&result, 500);
    assert_eq!(client.tokens().access_token().await, None);
    assert_eq!(client.current_user(), current_user());
}

#[tokio::test]
async fn test_register_starts_a_session() {
    let (transport, client) = client(false);
    transport.respond(ok_envelope(json!({
        "token": "access-2",
        "refreshToken": "refresh-2",
        "id": 13,
        "username": "fay"
    })));
    let registration = Registration {
        email: "fay@plaza.dev".to_string(),
        username: "fay".to_string(),
        password: "pw".to_string(),
        phone_number: "0999".to_string(),
    };

    client.register(&registration).await.unwrap();

    assert_eq!(client.tokens().access_token().await.as_deref(), Some("access-2"));
    assert_eq!(transport.calls_to(Method::Post, "/auth/register"), 1);
}

#[tokio::test]
async fn test_logout_clears_tokens_and_drops_session_queries() {
    let (transport, client) = client(false);
    client.tokens().set_tokens("access".to_string(), Some("refresh".to_string())).await;
    transport.route(Endpoint::get("/accounts/profile"), ok_records(&profile(1, "ana")));
    transport.route(Endpoint::get("/posts/feeds"), ok_records(&vec![post(1)]));
    client.profile().await.unwrap();
    client.session_profile().await.unwrap();
    client.feeds().await.unwrap();

    transport.respond(json!({ "message": "Logged out", "status": 204 }));
    client.logout().await.unwrap();

    assert_eq!(client.tokens().access_token().await, None);
    assert!(client.store().get(&keys::auth()).await.is_none());
    assert!(client.store().get(&keys::profile()).await.is_none());
    assert!(client.store().get(&keys::feeds()).await.is_some());
}

#[tokio::test]
async fn test_failed_logout_keeps_the_session() {
    let (transport, client) = client(false);
    client.tokens().set_tokens("access".to_string(), None).await;
    transport.route(Endpoint::get("/accounts/profile"), ok_records(&profile(1, "ana")));
    client.profile().await.unwrap();

    transport.fail(server_error(401, "Unauthorized", "Expired"));
    assert!(client.logout().await.is_err());

    assert_eq!(client.tokens().access_token().await.as_deref(), Some("access"));
    assert!(client.store().get(&keys::profile()).await.is_some());
}

#[tokio::test]
async fn test_lookup_reads_are_cached() {
    let (transport, client) = client(false);
    transport.route(Endpoint::get("/users/search?username=bo"), ok_records(&vec![profile(2, "bo")]));
    transport.route(Endpoint::get("/users/profile/bo"), ok_records(&profile(2, "bo")));
    transport.route(Endpoint::get("/follows/status/2"), json!({ "data": "ACCEPTED" }));
    transport.route(Endpoint::get("/posts/9"), ok_records(&post(9)));

    assert_eq!(client.search_users(" bo ").await.unwrap(), vec![profile(2, "bo")]);
    assert_eq!(client.other_profile("bo").await.unwrap(), Some(profile(2, "bo")));
    assert_eq!(client.follow_status(RecordId::new(2)).await.unwrap(), FollowStatus::Accepted);
    assert_eq!(client.post(RecordId::new(9)).await.unwrap(), Some(post(9)));
    assert!(client.search_users("   ").await.unwrap().is_empty());

    client.follow_status(RecordId::new(2)).await.unwrap();
    assert_eq!(transport.calls_to(Method::Get, "/follows/status/2"), 1);
    assert_eq!(transport.calls().len(), 4);
}

#[tokio::test]
async fn test_follow_mutations_refresh_follow_status() {
    let (transport, client) = client(false);
    transport.route(Endpoint::get("/follows/status/2"), json!({ "data": "NONE" }));
    client.follow_status(RecordId::new(2)).await.unwrap();

    transport.respond(ok_envelope(json!({ "status": "PENDING" })));
    client.send_follow_request(RecordId::new(2)).await.unwrap();

    assert!(client.store().get(&keys::follow_status(RecordId::new(2))).await.unwrap().stale);
}

#[test]
fn test_connect_rejects_invalid_config() {
    let config = ClientConfig {
        api_base_url: String::new(),
        request_timeout_ms: 1_000,
        auth: AuthConfig::default(),
        refetch: RefetchConfig {
            stale_after_ms: 1_000,
            background: true,
        },
        telemetry: TelemetryConfig {
            filter: "info".to_string(),
            format: LogFormat::Json,
        },
    };
    let result = SocialClient::connect(&config, current_user());
    assert!(matches!(
        result,
        Err(ClientError::Config(ConfigError::InvalidValue { field: "api_base_url", .. }))
    ));

    let valid = ClientConfig {
        api_base_url: "https://api.plaza.test".to_string(),
        ..config
    };
    let client = SocialClient::connect(&valid, current_user()).unwrap();
    assert_eq!(client.transport().base_url(), "https://api.plaza.test");
}
