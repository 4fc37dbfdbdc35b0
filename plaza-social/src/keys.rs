//! Query keys and the GET endpoint behind each one.
//!
//! Keys are prefix-compatible: `follow` matches every follow list and `chat`
//! every conversation query.

use plaza_cache::{CacheKey, KeySegment};
use plaza_core::{Endpoint, RecordId};

pub fn comments_for_post(post_id: RecordId) -> CacheKey {
    CacheKey::new("comments").with("post").with(post_id)
}

pub fn feeds() -> CacheKey {
    CacheKey::new("posts").with("feeds")
}

pub fn own_posts() -> CacheKey {
    CacheKey::new("posts").with("own")
}

pub fn user_posts(user_id: RecordId) -> CacheKey {
    CacheKey::new("posts").with("other").with(user_id)
}

pub fn conversation(conversation_id: RecordId) -> CacheKey {
    CacheKey::new("chat").with("conversation").with(conversation_id)
}

pub fn my_conversations() -> CacheKey {
    CacheKey::new("chat").with("me")
}

pub fn chat() -> CacheKey {
    CacheKey::new("chat")
}

pub fn follow() -> CacheKey {
    CacheKey::new("follow")
}

pub fn follow_requests() -> CacheKey {
    follow().with("requests")
}

pub fn followers() -> CacheKey {
    follow().with("followers")
}

pub fn following() -> CacheKey {
    follow().with("following")
}

pub fn profile() -> CacheKey {
    CacheKey::new("account").with("profile")
}

pub fn notifications() -> CacheKey {
    CacheKey::new("notifications")
}

pub fn post_detail(post_id: RecordId) -> CacheKey {
    CacheKey::new("posts").with("detail").with(post_id)
}

pub fn follow_status(user_id: RecordId) -> CacheKey {
    follow().with("status").with(user_id)
}

pub fn user() -> CacheKey {
    CacheKey::new("user")
}

pub fn user_search(username: &str) -> CacheKey {
    user().with("search").with(username)
}

pub fn other_profile(username: &str) -> CacheKey {
    user().with("other").with(username)
}

/// The signed-in session. Written on login, removed on logout.
pub fn auth() -> CacheKey {
    CacheKey::new("auth")
}

/// A concrete, fetchable query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    CommentsForPost(RecordId),
    Feeds,
    OwnPosts,
    UserPosts(RecordId),
    Conversation(RecordId),
    MyConversations,
    FollowRequests,
    Followers,
    Following,
    Profile,
    Notifications,
    PostDetail(RecordId),
    FollowStatus(RecordId),
    UserSearch(String),
    OtherProfile(String),
    Session,
}

impl Route {
    /// Parse a cache key. Prefix-only keys such as `chat` are not routes.
    pub fn from_key(key: &CacheKey) -> Option<Self> {
        let scope: Vec<ScopePart<'_>> = key.scope().iter().map(ScopePart::from).collect();
        let route = match (key.resource(), scope.as_slice()) {
            ("comments", [ScopePart::Str("post"), ScopePart::Id(id)]) => Self::CommentsForPost(*id),
            ("posts", [ScopePart::Str("feeds")]) => Self::Feeds,
            ("posts", [ScopePart::Str("own")]) => Self::OwnPosts,
            ("posts", [ScopePart::Str("other"), ScopePart::Id(id)]) => Self::UserPosts(*id),
            ("chat", [ScopePart::Str("conversation"), ScopePart::Id(id)]) => Self::Conversation(*id),
            ("chat", [ScopePart::Str("me")]) => Self::MyConversations,
            ("follow", [ScopePart::Str("requests")]) => Self::FollowRequests,
            ("follow", [ScopePart::Str("followers")]) => Self::Followers,
            ("follow", [ScopePart::Str("following")]) => Self::Following,
            ("account", [ScopePart::Str("profile")]) => Self::Profile,
            ("notifications", []) => Self::Notifications,
            ("posts", [ScopePart::Str("detail"), ScopePart::Id(id)]) => Self::PostDetail(*id),
            ("follow", [ScopePart::Str("status"), ScopePart::Id(id)]) => Self::FollowStatus(*id),
            ("user", [ScopePart::Str("search"), ScopePart::Str(name)]) => Self::UserSearch(name.to_string()),
            ("user", [ScopePart::Str("other"), ScopePart::Str(name)]) => Self::OtherProfile(name.to_string()),
            ("auth", []) => Self::Session,
            _ => return None,
        };
        Some(route)
    }

    pub fn key(&self) -> CacheKey {
        match self {
            Self::CommentsForPost(id) => comments_for_post(*id),
            Self::Feeds => feeds(),
            Self::OwnPosts => own_posts(),
            Self::UserPosts(id) => user_posts(*id),
            Self::Conversation(id) => conversation(*id),
            Self::MyConversations => my_conversations(),
            Self::FollowRequests => follow_requests(),
            Self::Followers => followers(),
            Self::Following => following(),
            Self::Profile => profile(),
            Self::Notifications => notifications(),
            Self::PostDetail(id) => post_detail(*id),
            Self::FollowStatus(id) => follow_status(*id),
            Self::UserSearch(name) => user_search(name),
            Self::OtherProfile(name) => other_profile(name),
            Self::Session => auth(),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::CommentsForPost(id) => Endpoint::get(format!("comments/post/{id}")),
            Self::Feeds => Endpoint::get("/posts/feeds"),
            Self::OwnPosts => Endpoint::get("/posts/me"),
            Self::UserPosts(id) => Endpoint::get(format!("/posts/other/{id}")),
            Self::Conversation(id) => Endpoint::get(format!("/chat/conversation/{id}")),
            Self::MyConversations => Endpoint::get("/chat/me"),
            Self::FollowRequests => Endpoint::get("/follows/requests"),
            Self::Followers => Endpoint::get("/follows/followers"),
            Self::Following => Endpoint::get("/follows/following"),
            Self::Profile => Endpoint::get("/accounts/profile"),
            Self::Notifications => Endpoint::get("/notifications"),
            Self::PostDetail(id) => Endpoint::get(format!("/posts/{id}")),
            Self::FollowStatus(id) => Endpoint::get(format!("/follows/status/{id}")),
            Self::UserSearch(name) => Endpoint::get(format!("/users/search?username={}", urlencoding::encode(name))),
            Self::OtherProfile(name) => Endpoint::get(format!("/users/profile/{}", urlencoding::encode(name))),
            Self::Session => Endpoint::get("/accounts/profile"),
        }
    }
}

enum ScopePart<'a> {
    Str(&'a str),
    Id(RecordId),
}

impl<'a> From<&'a KeySegment> for ScopePart<'a> {
    fn from(segment: &'a KeySegment) -> Self {
        match segment {
            KeySegment::Str(s) => Self::Str(s),
            KeySegment::Int(i) => Self::Id(RecordId::new(*i)),
        }
    }
}
