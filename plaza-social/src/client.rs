//! The social client facade.

use std::sync::{Arc, PoisonError, RwLock};

use plaza_cache::{
    CacheConfig, CacheRead, CacheStore, Freshness, InMemoryCacheStore, QueryCache, Refetcher,
};
use plaza_client::{ClientConfig, ClientError, InMemoryTokenStore, RestTransport, TokenStore};
use plaza_core::{
    find_record, CacheError, Comment, Conversation, DataEnvelope, Endpoint, FollowStatus, Message,
    Notification, Payload, PlaceholderIds, PlazaResult, Post, Profile, ReactionType, RecordId,
    Transport, UserSummary,
};
use plaza_sync::{InFlight, MutationOutcome, MutationRequest, OptimisticCoordinator};

use crate::comments::{self, NewComment};
use crate::keys::{self, Route};
use crate::media::MediaFile;
use crate::posts::{self, NewPost};
use crate::refetch::SocialRefetcher;
use crate::session::{self, AuthSession, Credentials, Registration};
use crate::snapshot::Snapshot;
use crate::{chat, follows};

pub type SocialStore = InMemoryCacheStore<Snapshot>;
pub type SocialCoordinator<T> = OptimisticCoordinator<Snapshot, SocialStore, T>;

/// Cached reads and optimistic writes against the social API for the
/// signed-in user.
///
/// Reads go through a read-through [`QueryCache`]; writes go through the
/// [`OptimisticCoordinator`] so the cache shows their effect before the
/// server answers. [`login`](Self::login) and [`register`](Self::register)
/// store the returned tokens in the [`TokenStore`] the transport reads from.
pub struct SocialClient<T = RestTransport> {
    transport: Arc<T>,
    store: Arc<SocialStore>,
    queries: QueryCache<Snapshot, SocialStore, SocialRefetcher<T>>,
    coordinator: SocialCoordinator<T>,
    placeholders: Arc<PlaceholderIds>,
    tokens: Arc<dyn TokenStore>,
    current_user: RwLock<UserSummary>,
}

impl SocialClient<RestTransport> {
    /// Build a client talking to the configured REST API.
    pub fn connect(config: &ClientConfig, current_user: UserSummary) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = RestTransport::from_config(config)?;
        tracing::info!(
            base_url = transport.base_url(),
            user = %current_user.id,
            "Social client connected"
        );
        let tokens = Arc::clone(transport.tokens());
        Ok(Self::with_transport(Arc::new(transport), config.cache_config(), current_user).with_tokens(tokens))
    }
}

impl<T: Transport + 'static> SocialClient<T> {
    pub fn with_transport(transport: Arc<T>, cache: CacheConfig, current_user: UserSummary) -> Self {
        let refetcher = Arc::new(SocialRefetcher::new(Arc::clone(&transport)));
        let store = Arc::new(InMemoryCacheStore::with_refetcher(
            Arc::clone(&refetcher) as Arc<dyn Refetcher<Snapshot>>,
            cache.clone(),
        ));
        let queries = QueryCache::new(Arc::clone(&store), refetcher, cache);
        let coordinator = OptimisticCoordinator::new(Arc::clone(&store), Arc::clone(&transport));
        Self {
            transport,
            store,
            queries,
            coordinator,
            placeholders: Arc::new(PlaceholderIds::new()),
            tokens: Arc::new(InMemoryTokenStore::new()),
            current_user: RwLock::new(current_user),
        }
    }

    /// Use `tokens` for session storage. It should be the store the
    /// transport authenticates with.
    pub fn with_tokens(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn store(&self) -> &Arc<SocialStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &SocialCoordinator<T> {
        &self.coordinator
    }

    pub fn current_user(&self) -> UserSummary {
        self.current_user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_current_user(&self, user: UserSummary) {
        *self.current_user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }

    pub fn next_placeholder(&self) -> RecordId {
        self.placeholders.next_id()
    }

    /// Wait for background refetches triggered by invalidation.
    pub async fn await_refetches(&self) {
        self.store.await_refetches().await;
    }

    /// Wait for every begun mutation to settle, then for the refetches its
    /// invalidations started.
    pub async fn await_idle(&self) {
        self.coordinator.await_settled().await;
        self.store.await_refetches().await;
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub async fn read(&self, route: Route, freshness: Freshness) -> PlazaResult<Option<CacheRead<Snapshot>>> {
        self.queries.fetch(&route.key(), freshness).await
    }

    async fn read_as<X, F>(&self, route: Route, extract: F) -> PlazaResult<X>
    where
        X: Default,
        F: FnOnce(Snapshot) -> Option<X>,
    {
        let Some(read) = self.queries.fetch_default(&route.key()).await? else {
            return Ok(X::default());
        };
        let kind = read.value().kind();
        extract(read.into_value()).ok_or_else(|| {
            CacheError::Refetch {
                key: route.key().to_string(),
                reason: format!("unexpected {kind} snapshot"),
            }
            .into()
        })
    }

    pub async fn comments(&self, post_id: RecordId) -> PlazaResult<Vec<Comment>> {
        self.read_as(Route::CommentsForPost(post_id), |s| match s {
            Snapshot::Comments(records) => Some(records),
            _ => None,
        })
        .await
    }

    pub async fn feeds(&self) -> PlazaResult<Vec<Post>> {
        self.read_posts(Route::Feeds).await
    }

    pub async fn own_posts(&self) -> PlazaResult<Vec<Post>> {
        self.read_posts(Route::OwnPosts).await
    }

    pub async fn user_posts(&self, user_id: RecordId) -> PlazaResult<Vec<Post>> {
        self.read_posts(Route::UserPosts(user_id)).await
    }

    async fn read_posts(&self, route: Route) -> PlazaResult<Vec<Post>> {
        self.read_as(route, |s| match s {
            Snapshot::Posts(records) => Some(records),
            _ => None,
        })
        .await
    }

    pub async fn messages(&self, conversation_id: RecordId) -> PlazaResult<Vec<Message>> {
        self.read_as(Route::Conversation(conversation_id), |s| match s {
            Snapshot::Messages(records) => Some(records),
            _ => None,
        })
        .await
    }

    pub async fn conversations(&self) -> PlazaResult<Vec<Conversation>> {
        self.read_as(Route::MyConversations, |s| match s {
            Snapshot::Conversations(records) => Some(records),
            _ => None,
        })
        .await
    }

    pub async fn follow_requests(&self) -> PlazaResult<Vec<Profile>> {
        self.read_profiles(Route::FollowRequests).await
    }

    pub async fn followers(&self) -> PlazaResult<Vec<Profile>> {
        self.read_profiles(Route::Followers).await
    }

    pub async fn following(&self) -> PlazaResult<Vec<Profile>> {
        self.read_profiles(Route::Following).await
    }

    async fn read_profiles(&self, route: Route) -> PlazaResult<Vec<Profile>> {
        self.read_as(route, |s| match s {
            Snapshot::Profiles(records) => Some(records),
            _ => None,
        })
        .await
    }

    pub async fn profile(&self) -> PlazaResult<Option<Profile>> {
        self.read_as(Route::Profile, |s| match s {
            Snapshot::Profile(profile) => Some(Some(profile)),
            _ => None,
        })
        .await
    }

    pub async fn notifications(&self) -> PlazaResult<Vec<Notification>> {
        self.read_as(Route::Notifications, |s| match s {
            Snapshot::Notifications(records) => Some(records),
            _ => None,
        })
        .await
    }

    pub async fn post(&self, post_id: RecordId) -> PlazaResult<Option<Post>> {
        self.read_as(Route::PostDetail(post_id), |s| match s {
            Snapshot::Post(post) => Some(Some(post)),
            _ => None,
        })
        .await
    }

    pub async fn follow_status(&self, user_id: RecordId) -> PlazaResult<FollowStatus> {
        self.read_as(Route::FollowStatus(user_id), |s| match s {
            Snapshot::FollowStatus(status) => Some(status),
            _ => None,
        })
        .await
    }

    /// Accounts whose username matches `username`. A blank query is not sent.
    pub async fn search_users(&self, username: &str) -> PlazaResult<Vec<Profile>> {
        let username = username.trim();
        if username.is_empty() {
            return Ok(Vec::new());
        }
        self.read_profiles(Route::UserSearch(username.to_string())).await
    }

    pub async fn other_profile(&self, username: &str) -> PlazaResult<Option<Profile>> {
        self.read_as(Route::OtherProfile(username.to_string()), |s| match s {
            Snapshot::Profile(profile) => Some(Some(profile)),
            _ => None,
        })
        .await
    }

    /// The profile behind the current session.
    pub async fn session_profile(&self) -> PlazaResult<Option<Profile>> {
        self.read_as(Route::Session, |s| match s {
            Snapshot::Profile(profile) => Some(Some(profile)),
            _ => None,
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    pub async fn login(&self, credentials: &Credentials) -> PlazaResult<AuthSession> {
        let (endpoint, payload) = session::login_call(credentials);
        self.start_session(endpoint, payload).await
    }

    pub async fn register(&self, registration: &Registration) -> PlazaResult<AuthSession> {
        let (endpoint, payload) = session::register_call(registration);
        self.start_session(endpoint, payload).await
    }

    async fn start_session(&self, endpoint: Endpoint, payload: Payload) -> PlazaResult<AuthSession> {
        let body = self.transport.call(&endpoint, &payload).await?;
        let session: AuthSession = DataEnvelope::decode_data(body)?;
        self.tokens
            .set_tokens(session.token.clone(), Some(session.refresh_token.clone()))
            .await;
        self.set_current_user(session.user());
        self.store.invalidate(&keys::auth()).await;
        self.store.invalidate(&keys::profile()).await;
        tracing::info!(user = %session.id, endpoint = %endpoint, "Session started");
        Ok(session)
    }

    /// Sign out. On success the tokens are cleared and the session and
    /// profile queries are dropped from the cache.
    pub async fn logout(&self) -> PlazaResult<()> {
        let (endpoint, payload) = session::logout_call();
        self.transport.call(&endpoint, &payload).await?;
        self.tokens.clear().await;
        self.store.remove(&keys::auth()).await;
        self.store.remove(&keys::profile()).await;
        tracing::info!(user = %self.current_user().id, "Session ended");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    pub async fn dispatch(&self, request: MutationRequest<Snapshot>) -> PlazaResult<MutationOutcome> {
        self.coordinator.dispatch(request).await
    }

    /// Apply the speculative half of `request` and hand back the pending
    /// call, so the caller decides when it settles.
    pub async fn begin(&self, request: MutationRequest<Snapshot>) -> PlazaResult<InFlight<Snapshot, SocialStore, T>> {
        self.coordinator.begin(request).await
    }

    pub async fn create_comment(&self, input: &NewComment) -> PlazaResult<MutationOutcome> {
        let request = comments::create_comment(input, self.next_placeholder(), &self.current_user());
        self.dispatch(request).await
    }

    pub async fn delete_comment(&self, post_id: RecordId, comment_id: RecordId) -> PlazaResult<MutationOutcome> {
        let removed = self
            .store
            .get(&keys::comments_for_post(post_id))
            .await
            .and_then(|entry| {
                let thread = entry.value.as_comments()?;
                find_record(thread, comment_id).map(comments::thread_size)
            })
            .unwrap_or(1);
        self.dispatch(comments::delete_comment(post_id, comment_id, removed))
            .await
    }

    pub async fn toggle_comment_reaction(
        &self,
        post_id: RecordId,
        comment_id: RecordId,
    ) -> PlazaResult<MutationOutcome> {
        self.dispatch(comments::toggle_comment_reaction(post_id, comment_id))
            .await
    }

    pub async fn toggle_post_reaction(&self, post_id: RecordId) -> PlazaResult<MutationOutcome> {
        self.dispatch(posts::toggle_post_reaction(post_id)).await
    }

    pub async fn create_post(&self, input: &NewPost) -> PlazaResult<MutationOutcome> {
        self.dispatch(posts::create_post(input)).await
    }

    pub async fn send_message(&self, conversation_id: RecordId, content: &str) -> PlazaResult<MutationOutcome> {
        let request = chat::send_message(
            conversation_id,
            content,
            self.next_placeholder(),
            &self.current_user(),
        );
        self.dispatch(request).await
    }

    pub async fn send_message_media(
        &self,
        conversation_id: RecordId,
        media: &[MediaFile],
    ) -> PlazaResult<MutationOutcome> {
        self.dispatch(chat::send_message_media(conversation_id, self.current_user().id, media))
            .await
    }

    pub async fn delete_message(
        &self,
        conversation_id: RecordId,
        message_id: RecordId,
    ) -> PlazaResult<MutationOutcome> {
        self.dispatch(chat::delete_message(conversation_id, message_id))
            .await
    }

    pub async fn react_message(
        &self,
        conversation_id: RecordId,
        message_id: RecordId,
        reaction_type: ReactionType,
    ) -> PlazaResult<MutationOutcome> {
        let request = chat::react_message(
            conversation_id,
            message_id,
            reaction_type,
            self.next_placeholder(),
            &self.current_user(),
        );
        self.dispatch(request).await
    }

    pub async fn send_follow_request(&self, user_id: RecordId) -> PlazaResult<MutationOutcome> {
        self.dispatch(follows::send_follow_request(user_id)).await
    }

    pub async fn accept_follow_request(&self, follow_id: RecordId) -> PlazaResult<MutationOutcome> {
        self.dispatch(follows::accept_follow_request(follow_id)).await
    }

    pub async fn decline_follow_request(&self, follow_id: RecordId) -> PlazaResult<MutationOutcome> {
        self.dispatch(follows::decline_follow_request(follow_id)).await
    }

    pub async fn remove_follow(&self, follow_id: RecordId) -> PlazaResult<MutationOutcome> {
        self.dispatch(follows::remove_follow(follow_id)).await
    }
}
