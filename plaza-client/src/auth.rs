//! Auth token storage.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::AuthConfig;

/// Key-value store for the current session's tokens.
///
/// The transport reads the access token on every request, so a refreshed
/// token takes effect without rebuilding the client.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn access_token(&self) -> Option<String>;
    async fn refresh_token(&self) -> Option<String>;
    async fn set_tokens(&self, access_token: String, refresh_token: Option<String>);
    async fn clear(&self);
}

#[derive(Debug, Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// Process-local [`TokenStore`].
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<Tokens>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from the `auth` config section.
    pub fn from_config(auth: &AuthConfig) -> Self {
        Self {
            tokens: RwLock::new(Tokens {
                access: auth.access_token.clone(),
                refresh: auth.refresh_token.clone(),
            }),
        }
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.access.clone()
    }

    async fn refresh_token(&self) -> Option<String> {
        self.tokens.read().await.refresh.clone()
    }

    async fn set_tokens(&self, access_token: String, refresh_token: Option<String>) {
        let mut tokens = self.tokens.write().await;
        tokens.access = Some(access_token);
        if refresh_token.is_some() {
            tokens.refresh = refresh_token;
        }
    }

    async fn clear(&self) {
        *self.tokens.write().await = Tokens::default();
    }
}
