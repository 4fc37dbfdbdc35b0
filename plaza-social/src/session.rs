//! Sign-in, registration and sign-out.
//!
//! These calls are not optimistic: nothing is cached until the server hands
//! back tokens, so [`SocialClient`](crate::SocialClient) issues them straight
//! through the transport and then touches the `auth` and profile keys.

use plaza_core::{Endpoint, Payload, RecordId, UserSummary};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Email and password sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// A new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
    pub phone_number: String,
}

/// Tokens and identity returned by login and register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    #[serde(alias = "accessToken")]
    pub token: String,
    pub refresh_token: String,
    pub id: RecordId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl AuthSession {
    pub fn user(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

pub fn login_call(credentials: &Credentials) -> (Endpoint, Payload) {
    (
        Endpoint::post("/auth/login"),
        Payload::Json(json!({
            "email": credentials.email,
            "password": credentials.password,
        })),
    )
}

pub fn register_call(registration: &Registration) -> (Endpoint, Payload) {
    (
        Endpoint::post("/auth/register"),
        Payload::Json(json!({
            "email": registration.email,
            "username": registration.username,
            "password": registration.password,
            "phoneNumber": registration.phone_number,
        })),
    )
}

/// Sign-out answers with a message only.
pub fn logout_call() -> (Endpoint, Payload) {
    (Endpoint::post("/auth/logout"), Payload::Empty)
}
