//! HTTP implementation of [`Transport`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use plaza_core::{
    Endpoint, FormPart, Method, Payload, RemoteError, Transport, DEFAULT_ERROR_CATEGORY,
    DEFAULT_ERROR_MESSAGE,
};

use crate::auth::{InMemoryTokenStore, TokenStore};
use crate::config::ClientConfig;
use crate::error::ClientError;

/// JSON-over-HTTPS transport with bearer auth.
#[derive(Clone)]
pub struct RestTransport {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl RestTransport {
    pub fn new(config: &ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Build a transport whose tokens come from the `auth` config section.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let tokens = Arc::new(InMemoryTokenStore::from_config(&config.auth));
        Self::new(config, tokens)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn build_request(
        &self,
        endpoint: &Endpoint,
        payload: &Payload,
    ) -> Result<reqwest::RequestBuilder, RemoteError> {
        let method = match endpoint.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut request = self.client.request(method, self.url_for(&endpoint.path));

        if let Some(token) = self.tokens.access_token().await {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| RemoteError::malformed(format!("invalid access token: {e}")))?;
            request = request.header(AUTHORIZATION, value);
        }

        Ok(match payload {
            Payload::Empty => request,
            Payload::Json(body) => request.json(body),
            Payload::Multipart(parts) => request.multipart(build_form(parts)?),
        })
    }
}

impl std::fmt::Debug for RestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for RestTransport {
    async fn call(&self, endpoint: &Endpoint, payload: &Payload) -> Result<Value, RemoteError> {
        let request = self.build_request(endpoint, payload).await?;
        tracing::debug!(endpoint = %endpoint, "Sending request");

        let response = request.send().await.map_err(|e| {
            tracing::warn!(endpoint = %endpoint, error = %e, "Request got no response");
            RemoteError::network(format!("{endpoint}: {e}"))
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::network(format!("{endpoint}: failed to read body: {e}")))?;

        if status.is_success() {
            return parse_success_body(&text);
        }

        let err = normalize_error_body(status.as_u16(), &text);
        tracing::debug!(
            endpoint = %endpoint,
            status = err.status(),
            category = err.category(),
            "Request failed"
        );
        Err(err)
    }
}

fn build_form(parts: &[FormPart]) -> Result<Form, RemoteError> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                file_name,
                mime_type,
                bytes,
            } => {
                let file = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime_type)
                    .map_err(|e| {
                        RemoteError::malformed(format!("invalid mime type {mime_type}: {e}"))
                    })?;
                form.part(name.clone(), file)
            }
        };
    }
    Ok(form)
}

/// Decode a 2xx body. An empty body (e.g. 204) reads as `null`.
pub fn parse_success_body(text: &str) -> Result<Value, RemoteError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text)
        .map_err(|e| RemoteError::malformed(format!("success body is not JSON: {e}")))
}

/// Turn a non-2xx response into a [`RemoteError::Server`].
///
/// A complete `{message, error, status}` envelope is kept as sent, with empty
/// fields falling back to defaults. Anything else gets the default message
/// and category and the HTTP status; a plain-text body becomes the category.
pub fn normalize_error_body(http_status: u16, body: &str) -> RemoteError {
    let fallback_status = if http_status == 0 { 500 } else { http_status };
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    match parsed {
        Some(Value::Object(map)) => {
            let text = |field: &str| {
                map.get(field)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            let complete = ["message", "error", "status"]
                .iter()
                .all(|field| map.contains_key(*field));
            let status = if complete {
                map.get("status")
                    .and_then(Value::as_u64)
                    .and_then(|s| u16::try_from(s).ok())
                    .filter(|s| *s != 0)
                    .unwrap_or(fallback_status)
            } else {
                fallback_status
            };
            RemoteError::Server {
                message: text("message").unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
                error: text("error").unwrap_or_else(|| DEFAULT_ERROR_CATEGORY.to_string()),
                status,
            }
        }
        Some(Value::String(s)) if !s.is_empty() => RemoteError::Server {
            message: DEFAULT_ERROR_MESSAGE.to_string(),
            error: s,
            status: fallback_status,
        },
        None if !body.trim().is_empty() => RemoteError::Server {
            message: DEFAULT_ERROR_MESSAGE.to_string(),
            error: body.trim().to_string(),
            status: fallback_status,
        },
        _ => RemoteError::Server {
            message: DEFAULT_ERROR_MESSAGE.to_string(),
            error: DEFAULT_ERROR_CATEGORY.to_string(),
            status: fallback_status,
        },
    }
}
