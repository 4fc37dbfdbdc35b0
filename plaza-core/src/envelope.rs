//! REST response envelopes.
//!
//! Successes arrive as `{ "data": ..., "message"?, "status"? }`, failures as
//! `{ "message", "error", "status" }`.

use crate::error::RemoteError;
use crate::identity::RecordId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success envelope wrapping the payload in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}

impl<T: DeserializeOwned> DataEnvelope<T> {
    /// Decode a raw response body.
    pub fn from_value(body: Value) -> Result<Self, RemoteError> {
        serde_json::from_value(body)
            .map_err(|e| RemoteError::malformed(format!("unexpected response shape: {e}")))
    }

    /// Decode a raw body and unwrap `data`, failing when it is missing.
    pub fn decode_data(body: Value) -> Result<T, RemoteError> {
        Self::from_value(body)?.into_data()
    }
}

impl<T> DataEnvelope<T> {
    pub fn into_data(self) -> Result<T, RemoteError> {
        self.data
            .ok_or_else(|| RemoteError::malformed("response envelope has no data"))
    }
}

/// Failure envelope as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub message: String,
    pub error: String,
    pub status: u16,
}

impl From<ErrorEnvelope> for RemoteError {
    fn from(envelope: ErrorEnvelope) -> Self {
        RemoteError::Server {
            message: envelope.message,
            error: envelope.error,
            status: envelope.status,
        }
    }
}

/// Extract a positive `data.id` from a raw success body.
pub fn data_record_id(body: &Value) -> Option<RecordId> {
    body.get("data")?
        .get("id")?
        .as_i64()
        .and_then(RecordId::server)
}
