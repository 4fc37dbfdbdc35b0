//! Error types for Plaza operations

use thiserror::Error;

/// Default message when a failed response carries none.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

/// Default category when a failed response carries none.
pub const DEFAULT_ERROR_CATEGORY: &str = "Server Error";

/// Category reported for requests that never got a response.
pub const NETWORK_ERROR_CATEGORY: &str = "Network Error";

/// Status reported for requests that never got a response.
pub const NETWORK_ERROR_STATUS: u16 = 503;

/// Errors produced by a remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// No response was received (connect failure, timeout, aborted request).
    #[error("Network error: {message}")]
    Transport { message: String },

    /// The server answered with a failure envelope.
    #[error("Server error {status} ({error}): {message}")]
    Server {
        message: String,
        error: String,
        status: u16,
    },

    /// The server answered successfully but the body is not what the caller
    /// needs. Raised, never defaulted.
    #[error("Malformed response: {reason}")]
    Malformed { reason: String },
}

impl RemoteError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// HTTP-like status code.
    pub fn status(&self) -> u16 {
        match self {
            Self::Transport { .. } => NETWORK_ERROR_STATUS,
            Self::Server { status, .. } => *status,
            Self::Malformed { .. } => 500,
        }
    }

    /// Short category label, e.g. "Network Error" or the server's `error` field.
    pub fn category(&self) -> &str {
        match self {
            Self::Transport { .. } => NETWORK_ERROR_CATEGORY,
            Self::Server { error, .. } => error,
            Self::Malformed { .. } => "Malformed Response",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transport { message } | Self::Server { message, .. } => message,
            Self::Malformed { reason } => reason,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Read cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("No refetch route for cache key {key}")]
    UnknownKey { key: String },

    #[error("Refetch of {key} failed: {reason}")]
    Refetch { key: String, reason: String },
}

/// Optimistic mutation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("Invalid mutation state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Mutation {label} succeeded without a server id for its placeholder")]
    MissingServerId { label: String },

    #[error("Mutation {label} names no cache keys")]
    EmptyRequest { label: String },

    #[error("Mutation {label} was abandoned before it settled")]
    Abandoned { label: String },
}

/// Master error type for all Plaza operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlazaError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),
}

impl PlazaError {
    /// The remote failure behind this error, if any.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for Plaza operations.
pub type PlazaResult<T> = Result<T, PlazaError>;
