//! Plaza Core - records, identity and error types shared by every Plaza crate.
//!
//! This crate holds data only: the domain records the social client caches,
//! the response envelopes the REST API wraps them in, the error taxonomy and
//! the [`Transport`] seam the rest of the workspace talks to the server
//! through. Nothing here performs I/O.

pub mod envelope;
pub mod error;
pub mod identity;
pub mod records;
pub mod transport;

pub use envelope::{data_record_id, DataEnvelope, ErrorEnvelope};
pub use error::{
    CacheError, MutationError, PlazaError, PlazaResult, RemoteError, DEFAULT_ERROR_CATEGORY,
    DEFAULT_ERROR_MESSAGE, NETWORK_ERROR_CATEGORY, NETWORK_ERROR_STATUS,
};
pub use identity::{MutationId, PlaceholderIds, RecordId, Timestamp};
pub use records::{
    find_record, insert_child, remove_record, replace_record_id, update_record, Comment,
    Conversation, DomainRecord, FollowStatus, Message, MessageReaction, Notification, Post, Profile,
    ReactionType, UserSummary, Visibility,
};
pub use transport::{Endpoint, FormPart, Method, Payload, Transport};
