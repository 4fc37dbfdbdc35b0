//! Social domain for the Plaza client.
//!
//! Everything the app caches is a [`Snapshot`] under a query key from
//! [`keys`]. Mutations are plain [`MutationRequest`](plaza_sync::MutationRequest)
//! builders per feature module; [`SocialClient`] wires them to a REST
//! transport, an in-memory cache and the optimistic coordinator.
//!
//! | module | writes |
//! |---|---|
//! | [`comments`] | create, delete, toggle reaction |
//! | [`posts`] | create, toggle reaction |
//! | [`chat`] | send, send media, delete, react |
//! | [`follows`] | send, accept, decline, remove |
//! | [`session`] | login, register, logout (not optimistic) |

pub mod chat;
pub mod client;
pub mod comments;
pub mod follows;
pub mod keys;
pub mod media;
pub mod posts;
pub mod refetch;
pub mod session;
pub mod snapshot;

pub use client::{SocialClient, SocialCoordinator, SocialStore};
pub use comments::{build_comment_tree, NewComment};
pub use keys::Route;
pub use media::MediaFile;
pub use posts::NewPost;
pub use refetch::SocialRefetcher;
pub use session::{AuthSession, Credentials, Registration};
pub use snapshot::Snapshot;
