//! Client library for a short-video social backend.
//!
//! [`api::ApiClient`] speaks the REST API with the bearer token held by a
//! shared [`session::SessionHandle`]. On top of it sit two controllers that
//! own client-side state:
//!
//! - [`feed::FeedController`]: paginated feed, viewing cursor, optimistic
//!   likes, and per-video [`comments::CommentThread`]s.
//! - [`chat::ChatController`]: peer list, selected conversation, optimistic
//!   sends with resync.
//!
//! [`render`] turns that state into terminal output for the `reelfeed` binary.

pub mod api;
pub mod chat;
pub mod cli;
pub mod comments;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod render;
pub mod session;
pub mod token;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::{ClientError, ErrorKind, Result};
pub use session::{SessionHandle, SessionStore};
