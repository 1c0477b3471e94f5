//! Crate-level error type.
//!
//! Every fallible operation in the library returns [`ClientError`]. Nothing is
//! fatal: callers map [`ClientError::kind`] to a user-facing message and carry
//! on, re-prompting for credentials when the kind is [`ErrorKind::Auth`].

use thiserror::Error;

use crate::models::{UserId, VideoId};

/// Coarse grouping used by the presentation layer to decide how to surface
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, expired or rejected token. Prompt to log in again.
    Auth,
    /// Connection failure or non-2xx status.
    Network,
    /// Input rejected client-side or by the server (400/404/409).
    Validation,
    /// Response body did not have the expected shape.
    Malformed,
    /// Configuration or local token storage.
    Local,
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// An action that needs a session was attempted anonymously.
    #[error("not signed in: log in to {action}")]
    NotAuthenticated { action: &'static str },

    /// The server answered 401.
    #[error("session rejected by server: {message}")]
    Unauthorized { message: String },

    /// The server answered with a non-2xx status other than 401.
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },

    /// A TCP-level connection could not be established or the transfer broke.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },

    /// The body could not be parsed as the expected JSON structure.
    #[error("unexpected response for {what}: {detail}")]
    Malformed { what: String, detail: String },

    #[error("{0}")]
    Validation(String),

    #[error("video {0} is not in the loaded feed")]
    UnknownVideo(VideoId),

    #[error("no conversation selected")]
    NoPeerSelected,

    #[error("user {0} is not an available chat peer")]
    UnknownPeer(UserId),

    #[error("config error: {0}")]
    Config(String),

    #[error("local I/O error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::NotAuthenticated { .. } | ClientError::Unauthorized { .. } => {
                ErrorKind::Auth
            }
            ClientError::Http { status, .. } if (400..500).contains(status) => {
                ErrorKind::Validation
            }
            ClientError::Http { .. } | ClientError::Connect { .. } => ErrorKind::Network,
            ClientError::Malformed { .. } => ErrorKind::Malformed,
            ClientError::Validation(_)
            | ClientError::UnknownVideo(_)
            | ClientError::NoPeerSelected
            | ClientError::UnknownPeer(_) => ErrorKind::Validation,
            ClientError::Config(_) | ClientError::Storage(_) => ErrorKind::Local,
        }
    }

    /// True when the user should be asked to log in again.
    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// HTTP status carried by the error, if it came from a server reply.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }

    pub(crate) fn malformed(what: impl Into<String>, detail: impl ToString) -> Self {
        ClientError::Malformed {
            what: what.into(),
            detail: detail.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
