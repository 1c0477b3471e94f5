//! Wire types for the backend's REST API.
//!
//! Field names follow the backend's JSON (`likes_count`, `file_url`, ...);
//! Rust-side names are chosen for the client and mapped with serde renames.

use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type VideoId = i64;

// -- Account ----------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Identity returned alongside a freshly issued token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

/// Generic `{ "message": ... }` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: String,
}

/// Error body the backend attaches to non-2xx replies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// -- Profile ----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub bio: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub video_id: Option<VideoId>,
}

// -- Feed -------------------------------------------------------------------

/// Reconciliation status of the most recent like/unlike on a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeStatus {
    /// Optimistic change applied, request outstanding.
    Pending,
    /// Server accepted the change.
    Confirmed,
    /// Server rejected the change and the optimistic edit was undone.
    RolledBack,
    /// Server rejected the change but the optimistic edit was kept.
    Unconfirmed,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoItem {
    pub id: VideoId,
    #[serde(rename = "user_id", default)]
    pub owner_id: Option<UserId>,
    #[serde(rename = "username", default)]
    pub owner_username: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "file_url")]
    pub media_url: String,
    #[serde(rename = "upload_date", default)]
    pub uploaded_at: Option<String>,
    #[serde(rename = "likes_count", default)]
    pub like_count: u64,
    #[serde(rename = "is_liked_by_current_user", default)]
    pub liked_by_viewer: bool,
    #[serde(rename = "comments_count", default)]
    pub comment_count: u64,
    #[serde(skip)]
    pub like_status: Option<LikeStatus>,
}

/// One page of `GET /videos`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoPage {
    pub videos: Vec<VideoItem>,
    #[serde(default)]
    pub has_more: Option<bool>,
    #[serde(default)]
    pub has_next: Option<bool>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub current_page: Option<u32>,
}

impl VideoPage {
    /// The server's own "more available" signal, whichever name it used.
    pub fn more_flag(&self) -> Option<bool> {
        self.has_more.or(self.has_next)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LikeResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub likes_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareRequest {
    pub receiver_id: UserId,
}

// -- Comments ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Comment {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub username: Option<String>,
    pub text: String,
    #[serde(rename = "comment_date", default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentList {
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddCommentResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub comment_id: Option<i64>,
    /// Present only when the server echoes the stored comment.
    #[serde(default)]
    pub comment: Option<Comment>,
}

// -- Chat -------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPeer {
    pub id: UserId,
    pub username: String,
}

/// `GET /chat/users` answers with a bare array; some deployments wrap it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChatPeersResponse {
    List(Vec<ChatPeer>),
    Wrapped { users: Vec<ChatPeer> },
}

impl ChatPeersResponse {
    pub fn into_peers(self) -> Vec<ChatPeer> {
        match self {
            ChatPeersResponse::List(peers) => peers,
            ChatPeersResponse::Wrapped { users } => users,
        }
    }
}

/// Server ids are integers; optimistic placeholders carry a `temp-` string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Server(i64),
    Temp(String),
}

impl MessageId {
    pub fn new_temp() -> Self {
        MessageId::Temp(format!("temp-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, MessageId::Temp(_))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageId::Server(id) => write!(f, "{id}"),
            MessageId::Temp(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    #[serde(default)]
    pub sender_id: Option<UserId>,
    #[serde(default)]
    pub receiver_id: Option<UserId>,
    #[serde(default)]
    pub sender_username: Option<String>,
    pub text: String,
    #[serde(default)]
    pub timestamp: String,
}

impl ChatMessage {
    pub fn is_temp(&self) -> bool {
        self.id.is_temp()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageHistory {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    pub text: String,
}

/// Reply to `POST /chat/{id}/send`. `message` is kept loose so that a reply
/// with the wrong shape can be detected and answered with a resync instead of
/// a hard parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

impl SendMessageResponse {
    /// The confirmed message, if the server returned a well-formed one.
    pub fn confirmed(&self) -> Option<ChatMessage> {
        match &self.message {
            Some(value @ serde_json::Value::Object(_)) => {
                serde_json::from_value::<ChatMessage>(value.clone())
                    .ok()
                    .filter(|m| !m.is_temp())
            }
            _ => None,
        }
    }
}
