//! HTTP client for the backend's REST API.
//!
//! Every request goes through [`ApiClient::call`], which attaches the
//! session's bearer token (when there is a live session) and maps transport
//! failures, non-2xx replies and unexpected bodies onto [`ClientError`].

use std::path::Path;
use std::time::Duration;

use reqwest::multipart;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::chat::ChatApi;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::feed::FeedApi;
use crate::models::*;
use crate::session::{Session, SessionHandle};

pub struct ApiClient {
    root: String,
    http: reqwest::Client,
    session: SessionHandle,
    max_upload_bytes: u64,
}

impl ApiClient {
    /// Start building a client aimed at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url)
    }

    pub fn from_config(config: &ClientConfig, session: SessionHandle) -> Result<Self> {
        let mut builder = Self::builder(config.api_root())
            .session(session)
            .connect_timeout(config.connect_timeout())
            .max_upload_bytes(config.max_upload_bytes);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.request_timeout(timeout);
        }
        builder.build()
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.root
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.root, path)
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    async fn call<T: DeserializeOwned>(
        &self,
        what: &str,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let request = match self.session.bearer() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        debug!(what, url, "sending request");

        let resp = request.send().await.map_err(|e| ClientError::Connect {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| ClientError::Connect {
            url: url.to_string(),
            detail: e.to_string(),
        })?;

        if !(200..300).contains(&status) {
            let err = error_from_reply(status, url, &body);
            debug!(what, status, error = %err, "request failed");
            return Err(err);
        }

        serde_json::from_slice(&body).map_err(|e| {
            warn!(what, error = %e, "unexpected response body");
            ClientError::malformed(what, e)
        })
    }

    async fn get<T: DeserializeOwned>(&self, what: &str, path: &str) -> Result<T> {
        let url = self.url(path);
        self.call(what, &url, self.http.get(&url)).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        what: &str,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<T> {
        let url = self.url(path);
        self.call(what, &url, self.http.post(&url).json(body)).await
    }

    // -----------------------------------------------------------------------
    // Account & profile
    // -----------------------------------------------------------------------

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Ack> {
        if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "username, email and password are all required".into(),
            ));
        }
        let req = RegisterRequest {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        self.post("register", "/register", &req).await
    }

    /// `POST /login`, then adopt the issued token as the current session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Validation("username and password are required".into()));
        }
        let req = LoginRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        let resp: LoginResponse = self.post("login", "/login", &req).await?;
        Ok(self.session.login(resp.token, resp.user))
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    pub async fn profile(&self) -> Result<Profile> {
        self.session.require("view your profile")?;
        self.get("profile", "/profile").await
    }

    pub async fn update_profile(&self, bio: &str) -> Result<Ack> {
        self.session.require("edit your profile")?;
        let url = self.url("/profile");
        let body = ProfileUpdate { bio: bio.to_string() };
        self.call("profile update", &url, self.http.put(&url).json(&body)).await
    }

    /// Upload a video file as multipart fields `video` and `description`.
    pub async fn upload_video(&self, path: &Path, description: &str) -> Result<UploadResponse> {
        self.session.require("upload videos")?;

        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            ClientError::Validation(format!("cannot read {}: {e}", path.display()))
        })?;
        if !meta.is_file() {
            return Err(ClientError::Validation(format!("{} is not a file", path.display())));
        }
        if meta.len() > self.max_upload_bytes {
            return Err(ClientError::Validation(format!(
                "{} is {} bytes; the server accepts at most {}",
                path.display(),
                meta.len(),
                self.max_upload_bytes
            )));
        }

        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let form = multipart::Form::new()
            .part("video", multipart::Part::bytes(data).file_name(file_name))
            .text("description", description.to_string());

        let url = self.url("/upload");
        self.call("upload", &url, self.http.post(&url).multipart(form)).await
    }

    // -----------------------------------------------------------------------
    // Feed, likes, comments, share
    // -----------------------------------------------------------------------

    pub async fn videos(&self, page: u32, limit: u32) -> Result<VideoPage> {
        let url = self.url("/videos");
        // The backend reads `per_page`; `limit` is sent as well for servers
        // that follow the documented name.
        let request = self.http.get(&url).query(&[
            ("page", page),
            ("limit", limit),
            ("per_page", limit),
        ]);
        self.call("video page", &url, request).await
    }

    pub async fn like(&self, video: VideoId) -> Result<LikeResponse> {
        self.post("like", &format!("/videos/{video}/like"), &serde_json::json!({}))
            .await
    }

    pub async fn unlike(&self, video: VideoId) -> Result<LikeResponse> {
        self.post("unlike", &format!("/videos/{video}/unlike"), &serde_json::json!({}))
            .await
    }

    pub async fn comments(&self, video: VideoId) -> Result<CommentList> {
        self.get("comments", &format!("/videos/{video}/comments")).await
    }

    pub async fn add_comment(&self, video: VideoId, text: &str) -> Result<AddCommentResponse> {
        let body = NewComment { text: text.to_string() };
        self.post("add comment", &format!("/videos/{video}/comments"), &body)
            .await
    }

    pub async fn share_video(&self, video: VideoId, receiver: UserId) -> Result<Ack> {
        let body = ShareRequest { receiver_id: receiver };
        self.post("share", &format!("/videos/{video}/share"), &body).await
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    pub async fn chat_peers(&self) -> Result<Vec<ChatPeer>> {
        let resp: ChatPeersResponse = self.get("chat users", "/chat/users").await?;
        Ok(resp.into_peers())
    }

    pub async fn messages(&self, peer: UserId) -> Result<MessageHistory> {
        self.get("chat history", &format!("/chat/{peer}/messages")).await
    }

    pub async fn send_message(&self, peer: UserId, text: &str) -> Result<SendMessageResponse> {
        let body = OutgoingMessage { text: text.to_string() };
        self.post("send message", &format!("/chat/{peer}/send"), &body).await
    }
}

/// Turn a non-2xx reply into an error, preferring the server's own message.
pub(crate) fn error_from_reply(status: u16, url: &str, body: &[u8]) -> ClientError {
    let parsed: ApiErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let message = parsed
        .message
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("request failed")
                .to_string()
        });

    if status == 401 {
        ClientError::Unauthorized { message }
    } else {
        ClientError::Http {
            status,
            url: url.to_string(),
            message,
        }
    }
}

impl FeedApi for ApiClient {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<VideoPage> {
        self.videos(page, limit).await
    }

    async fn set_liked(&self, video: VideoId, liked: bool) -> Result<LikeResponse> {
        if liked {
            self.like(video).await
        } else {
            self.unlike(video).await
        }
    }

    async fn comments(&self, video: VideoId) -> Result<CommentList> {
        ApiClient::comments(self, video).await
    }

    async fn add_comment(&self, video: VideoId, text: &str) -> Result<AddCommentResponse> {
        ApiClient::add_comment(self, video, text).await
    }

    async fn share(&self, video: VideoId, receiver: UserId) -> Result<Ack> {
        self.share_video(video, receiver).await
    }
}

impl ChatApi for ApiClient {
    async fn peers(&self) -> Result<Vec<ChatPeer>> {
        self.chat_peers().await
    }

    async fn history(&self, peer: UserId) -> Result<MessageHistory> {
        self.messages(peer).await
    }

    async fn send(&self, peer: UserId, text: &str) -> Result<SendMessageResponse> {
        self.send_message(peer, text).await
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`ApiClient`].
///
/// # Example
/// ```rust,ignore
/// let api = ApiClient::builder("http://127.0.0.1:5000/api")
///     .session(Arc::clone(&session))
///     .connect_timeout(Duration::from_secs(5))
///     .build()?;
/// ```
pub struct ApiClientBuilder {
    base_url: String,
    session: Option<SessionHandle>,
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
    max_upload_bytes: u64,
}

impl ApiClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let defaults = ClientConfig::default();
        Self {
            base_url: base_url.into(),
            session: None,
            connect_timeout: defaults.connect_timeout(),
            request_timeout: None,
            max_upload_bytes: defaults.max_upload_bytes,
        }
    }

    /// The session whose token is attached to every request. Required.
    pub fn session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// # Errors
    /// [`ClientError::Config`] when no session was provided or the HTTP
    /// client cannot be constructed.
    pub fn build(self) -> Result<ApiClient> {
        let session = self
            .session
            .ok_or_else(|| ClientError::Config("session is required".into()))?;

        let mut http = reqwest::Client::builder().connect_timeout(self.connect_timeout);
        if let Some(timeout) = self.request_timeout {
            http = http.timeout(timeout);
        }
        let http = http
            .build()
            .map_err(|e| ClientError::Config(format!("http client: {e}")))?;

        Ok(ApiClient {
            root: self.base_url.trim_end_matches('/').to_string(),
            http,
            session,
            max_upload_bytes: self.max_upload_bytes,
        })
    }
}
