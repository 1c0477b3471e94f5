//! One-to-one chat: peer list, the selected conversation, and optimistic
//! sending with a resync whenever the server's reply cannot be matched.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::models::{ChatMessage, ChatPeer, MessageHistory, MessageId, SendMessageResponse, UserId};
use crate::session::{Session, SessionHandle};

const UNKNOWN_SENDER: &str = "Unknown";

/// Backend operations the chat needs. Implemented by [`crate::api::ApiClient`].
#[allow(async_fn_in_trait)]
pub trait ChatApi {
    async fn peers(&self) -> Result<Vec<ChatPeer>>;
    async fn history(&self, peer: UserId) -> Result<MessageHistory>;
    async fn send(&self, peer: UserId, text: &str) -> Result<SendMessageResponse>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The server returned the stored message; it replaced the placeholder.
    Confirmed(ChatMessage),
    /// The reply could not be matched; the history was reloaded instead.
    Resynced,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub peers: Vec<ChatPeer>,
    pub selected: Option<UserId>,
    /// Conversation with `selected`, oldest first. May hold `temp-` entries.
    pub messages: Vec<ChatMessage>,
}

impl ChatState {
    pub fn selected_peer(&self) -> Option<&ChatPeer> {
        let id = self.selected?;
        self.peers.iter().find(|p| p.id == id)
    }

    fn has_peer(&self, id: UserId) -> bool {
        self.peers.iter().any(|p| p.id == id)
    }

    /// Fill in `sender_username` where the server left it out.
    fn resolve_sender(&self, msg: &mut ChatMessage, me: Option<&Session>) {
        if msg.sender_username.is_some() {
            return;
        }
        let name = match (msg.sender_id, me) {
            (Some(id), Some(me)) if me.user_id == Some(id) => me.username.clone(),
            (Some(id), _) => self.peers.iter().find(|p| p.id == id).map(|p| p.username.clone()),
            (None, _) => None,
        };
        msg.sender_username = Some(name.unwrap_or_else(|| UNKNOWN_SENDER.to_string()));
    }
}

pub struct ChatController<A> {
    api: Arc<A>,
    session: SessionHandle,
    state: Mutex<ChatState>,
}

impl<A: ChatApi> ChatController<A> {
    pub fn new(api: Arc<A>, session: SessionHandle) -> Self {
        Self {
            api,
            session,
            state: Mutex::new(ChatState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ChatState {
        self.lock().clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    pub fn selected(&self) -> Option<UserId> {
        self.lock().selected
    }

    /// Fetch the people the user can chat with and settle the selection.
    ///
    /// A selected peer that is no longer listed is dropped. With nothing
    /// selected the first peer is picked and its history loaded.
    pub async fn load_peers(&self) -> Result<Vec<ChatPeer>> {
        let me = self.session.require("chat")?;
        let mut peers = self.api.peers().await?;
        peers.retain(|p| Some(p.id) != me.user_id);

        let auto_select = {
            let mut state = self.lock();
            state.peers = peers.clone();
            if state.selected.is_some_and(|id| !state.has_peer(id)) {
                debug!(peer = ?state.selected, "selected peer no longer listed");
                state.selected = None;
                state.messages.clear();
            }
            match (state.selected, state.peers.first().map(|p| p.id)) {
                (None, Some(first)) => {
                    state.selected = Some(first);
                    Some(first)
                }
                _ => None,
            }
        };
        debug!(count = peers.len(), "chat peers loaded");

        if let Some(peer) = auto_select {
            self.refresh_history(peer).await?;
        }
        Ok(peers)
    }

    /// Switch the conversation to `peer` and load its history.
    pub async fn select_peer(&self, peer: UserId) -> Result<Vec<ChatMessage>> {
        self.session.require("chat")?;
        {
            let mut state = self.lock();
            if !state.has_peer(peer) {
                return Err(ClientError::UnknownPeer(peer));
            }
            state.selected = Some(peer);
            state.messages.clear();
        }
        self.refresh_history(peer).await
    }

    /// Reload the history of `peer`. The result is applied only if `peer` is
    /// still the selected conversation when it arrives.
    pub async fn refresh_history(&self, peer: UserId) -> Result<Vec<ChatMessage>> {
        let history = self.api.history(peer).await?;
        let me = self.session.current();

        let mut state = self.lock();
        let mut messages = history.messages;
        for msg in &mut messages {
            state.resolve_sender(msg, me.as_ref());
        }
        if state.selected == Some(peer) {
            state.messages = messages.clone();
        } else {
            debug!(peer, selected = ?state.selected, "discarding history for unselected peer");
        }
        Ok(messages)
    }

    /// Send `text` to the selected peer.
    ///
    /// A placeholder with a `temp-` id is shown at once. A well-formed reply
    /// replaces it in place; a failed request or an unrecognisable reply
    /// removes it and reloads the conversation.
    pub async fn send(&self, text: &str) -> Result<SendOutcome> {
        let me = self.session.require("send messages")?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::Validation("message text is required".into()));
        }

        let (peer, temp_id) = {
            let mut state = self.lock();
            let peer = state.selected.ok_or(ClientError::NoPeerSelected)?;
            let temp = ChatMessage {
                id: MessageId::new_temp(),
                sender_id: me.user_id,
                receiver_id: Some(peer),
                sender_username: me.username.clone(),
                text: text.to_string(),
                timestamp: Utc::now().to_rfc3339(),
            };
            let id = temp.id.clone();
            state.messages.push(temp);
            (peer, id)
        };
        debug!(peer, temp = %temp_id, "message queued");

        let reply = self.api.send(peer, text).await;
        let confirmed = match &reply {
            Ok(resp) => resp.confirmed(),
            Err(_) => None,
        };

        if let Some(mut msg) = confirmed {
            if msg.sender_username.is_none() {
                msg.sender_username = me.username.clone();
            }
            let mut state = self.lock();
            if let Some(slot) = state.messages.iter_mut().find(|m| m.id == temp_id) {
                *slot = msg.clone();
            } else if state.selected == Some(peer) && !state.messages.iter().any(|m| m.id == msg.id) {
                // A history reload dropped the placeholder before the reply came back.
                debug!(temp = %temp_id, id = %msg.id, "placeholder gone, appending confirmed message");
                state.messages.push(msg.clone());
            }
            info!(peer, id = %msg.id, "message sent");
            return Ok(SendOutcome::Confirmed(msg));
        }

        self.lock().messages.retain(|m| m.id != temp_id);
        match reply {
            Err(e) => {
                warn!(peer, error = %e, "send failed, resyncing conversation");
                if let Err(resync) = self.refresh_history(peer).await {
                    warn!(peer, error = %resync, "resync after failed send also failed");
                }
                Err(e)
            }
            Ok(_) => {
                warn!(peer, "send reply had no message, resyncing conversation");
                self.refresh_history(peer).await?;
                Ok(SendOutcome::Resynced)
            }
        }
    }
}
