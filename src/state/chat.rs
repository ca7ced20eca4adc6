//! Per-conversation chat session state.
//!
//! DESIGN
//! ======
//! One instance per open conversation: the visible message list (newest
//! first), the seen-id set used to deduplicate channel deliveries, the
//! connection status, and the peer typing flag. History hydration registers
//! ids before the channel attaches, so a reconnect backlog replay can never
//! re-insert messages the REST fetch already produced.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use events::MessagePayload;

/// Channel connection lifecycle for one session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected; the socket is closed or not yet opened.
    #[default]
    Disconnected,
    /// Handshake or reconnect in progress.
    Connecting,
    /// Connected, registered, and joined to the room.
    Joined,
}

/// Delivery state of a message in the visible list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryState {
    /// Local optimistic echo, awaiting the server copy.
    Pending,
    /// Confirmed by the server (live delivery or history).
    Sent,
    /// Emission failed; rendered distinctly and never auto-retried.
    Failed,
}

/// One entry in the visible message list.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub chat_room_id: String,
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub delivery: DeliveryState,
}

impl From<MessagePayload> for ChatMessage {
    fn from(payload: MessagePayload) -> Self {
        Self {
            id: payload.id,
            chat_room_id: payload.chat_room_id,
            sender_id: payload.sender_id,
            content: payload.content,
            timestamp: payload.timestamp,
            delivery: DeliveryState::Sent,
        }
    }
}

/// Transient state of one live conversation.
#[derive(Clone, Debug, Default)]
pub struct ChatSessionState {
    /// Visible messages, newest first.
    pub messages: Vec<ChatMessage>,
    /// Server-assigned ids already inserted; duplicates are dropped.
    pub seen_ids: HashSet<String>,
    /// Whether the other participant is currently composing.
    pub peer_typing: bool,
    pub connection_status: ConnectionStatus,
}

impl ChatSessionState {
    /// Load REST history, replacing any existing list. Every id is recorded
    /// in the seen set so later channel replays are dropped.
    pub fn hydrate_history(&mut self, history: Vec<MessagePayload>) {
        self.messages.clear();
        self.seen_ids.clear();
        for payload in history {
            self.insert_incoming(payload);
        }
    }

    /// Insert a server-confirmed message at the head of the list.
    ///
    /// Returns `false` when the id was already seen (duplicate delivery from
    /// a reconnect backlog); the visible list is untouched in that case.
    pub fn insert_incoming(&mut self, payload: MessagePayload) -> bool {
        if !self.seen_ids.insert(payload.id.clone()) {
            return false;
        }
        self.messages.insert(0, ChatMessage::from(payload));
        true
    }

    /// Insert a local optimistic echo at the head of the list.
    pub fn insert_pending(&mut self, message: ChatMessage) {
        self.messages.insert(0, message);
    }

    /// Flip a pending message to failed. No-op for confirmed messages.
    pub fn mark_failed(&mut self, id: &str) -> bool {
        let Some(message) = self
            .messages
            .iter_mut()
            .find(|m| m.id == id && m.delivery == DeliveryState::Pending)
        else {
            return false;
        };
        message.delivery = DeliveryState::Failed;
        true
    }

    /// Drop a temporary echo once its grace window elapses, but only while it
    /// is still pending; failed messages stay visible.
    pub fn drop_if_pending(&mut self, id: &str) -> bool {
        let Some(index) = self
            .messages
            .iter()
            .position(|m| m.id == id && m.delivery == DeliveryState::Pending)
        else {
            return false;
        };
        self.messages.remove(index);
        true
    }

    /// Toggle the peer typing flag. Signals carrying the current user's own
    /// id are self-echo and are ignored.
    pub fn apply_peer_typing(&mut self, user_id: &str, self_user_id: &str, typing: bool) {
        if user_id == self_user_id {
            return;
        }
        self.peer_typing = typing;
    }

    /// Visible messages, newest first.
    #[must_use]
    pub fn visible_messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}
