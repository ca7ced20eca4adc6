//! Shared event model and JSON codec for the realtime chat channel.
//!
//! This crate owns the wire representation spoken over the bidirectional
//! channel: named events with a JSON payload, serialized as
//! `{"event": "...", "data": {...}}` text messages. Payload field names are
//! camelCase to match the backend's REST responses, so the room and message
//! shapes here double as REST DTOs for the client crate.


use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Errors produced by the event codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw text is not valid JSON or does not name a known event.
    #[error("failed to decode channel event: {0}")]
    Decode(#[from] serde_json::Error),
    /// The event payload could not be serialized.
    #[error("failed to encode channel event: {0}")]
    Encode(serde_json::Error),
}

/// A chat message as carried on the wire and in REST history responses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// Server-assigned message identifier.
    pub id: String,
    /// Room this message belongs to.
    pub chat_room_id: String,
    /// User who sent the message.
    pub sender_id: String,
    /// Message body.
    pub content: String,
    /// Server-side creation time.
    pub timestamp: DateTime<Utc>,
}

/// Preview of the most recent message in a room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One chat room as reported by the detail endpoint and push events.
///
/// `unread_count` and `last_message` are derived server-side; ordering is
/// never part of this record and is always recomputed by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomSummary {
    /// Room identifier.
    pub id: String,
    /// Listing the conversation is about, if known.
    #[serde(default)]
    pub property_id: Option<String>,
    /// Client-side participant.
    pub client_id: String,
    /// Agent/landlord participant.
    pub agent_landlord_id: String,
    /// Messages not yet read by the current user.
    #[serde(default)]
    pub unread_count: u32,
    /// Most recent message preview, absent for empty rooms.
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Incremental directory change pushed over the channel.
///
/// Either field may be absent; an update carrying neither is a no-op.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatListUpdate {
    /// Room the update applies to.
    pub chat_room_id: String,
    /// New unread count, when it changed.
    #[serde(default)]
    pub unread_count: Option<u32>,
    /// New last-message preview, when it changed.
    #[serde(default)]
    pub last_message: Option<LastMessage>,
}

/// Events emitted by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Announce the connecting user so the server can route pushes.
    RegisterUser { user_id: String },
    /// Subscribe to one room's live message stream.
    JoinRoom {
        chat_room_id: String,
        user_id: String,
    },
    /// Deliver a new message to a room.
    SendMessage {
        chat_room_id: String,
        sender_id: String,
        content: String,
    },
    /// The user started composing.
    TypingStart {
        user_id: String,
        chat_room_id: String,
    },
    /// The user stopped composing.
    TypingStop {
        user_id: String,
        chat_room_id: String,
    },
}

/// Events delivered by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// A confirmed message, either fresh or replayed after a reconnect.
    ReceiveMessage(MessagePayload),
    /// Unread-count / last-message change for one room.
    ChatListUpdate(ChatListUpdate),
    /// A room the client has not seen before.
    NewChatRoom(ChatRoomSummary),
    /// Another participant started composing.
    UserTyping { user_id: String },
    /// Another participant stopped composing.
    UserStopTyping { user_id: String },
    /// Server-side failure notice; informational only.
    Error { message: String },
}

/// Encode an event into its JSON text form.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] when the payload cannot be serialized.
pub fn encode_event<T: Serialize>(event: &T) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(CodecError::Encode)
}

/// Decode a JSON text message into an event.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed JSON or unknown event names.
pub fn decode_event<T: DeserializeOwned>(raw: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(raw)?)
}
