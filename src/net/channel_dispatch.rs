//! Pure handlers mapping inbound channel events onto state stores.
//!
//! Extracted from `channel` so the reconciliation rules can be tested
//! without a socket.

#[cfg(test)]
#[path = "channel_dispatch_test.rs"]
mod channel_dispatch_test;

use events::ServerEvent;

use crate::state::chat::ChatSessionState;
use crate::state::directory::DirectoryState;

/// Apply a message delivery to the open conversation.
///
/// Deliveries for other rooms are consumed without touching the list; the
/// directory hears about those through `chat_list_update`.
pub(super) fn handle_message_event(
    event: &ServerEvent,
    chat: &mut ChatSessionState,
    chat_room_id: &str,
) -> bool {
    let ServerEvent::ReceiveMessage(payload) = event else {
        return false;
    };
    if payload.chat_room_id == chat_room_id {
        chat.insert_incoming(payload.clone());
    }
    true
}

/// Toggle the peer-typing flag, suppressing the user's own echo.
pub(super) fn handle_typing_event(
    event: &ServerEvent,
    chat: &mut ChatSessionState,
    self_user_id: &str,
) -> bool {
    match event {
        ServerEvent::UserTyping { user_id } => {
            chat.apply_peer_typing(user_id, self_user_id, true);
            true
        }
        ServerEvent::UserStopTyping { user_id } => {
            chat.apply_peer_typing(user_id, self_user_id, false);
            true
        }
        _ => false,
    }
}

/// Apply a pushed directory change. Returns `true` when the event was a
/// directory event (the caller persists the room list in that case).
pub(super) fn handle_directory_event(event: &ServerEvent, directory: &mut DirectoryState) -> bool {
    match event {
        ServerEvent::ChatListUpdate(update) => {
            directory.apply_update(update);
            true
        }
        ServerEvent::NewChatRoom(room) => {
            directory.upsert_room(room.clone());
            true
        }
        _ => false,
    }
}
