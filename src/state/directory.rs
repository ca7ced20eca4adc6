//! Chat-room directory: the client-cached view of a user's rooms.
//!
//! DESIGN
//! ======
//! The directory is the authoritative client-side ordered view of rooms,
//! unread counts, and last-message previews, reconciled between full REST
//! refreshes and incremental push events. Ordering is never patched in
//! place: every mutation recomputes the full sort so derived order cannot
//! drift from the contributing fields.

#[cfg(test)]
#[path = "directory_test.rs"]
mod directory_test;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use events::{ChatListUpdate, ChatRoomSummary};

/// Directory of the user's chat rooms plus the lazy property-title cache.
#[derive(Clone, Debug, Default)]
pub struct DirectoryState {
    /// Rooms in derived display order; see [`DirectoryState::resort`].
    pub rooms: Vec<ChatRoomSummary>,
    /// Lazily filled `property_id -> display title` cache.
    pub property_titles: HashMap<String, String>,
    /// Whether the most recent refresh reached the server.
    pub last_refresh_ok: bool,
}

impl DirectoryState {
    /// Replace the whole collection (refresh path) and recompute the order.
    pub fn replace_rooms(&mut self, rooms: Vec<ChatRoomSummary>) {
        self.rooms = rooms;
        self.resort();
    }

    /// Insert a room, or replace the existing record with the same id.
    /// Idempotent: a room already present is never duplicated.
    pub fn upsert_room(&mut self, room: ChatRoomSummary) {
        if let Some(existing) = self.rooms.iter_mut().find(|r| r.id == room.id) {
            *existing = room;
        } else {
            self.rooms.push(room);
        }
        self.resort();
    }

    /// Apply an incremental unread/last-message change pushed by the server.
    ///
    /// Returns `false` when the referenced room is unknown; refresh will pick
    /// it up, and a `new_chat_room` event is expected for genuinely new rooms.
    pub fn apply_update(&mut self, update: &ChatListUpdate) -> bool {
        let Some(room) = self.rooms.iter_mut().find(|r| r.id == update.chat_room_id) else {
            return false;
        };
        if let Some(unread) = update.unread_count {
            room.unread_count = unread;
        }
        if let Some(last) = &update.last_message {
            room.last_message = Some(last.clone());
        }
        self.resort();
        true
    }

    /// Fill the property-title cache. Pure cache write, no re-sort.
    pub fn set_property_title(&mut self, property_id: String, title: String) {
        self.property_titles.insert(property_id, title);
    }

    /// Display title for a room's property, when cached.
    #[must_use]
    pub fn property_title(&self, property_id: &str) -> Option<&str> {
        self.property_titles.get(property_id).map(String::as_str)
    }

    /// Property ids referenced by rooms but absent from the title cache.
    #[must_use]
    pub fn missing_property_ids(&self) -> Vec<String> {
        let mut missing: Vec<String> = self
            .rooms
            .iter()
            .filter_map(|room| room.property_id.as_ref())
            .filter(|id| !self.property_titles.contains_key(*id))
            .cloned()
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    /// Ids of all rooms currently in the directory.
    #[must_use]
    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.iter().map(|room| room.id.clone()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn clear(&mut self) {
        self.rooms.clear();
        self.property_titles.clear();
        self.last_refresh_ok = false;
    }

    /// Recompute display order: unread count descending, then most recent
    /// activity descending.
    pub fn resort(&mut self) {
        self.rooms.sort_by(|a, b| {
            b.unread_count
                .cmp(&a.unread_count)
                .then_with(|| latest_activity(b).cmp(&latest_activity(a)))
        });
    }
}

/// Most recent of last-message time, `updated_at`, and `created_at`.
fn latest_activity(room: &ChatRoomSummary) -> DateTime<Utc> {
    let last_message = room.last_message.as_ref().map(|m| m.timestamp);
    [last_message, room.updated_at, room.created_at]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
