use super::*;
use chrono::TimeZone;
use events::LastMessage;

fn ts(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).single().expect("valid timestamp")
}

fn room(id: &str, unread: u32, last_hour: Option<u32>) -> ChatRoomSummary {
    ChatRoomSummary {
        id: id.to_owned(),
        property_id: None,
        client_id: "u-1".to_owned(),
        agent_landlord_id: "u-2".to_owned(),
        unread_count: unread,
        last_message: last_hour.map(|hour| LastMessage {
            content: "…".to_owned(),
            timestamp: ts(hour),
        }),
        updated_at: None,
        created_at: None,
    }
}

fn ids(directory: &DirectoryState) -> Vec<&str> {
    directory.rooms.iter().map(|r| r.id.as_str()).collect()
}

#[test]
fn replace_rooms_orders_by_unread_then_activity() {
    let mut directory = DirectoryState::default();
    directory.replace_rooms(vec![
        room("b", 0, Some(11)),
        room("a", 2, Some(10)),
        room("c", 2, Some(12)),
    ]);
    assert_eq!(ids(&directory), vec!["c", "a", "b"]);
}

#[test]
fn unread_change_moves_room_behind_more_recent_peer() {
    // A(unread=2, last=10:00), B(unread=0, last=11:00).
    let mut directory = DirectoryState::default();
    directory.replace_rooms(vec![room("a", 2, Some(10)), room("b", 0, Some(11))]);
    assert_eq!(ids(&directory), vec!["a", "b"]);

    let applied = directory.apply_update(&ChatListUpdate {
        chat_room_id: "a".to_owned(),
        unread_count: Some(0),
        last_message: None,
    });
    assert!(applied);
    assert_eq!(ids(&directory), vec!["b", "a"]);
}

#[test]
fn apply_update_for_unknown_room_is_a_noop() {
    let mut directory = DirectoryState::default();
    directory.replace_rooms(vec![room("a", 0, Some(10))]);
    let applied = directory.apply_update(&ChatListUpdate {
        chat_room_id: "ghost".to_owned(),
        unread_count: Some(7),
        last_message: None,
    });
    assert!(!applied);
    assert_eq!(ids(&directory), vec!["a"]);
}

#[test]
fn last_message_update_resorts_by_recency() {
    let mut directory = DirectoryState::default();
    directory.replace_rooms(vec![room("a", 0, Some(10)), room("b", 0, Some(11))]);
    assert_eq!(ids(&directory), vec!["b", "a"]);

    directory.apply_update(&ChatListUpdate {
        chat_room_id: "a".to_owned(),
        unread_count: None,
        last_message: Some(LastMessage {
            content: "newest".to_owned(),
            timestamp: ts(12),
        }),
    });
    assert_eq!(ids(&directory), vec!["a", "b"]);
    assert_eq!(
        directory.rooms[0].last_message.as_ref().map(|m| m.content.as_str()),
        Some("newest")
    );
}

#[test]
fn upsert_room_is_idempotent_by_id() {
    let mut directory = DirectoryState::default();
    directory.upsert_room(room("a", 0, Some(10)));
    directory.upsert_room(room("a", 5, Some(11)));
    assert_eq!(directory.rooms.len(), 1);
    assert_eq!(directory.rooms[0].unread_count, 5);
}

#[test]
fn activity_falls_back_to_updated_then_created_timestamps() {
    let mut no_messages = room("a", 0, None);
    no_messages.created_at = Some(ts(9));
    let mut updated_later = room("b", 0, None);
    updated_later.created_at = Some(ts(8));
    updated_later.updated_at = Some(ts(10));

    let mut directory = DirectoryState::default();
    directory.replace_rooms(vec![no_messages, updated_later]);
    assert_eq!(ids(&directory), vec!["b", "a"]);
}

#[test]
fn property_title_cache_fill_does_not_reorder_rooms() {
    let mut directory = DirectoryState::default();
    directory.replace_rooms(vec![room("a", 1, Some(10)), room("b", 0, Some(11))]);
    let before = directory.room_ids();
    directory.set_property_title("p-1".to_owned(), "Two-bed flat".to_owned());
    assert_eq!(directory.room_ids(), before);
    assert_eq!(directory.property_title("p-1"), Some("Two-bed flat"));
}

#[test]
fn missing_property_ids_skips_cached_and_absent_entries() {
    let mut with_property = room("a", 0, None);
    with_property.property_id = Some("p-1".to_owned());
    let mut cached_property = room("b", 0, None);
    cached_property.property_id = Some("p-2".to_owned());

    let mut directory = DirectoryState::default();
    directory.replace_rooms(vec![with_property, cached_property, room("c", 0, None)]);
    directory.set_property_title("p-2".to_owned(), "Studio".to_owned());
    assert_eq!(directory.missing_property_ids(), vec!["p-1".to_owned()]);
}

#[test]
fn clear_empties_rooms_and_titles() {
    let mut directory = DirectoryState::default();
    directory.replace_rooms(vec![room("a", 0, Some(10))]);
    directory.set_property_title("p-1".to_owned(), "Loft".to_owned());
    directory.last_refresh_ok = true;
    directory.clear();
    assert!(directory.is_empty());
    assert!(directory.property_titles.is_empty());
    assert!(!directory.last_refresh_ok);
}

#[test]
fn order_stays_sorted_across_arbitrary_update_sequences() {
    let mut directory = DirectoryState::default();
    directory.replace_rooms(vec![
        room("a", 1, Some(9)),
        room("b", 0, Some(10)),
        room("c", 3, Some(8)),
    ]);

    let updates = [
        ("b", Some(4), None),
        ("c", Some(0), Some(13)),
        ("a", None, Some(12)),
        ("b", Some(0), None),
    ];
    for (id, unread, last_hour) in updates {
        directory.apply_update(&ChatListUpdate {
            chat_room_id: id.to_owned(),
            unread_count: unread,
            last_message: last_hour.map(|hour| LastMessage {
                content: "…".to_owned(),
                timestamp: ts(hour),
            }),
        });
        let sorted = directory.rooms.windows(2).all(|pair| {
            let key = |r: &ChatRoomSummary| (r.unread_count, latest_activity(r));
            key(&pair[0]) >= key(&pair[1])
        });
        assert!(sorted, "directory out of order after update to {id}");
    }
}
