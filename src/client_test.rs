use super::*;
use chrono::{TimeZone, Utc};
use events::LastMessage;

use crate::net::api::UserPayload;
use crate::util::storage::MemoryStore;

fn client_with_store() -> (KeysideClient, Arc<MemoryStore>) {
    // Port 1 never answers, so every REST call fails fast with a
    // connection error; that is exactly what the fallback tests need.
    let storage = Arc::new(MemoryStore::default());
    let client =
        KeysideClient::new("http://127.0.0.1:1", storage.clone()).expect("client should build");
    (client, storage)
}

fn sample_session() -> Session {
    Session {
        user_id: "u-1".to_owned(),
        username: "ann".to_owned(),
        email: "ann@example.com".to_owned(),
        role: Role::Client,
        auth_token: "tok-1".to_owned(),
    }
}

fn sample_room(id: &str, unread: u32, hour: u32) -> ChatRoomSummary {
    ChatRoomSummary {
        id: id.to_owned(),
        property_id: None,
        client_id: "u-1".to_owned(),
        agent_landlord_id: "u-2".to_owned(),
        unread_count: unread,
        last_message: Some(LastMessage {
            content: "…".to_owned(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).single().expect("timestamp"),
        }),
        updated_at: None,
        created_at: None,
    }
}

#[test]
fn session_from_login_requires_token_and_user() {
    let missing_both = LoginResponse {
        token: None,
        user: None,
    };
    assert!(matches!(
        session_from_login(missing_both),
        Err(ClientError::InvalidCredentials)
    ));

    let missing_user = LoginResponse {
        token: Some("tok".to_owned()),
        user: None,
    };
    assert!(matches!(
        session_from_login(missing_user),
        Err(ClientError::InvalidCredentials)
    ));

    let complete = LoginResponse {
        token: Some("tok".to_owned()),
        user: Some(UserPayload {
            id: "u-1".to_owned(),
            username: "ann".to_owned(),
            email: "ann@example.com".to_owned(),
            role: Role::AgentLandlord,
        }),
    };
    let session = session_from_login(complete).expect("complete response should log in");
    assert_eq!(session.auth_token, "tok");
    assert_eq!(session.role, Role::AgentLandlord);
}

#[tokio::test]
async fn restore_without_persisted_session_reads_as_logged_out() {
    let (client, _storage) = client_with_store();
    assert!(client.restore().await.is_none());
    assert!(client.session().is_none());
}

#[tokio::test]
async fn restore_cleans_up_corrupt_session_data() {
    let (client, storage) = client_with_store();
    storage.set_raw(keys::SESSION, "{broken json");
    assert!(client.restore().await.is_none());
    assert!(storage.get_raw(keys::SESSION).is_none(), "corrupt key should be removed");
}

#[tokio::test]
async fn restore_rejects_partial_session_and_cleans_up() {
    let (client, storage) = client_with_store();
    let mut partial = sample_session();
    partial.auth_token = String::new();
    save_json(storage.as_ref(), keys::SESSION, &partial);
    assert!(client.restore().await.is_none());
    assert!(storage.get_raw(keys::SESSION).is_none());
}

#[tokio::test]
async fn restore_accepts_complete_session_despite_unreachable_backend() {
    let (client, storage) = client_with_store();
    save_json(storage.as_ref(), keys::SESSION, &sample_session());
    let restored = client.restore().await.expect("complete session should restore");
    assert_eq!(restored.user_id, "u-1");
    assert_eq!(client.session(), Some(restored));
}

#[tokio::test]
async fn refresh_without_session_empties_the_directory() {
    let (client, _storage) = client_with_store();
    assert!(!client.refresh_rooms().await);
    assert!(client.rooms().is_empty());
}

#[tokio::test]
async fn refresh_failure_falls_back_to_persisted_rooms() {
    let (client, storage) = client_with_store();
    save_json(storage.as_ref(), keys::SESSION, &sample_session());
    let cached = vec![sample_room("r-1", 0, 10), sample_room("r-2", 3, 9)];
    save_json(storage.as_ref(), keys::CHAT_ROOMS, &cached);

    let _ = client.restore().await;
    assert!(!client.refresh_rooms().await, "unreachable backend must report failure");

    // Stale cache is preferred over no data, and order is recomputed.
    let ids: Vec<String> = client.rooms().iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec!["r-2".to_owned(), "r-1".to_owned()]);
    assert!(!client.directory().read(|dir| dir.last_refresh_ok));
}

#[tokio::test]
async fn persisted_rooms_round_trip_preserves_the_id_set() {
    let (client, storage) = client_with_store();
    let rooms = vec![sample_room("r-1", 2, 10), sample_room("r-2", 0, 11)];
    save_json(storage.as_ref(), keys::CHAT_ROOMS, &rooms);
    save_json(storage.as_ref(), keys::SESSION, &sample_session());
    let _ = client.restore().await;
    let _ = client.refresh_rooms().await;

    let mut restored = client.directory().read(DirectoryState::room_ids);
    let mut original: Vec<String> = rooms.iter().map(|r| r.id.clone()).collect();
    restored.sort();
    original.sort();
    assert_eq!(restored, original);
}

#[tokio::test]
async fn refresh_failure_without_cache_empties_the_directory() {
    let (client, storage) = client_with_store();
    save_json(storage.as_ref(), keys::SESSION, &sample_session());
    let _ = client.restore().await;
    client.directory().update(|dir| dir.upsert_room(sample_room("stale", 0, 8)));

    assert!(!client.refresh_rooms().await);
    assert!(client.rooms().is_empty());
}

#[tokio::test]
async fn logout_clears_storage_session_and_directory_even_offline() {
    let (client, storage) = client_with_store();
    save_json(storage.as_ref(), keys::SESSION, &sample_session());
    save_json(storage.as_ref(), keys::CHAT_ROOMS, &vec![sample_room("r-1", 1, 10)]);
    let _ = client.restore().await;
    assert!(client.session().is_some());

    client.logout().await;
    assert!(client.session().is_none());
    assert!(client.rooms().is_empty());
    assert!(storage.get_raw(keys::SESSION).is_none());
    assert!(storage.get_raw(keys::CHAT_ROOMS).is_none());
}

#[tokio::test]
async fn open_room_requires_login_and_room_id() {
    let (client, storage) = client_with_store();
    assert!(matches!(
        client.open_room("r-1").await,
        Err(ClientError::Validation(_))
    ));

    save_json(storage.as_ref(), keys::SESSION, &sample_session());
    let _ = client.restore().await;
    assert!(matches!(
        client.open_room(" ").await,
        Err(ClientError::Validation(_))
    ));
}

#[tokio::test]
async fn open_room_starts_empty_when_history_is_unreachable() {
    let (client, storage) = client_with_store();
    save_json(storage.as_ref(), keys::SESSION, &sample_session());
    let _ = client.restore().await;

    let session = client.open_room("r-1").await.expect("open should tolerate history failure");
    assert!(session.messages().is_empty());
    session.close();
}

#[tokio::test]
async fn write_paths_require_a_session() {
    let (client, _storage) = client_with_store();
    assert!(matches!(
        client.save_profile(&ProfileUpdate::default()).await,
        Err(ClientError::Validation(_))
    ));
    assert!(matches!(
        client.register_push_token("push-tok").await,
        Err(ClientError::Validation(_))
    ));
}

#[test]
fn preferred_role_round_trips() {
    let (client, _storage) = client_with_store();
    assert!(client.preferred_role().is_none());
    client.set_preferred_role(Role::AgentLandlord);
    assert_eq!(client.preferred_role(), Some(Role::AgentLandlord));
}
