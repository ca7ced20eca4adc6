use super::*;

fn temp_store() -> FileStore {
    let dir = std::env::temp_dir().join(format!("keyside-test-{}", uuid::Uuid::new_v4()));
    FileStore::open(dir).expect("temp dir should be creatable")
}

#[test]
fn memory_store_round_trips_json_values() {
    let store = MemoryStore::default();
    save_json(&store, keys::CHAT_ROOMS, &vec!["r-1".to_owned(), "r-2".to_owned()]);
    let loaded: Vec<String> = load_json(&store, keys::CHAT_ROOMS).expect("value should load");
    assert_eq!(loaded, vec!["r-1".to_owned(), "r-2".to_owned()]);
}

#[test]
fn memory_store_remove_clears_the_key() {
    let store = MemoryStore::default();
    store.set_raw(keys::SESSION, "{}");
    store.remove(keys::SESSION);
    assert!(store.get_raw(keys::SESSION).is_none());
}

#[test]
fn load_json_treats_malformed_data_as_absent() {
    let store = MemoryStore::default();
    store.set_raw(keys::SESSION, "{not json");
    let loaded: Option<serde_json::Value> = load_json(&store, keys::SESSION);
    assert!(loaded.is_none());
}

#[test]
fn file_store_round_trips_and_removes() {
    let store = temp_store();
    save_json(&store, keys::PREFERRED_ROLE, &"CLIENT".to_owned());
    let loaded: String = load_json(&store, keys::PREFERRED_ROLE).expect("value should load");
    assert_eq!(loaded, "CLIENT");

    store.remove(keys::PREFERRED_ROLE);
    assert!(store.get_raw(keys::PREFERRED_ROLE).is_none());

    let _ = std::fs::remove_dir_all(store.dir());
}

#[test]
fn file_store_missing_key_reads_as_none() {
    let store = temp_store();
    assert!(store.get_raw("never_written").is_none());
    let _ = std::fs::remove_dir_all(store.dir());
}
