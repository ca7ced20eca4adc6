//! Local key-value persistence for offline/startup caches.
//!
//! DESIGN
//! ======
//! One JSON document per canonical key. Reads degrade to `None` on any
//! failure and writes are best-effort: this layer is a startup cache, never
//! a source of truth, so a broken disk must not break the client.

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::state::lock;

/// Canonical storage keys. One key per datum; there is no legacy-key shim.
pub mod keys {
    /// The persisted [`crate::state::session::Session`].
    pub const SESSION: &str = "session";
    /// The last successfully refreshed room list (offline fallback).
    pub const CHAT_ROOMS: &str = "chat_rooms";
    /// The role tab the user last selected.
    pub const PREFERRED_ROLE: &str = "preferred_role";
}

/// Abstract key-value storage so tests can run fully in memory.
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Option<String>;
    fn set_raw(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Load a JSON value for `key`. Any failure reads as absence.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get_raw(key)?;
    serde_json::from_str(&raw).ok()
}

/// Save a JSON value for `key`, best-effort.
pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let Ok(raw) = serde_json::to_string(value) else {
        return;
    };
    store.set_raw(key, &raw);
}

/// File-backed store: one `<key>.json` per key under a data directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Open the per-user default location (`<platform data dir>/keyside`).
    ///
    /// # Errors
    ///
    /// Fails when the platform exposes no data directory or it is unwritable.
    pub fn open_default() -> io::Result<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no platform data directory"))?;
        Self::open(base.join("keyside"))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Directory backing this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl KeyValueStore for FileStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set_raw(&self, key: &str, value: &str) {
        if let Err(error) = fs::write(self.path_for(key), value) {
            tracing::warn!(key, %error, "failed to persist local state");
        }
    }

    fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.path_for(key));
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: &str) {
        lock(&self.entries).insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        lock(&self.entries).remove(key);
    }
}
