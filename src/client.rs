//! Client facade: wires the session store, the room directory, and live
//! chat sessions to the REST api and local storage.
//!
//! ERROR HANDLING
//! ==============
//! Read paths (restore, directory refresh, history fetch) degrade to cached
//! or empty state and never surface errors past this boundary; write paths
//! (login, send, profile save, push registration) return them.

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

use std::sync::Arc;

use events::ChatRoomSummary;

use crate::error::ClientError;
use crate::net::api::{ApiClient, LoginResponse, ProfileUpdate};
use crate::net::channel::{ChannelConfig, LiveChatSession, channel_url};
use crate::state::Store;
use crate::state::chat::ChatSessionState;
use crate::state::directory::DirectoryState;
use crate::state::session::{Role, Session, SessionState, validate_restored};
use crate::util::storage::{KeyValueStore, keys, load_json, save_json};

/// Top-level client handle. One per process; screens share it and observe
/// the stores it owns.
pub struct KeysideClient {
    api: ApiClient,
    storage: Arc<dyn KeyValueStore>,
    session: Store<SessionState>,
    directory: Arc<Store<DirectoryState>>,
}

/// Build a [`Session`] from a login response, rejecting partial payloads.
fn session_from_login(response: LoginResponse) -> Result<Session, ClientError> {
    let (Some(token), Some(user)) = (response.token, response.user) else {
        return Err(ClientError::InvalidCredentials);
    };
    if token.is_empty() || user.id.is_empty() {
        return Err(ClientError::InvalidCredentials);
    }
    Ok(Session {
        user_id: user.id,
        username: user.username,
        email: user.email,
        role: user.role,
        auth_token: token,
    })
}

impl KeysideClient {
    /// Build a client against `base_url`, persisting through `storage`.
    ///
    /// # Errors
    ///
    /// Returns `Network` when the HTTP client cannot be constructed.
    pub fn new(base_url: &str, storage: Arc<dyn KeyValueStore>) -> Result<Self, ClientError> {
        Ok(Self {
            api: ApiClient::new(base_url)?,
            storage,
            session: Store::default(),
            directory: Arc::new(Store::default()),
        })
    }

    /// The logged-in session, if any.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session.read(|state| state.session.clone())
    }

    /// Snapshot of the ordered room directory.
    #[must_use]
    pub fn rooms(&self) -> Vec<ChatRoomSummary> {
        self.directory.read(|dir| dir.rooms.clone())
    }

    /// Shared handle to the directory store, for observers.
    #[must_use]
    pub fn directory(&self) -> Arc<Store<DirectoryState>> {
        self.directory.clone()
    }

    /// Restore a persisted session at startup.
    ///
    /// Parse errors and partial records read as logged-out after a
    /// best-effort cleanup of the stored key. A restored session triggers a
    /// directory preload.
    pub async fn restore(&self) -> Option<Session> {
        let raw = self.storage.get_raw(keys::SESSION)?;
        let parsed = serde_json::from_str::<Session>(&raw).ok();
        let Some(session) = parsed.and_then(validate_restored) else {
            self.storage.remove(keys::SESSION);
            return None;
        };

        self.api.set_auth_token(Some(session.auth_token.clone()));
        self.session.update(|state| state.session = Some(session.clone()));
        let _ = self.refresh_rooms().await;
        Some(session)
    }

    /// Authenticate and start a fresh session, overwriting any prior one.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` when the backend rejects the credentials or the
    /// response lacks a token or user; `Validation`/`Network`/`Server` per
    /// the api client.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let response = self.api.login(email, password).await?;
        let session = session_from_login(response)?;

        save_json(self.storage.as_ref(), keys::SESSION, &session);
        self.api.set_auth_token(Some(session.auth_token.clone()));
        self.session.update(|state| state.session = Some(session.clone()));
        let _ = self.refresh_rooms().await;
        Ok(session)
    }

    /// Log out. Local persisted and in-memory state is always cleared, even
    /// when the remote notification fails; never an error to the caller.
    pub async fn logout(&self) {
        if let Err(error) = self.api.logout().await {
            tracing::debug!(%error, "remote logout failed; clearing local session anyway");
        }
        self.storage.remove(keys::SESSION);
        self.storage.remove(keys::CHAT_ROOMS);
        self.api.set_auth_token(None);
        self.session.update(SessionState::clear);
        self.directory.update(DirectoryState::clear);
    }

    /// Refresh the room directory: membership ids, then batch hydration.
    ///
    /// On success the whole collection is replaced, re-sorted, and persisted
    /// as the offline fallback. On failure the last persisted copy is loaded
    /// if present, else the directory empties. Returns a success flag only.
    pub async fn refresh_rooms(&self) -> bool {
        let Some(user_id) = self.session.read(|state| state.user_id().map(ToOwned::to_owned))
        else {
            self.directory.update(DirectoryState::clear);
            return false;
        };

        match self.fetch_rooms(&user_id).await {
            Ok(rooms) => {
                self.directory.update(|dir| {
                    dir.replace_rooms(rooms);
                    dir.last_refresh_ok = true;
                });
                self.persist_rooms();
                self.hydrate_property_titles().await;
                true
            }
            Err(error) => {
                tracing::warn!(%error, "room refresh failed; falling back to cached directory");
                let cached: Option<Vec<ChatRoomSummary>> =
                    load_json(self.storage.as_ref(), keys::CHAT_ROOMS);
                self.directory.update(|dir| {
                    dir.last_refresh_ok = false;
                    match cached {
                        Some(rooms) => dir.replace_rooms(rooms),
                        None => dir.clear(),
                    }
                });
                false
            }
        }
    }

    async fn fetch_rooms(&self, user_id: &str) -> Result<Vec<ChatRoomSummary>, ClientError> {
        let ids: Vec<String> = self
            .api
            .chat_room_ids(user_id)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();
        self.api.detailed_rooms(&ids, user_id).await
    }

    fn persist_rooms(&self) {
        let rooms = self.directory.read(|dir| dir.rooms.clone());
        save_json(self.storage.as_ref(), keys::CHAT_ROOMS, &rooms);
    }

    /// Fill the property-title cache for rooms whose titles are unknown.
    /// Failures are swallowed; titles are cosmetic.
    async fn hydrate_property_titles(&self) {
        let missing = self.directory.read(DirectoryState::missing_property_ids);
        if missing.is_empty() {
            return;
        }
        match self.api.property_titles(&missing).await {
            Ok(records) => self.directory.update(|dir| {
                for record in records {
                    dir.set_property_title(record.property_id, record.title);
                }
            }),
            Err(error) => tracing::debug!(%error, "property title lookup failed"),
        }
    }

    /// Open a live chat session for one room: hydrate history over REST,
    /// then attach the channel. History failures start the conversation
    /// empty rather than failing the open.
    ///
    /// # Errors
    ///
    /// `Validation` when no user is logged in, the room id is empty, or the
    /// base URL cannot be mapped to a channel endpoint.
    pub async fn open_room(&self, chat_room_id: &str) -> Result<LiveChatSession, ClientError> {
        if chat_room_id.trim().is_empty() {
            return Err(ClientError::Validation("missing chat room id".to_owned()));
        }
        let Some(session) = self.session() else {
            return Err(ClientError::Validation("not logged in".to_owned()));
        };

        let history = match self.api.message_history(chat_room_id).await {
            Ok(history) => history,
            Err(error) => {
                tracing::warn!(%error, "history fetch failed; starting with an empty conversation");
                Vec::new()
            }
        };

        let state = Arc::new(Store::new(ChatSessionState::default()));
        state.update(|chat| chat.hydrate_history(history));

        let config = ChannelConfig {
            url: channel_url(self.api.base_url())?,
            user_id: session.user_id,
            chat_room_id: chat_room_id.to_owned(),
        };
        Ok(LiveChatSession::open(
            config,
            state,
            self.directory.clone(),
            self.storage.clone(),
        ))
    }

    /// Save profile changes. Write-path failures surface to the caller; on
    /// success the session record is updated and re-persisted.
    ///
    /// # Errors
    ///
    /// `Validation` when not logged in; `Network`/`Server`/`Parse` otherwise.
    pub async fn save_profile(&self, update: &ProfileUpdate) -> Result<Session, ClientError> {
        let Some(session) = self.session() else {
            return Err(ClientError::Validation("not logged in".to_owned()));
        };
        let user = self.api.save_profile(&session.user_id, update).await?;
        let updated = Session {
            username: user.username,
            email: user.email,
            role: user.role,
            ..session
        };
        save_json(self.storage.as_ref(), keys::SESSION, &updated);
        self.session.update(|state| state.session = Some(updated.clone()));
        Ok(updated)
    }

    /// Register a push-notification token for the logged-in user.
    ///
    /// # Errors
    ///
    /// `Validation` when not logged in or the token is empty;
    /// `Network`/`Server` otherwise.
    pub async fn register_push_token(&self, token: &str) -> Result<(), ClientError> {
        let Some(session) = self.session() else {
            return Err(ClientError::Validation("not logged in".to_owned()));
        };
        self.api.register_push_token(&session.user_id, token).await
    }

    /// Persist the role tab the user last selected.
    pub fn set_preferred_role(&self, role: Role) {
        save_json(self.storage.as_ref(), keys::PREFERRED_ROLE, &role);
    }

    /// The last selected role, if one was persisted.
    #[must_use]
    pub fn preferred_role(&self) -> Option<Role> {
        load_json(self.storage.as_ref(), keys::PREFERRED_ROLE)
    }
}
