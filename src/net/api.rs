//! REST api client for the marketplace backend.
//!
//! ERROR HANDLING
//! ==============
//! Missing caller input is rejected with `Validation` before any I/O. Bodies
//! are fetched as text and decoded separately so transport failures map to
//! `Network` and malformed payloads map to `Parse`.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::RwLock;
use std::time::Duration;

use events::{ChatRoomSummary, MessagePayload};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::state::session::Role;

/// Fixed timeout for every directory/history REST call.
pub(crate) const REST_TIMEOUT: Duration = Duration::from_secs(10);

/// User record as returned by auth and profile endpoints.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// Response of `POST /auth/login`. Either field may be absent when the
/// backend rejects the credentials.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<UserPayload>,
}

/// One membership record from `GET /chat/rooms/{userId}`.
#[derive(Clone, Debug, Deserialize)]
pub struct RoomIdRecord {
    pub id: String,
}

/// One lookup result from `POST /properties/titles`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTitleRecord {
    pub property_id: String,
    pub title: String,
}

/// Profile fields the user may change; absent fields are left untouched.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

fn rooms_endpoint(user_id: &str) -> String {
    format!("/chat/rooms/{user_id}")
}

fn messages_endpoint(chat_room_id: &str) -> String {
    format!("/chat/{chat_room_id}/messages")
}

fn profile_endpoint(user_id: &str) -> String {
    format!("/users/{user_id}")
}

fn require(value: &str, name: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        return Err(ClientError::Validation(format!("missing {name}")));
    }
    Ok(())
}

/// HTTP client with the backend base URL and the current bearer token.
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Build a client for `base_url` with the fixed [`REST_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns `Network` when the underlying HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(REST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth_token: RwLock::new(None),
        })
    }

    pub(crate) fn set_auth_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.auth_token.write() {
            *guard = token;
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let builder = self.http.request(method, url);
        let token = self
            .auth_token
            .read()
            .ok()
            .and_then(|guard| guard.clone());
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<T, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Server {
                endpoint: endpoint.to_owned(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn execute_empty(
        &self,
        builder: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<(), ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Server {
                endpoint: endpoint.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// `POST /auth/login`. A 401 maps to `InvalidCredentials`; the caller
    /// still has to check the response shape for a missing token/user.
    ///
    /// # Errors
    ///
    /// `Validation` for empty credentials, `InvalidCredentials` on rejection,
    /// `Network`/`Server`/`Parse` otherwise.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        require(email, "email")?;
        require(password, "password")?;
        let body = serde_json::json!({ "email": email, "password": password });
        let result = self
            .execute(
                self.request(reqwest::Method::POST, "/auth/login").json(&body),
                "auth/login",
            )
            .await;
        match result {
            Err(ClientError::Server { status: 401, .. }) => Err(ClientError::InvalidCredentials),
            other => other,
        }
    }

    /// `POST /auth/logout`, best-effort remote session invalidation.
    ///
    /// # Errors
    ///
    /// `Network`/`Server` on failure; callers treat this as advisory.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.execute_empty(
            self.request(reqwest::Method::POST, "/auth/logout"),
            "auth/logout",
        )
        .await
    }

    /// `GET /chat/rooms/{userId}`: the ids of rooms the user participates in.
    ///
    /// # Errors
    ///
    /// `Validation` for a missing user id, `Network`/`Server`/`Parse` otherwise.
    pub async fn chat_room_ids(&self, user_id: &str) -> Result<Vec<RoomIdRecord>, ClientError> {
        require(user_id, "user id")?;
        let path = rooms_endpoint(user_id);
        self.execute(self.request(reqwest::Method::GET, &path), "chat/rooms")
            .await
    }

    /// `POST /chat/detailed-rooms`: hydrate full room records for a known id
    /// set. The endpoint is batch-oriented, which is why membership and
    /// hydration are two separate calls.
    ///
    /// # Errors
    ///
    /// `Validation` for a missing user id, `Network`/`Server`/`Parse` otherwise.
    pub async fn detailed_rooms(
        &self,
        chat_room_ids: &[String],
        user_id: &str,
    ) -> Result<Vec<ChatRoomSummary>, ClientError> {
        require(user_id, "user id")?;
        if chat_room_ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({ "chatRoomIds": chat_room_ids, "userId": user_id });
        self.execute(
            self.request(reqwest::Method::POST, "/chat/detailed-rooms").json(&body),
            "chat/detailed-rooms",
        )
        .await
    }

    /// `GET /chat/{chatRoomId}/messages`: ordered message history for a room.
    ///
    /// # Errors
    ///
    /// `Validation` for a missing room id, `Network`/`Server`/`Parse` otherwise.
    pub async fn message_history(
        &self,
        chat_room_id: &str,
    ) -> Result<Vec<MessagePayload>, ClientError> {
        require(chat_room_id, "chat room id")?;
        let path = messages_endpoint(chat_room_id);
        self.execute(self.request(reqwest::Method::GET, &path), "chat/messages")
            .await
    }

    /// `POST /properties/titles`: display titles for a batch of property ids.
    ///
    /// # Errors
    ///
    /// `Network`/`Server`/`Parse` on failure.
    pub async fn property_titles(
        &self,
        property_ids: &[String],
    ) -> Result<Vec<PropertyTitleRecord>, ClientError> {
        if property_ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({ "propertyIds": property_ids });
        self.execute(
            self.request(reqwest::Method::POST, "/properties/titles").json(&body),
            "properties/titles",
        )
        .await
    }

    /// `POST /notifications/register`: associate a push token with the user.
    ///
    /// # Errors
    ///
    /// `Validation` for missing ids, `Network`/`Server` otherwise.
    pub async fn register_push_token(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<(), ClientError> {
        require(user_id, "user id")?;
        require(token, "push token")?;
        let body = serde_json::json!({ "userId": user_id, "token": token });
        self.execute_empty(
            self.request(reqwest::Method::POST, "/notifications/register").json(&body),
            "notifications/register",
        )
        .await
    }

    /// `PUT /users/{userId}`: save profile changes.
    ///
    /// # Errors
    ///
    /// `Validation` for a missing user id, `Network`/`Server`/`Parse` otherwise.
    pub async fn save_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<UserPayload, ClientError> {
        require(user_id, "user id")?;
        let path = profile_endpoint(user_id);
        self.execute(
            self.request(reqwest::Method::PUT, &path).json(update),
            "users/profile",
        )
        .await
    }
}
