//! Session state for the authenticated user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Single source of truth for "who is logged in". The session is created on
//! login or restored from local storage at startup, and destroyed on logout.
//! Invariant: `auth_token` and `user_id` are both present or the session does
//! not exist at all.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use serde::{Deserialize, Serialize};

/// Marketplace role of the authenticated user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// A prospective tenant/buyer browsing listings.
    Client,
    /// An agent or landlord managing listings.
    AgentLandlord,
}

/// The authenticated user plus their bearer token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub auth_token: String,
}

/// In-memory session store state.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub session: Option<Session>,
}

impl SessionState {
    /// Id of the logged-in user, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.user_id.as_str())
    }

    pub fn clear(&mut self) {
        self.session = None;
    }
}

/// Accept a restored session only when both the token and the user id are
/// present; anything else is treated as logged-out.
pub(crate) fn validate_restored(session: Session) -> Option<Session> {
    if session.auth_token.is_empty() || session.user_id.is_empty() {
        return None;
    }
    Some(session)
}
