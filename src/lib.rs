//! Client core for the Keyside real-estate marketplace.
//!
//! SYSTEM CONTEXT
//! ==============
//! This crate is the non-UI heart of the mobile client: the session store,
//! the chat-room directory, and per-conversation live chat sessions. Screens
//! observe [`state::Store`] handles and mutate nothing directly; all writes
//! flow through [`client::KeysideClient`] and [`net::channel::LiveChatSession`].

pub mod client;
pub mod error;
pub mod net;
pub mod state;
pub mod util;

pub use client::KeysideClient;
pub use error::ClientError;
pub use net::api::ProfileUpdate;
pub use state::Store;
