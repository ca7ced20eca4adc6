//! Networking: REST api client and the realtime channel lifecycle.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` handles REST calls, `channel` manages the bidirectional event
//! connection; the wire schema itself lives in the `events` crate.

pub mod api;
pub mod channel;
