//! Environment and persistence helpers shared across the client core.
//!
//! SYSTEM CONTEXT
//! ==============
//! Isolates filesystem concerns from state and networking code so stores can
//! be exercised in tests against an in-memory stand-in.

pub mod storage;
