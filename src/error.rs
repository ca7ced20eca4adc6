//! Error taxonomy shared across the client core.
//!
//! ERROR HANDLING
//! ==============
//! Read paths (directory refresh, history fetch, restore) swallow these and
//! degrade to cached or empty state; write paths (send, login, profile save)
//! surface them to the caller. Nothing here is fatal to the process.

/// Failure modes of the client core.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level REST failure: timeout, DNS, unreachable host.
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server returned HTTP {status} for {endpoint}")]
    Server { endpoint: String, status: u16 },
    /// A send was attempted while the channel is not joined.
    #[error("channel is not connected")]
    ChannelNotConnected,
    /// Malformed persisted or remote data; treated as absence by read paths.
    #[error("malformed data: {0}")]
    Parse(#[from] serde_json::Error),
    /// Caller-supplied bad input, rejected before any I/O.
    #[error("invalid input: {0}")]
    Validation(String),
    /// The login response carried no token or no user.
    #[error("login rejected: missing token or user")]
    InvalidCredentials,
    /// An inbound channel event could not be decoded.
    #[error("channel codec failure: {0}")]
    Codec(#[from] events::CodecError),
}
