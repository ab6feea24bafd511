use serde_json::Value;
use thiserror::Error;

/// ClientError
///
/// The single failure taxonomy of the session and resource layer. Every failure
/// either changes session state (`AuthorizationExpired`) or is handed back to the
/// calling view for presentation; nothing here is swallowed.
///
/// The enum is `Clone` because one coalesced fetch delivers its outcome to every
/// waiter on the same cache key.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The token-issuance endpoint rejected the identity proof or was unreachable.
    #[error("token exchange failed: {0}")]
    AuthExchange(String),

    /// A protected call was attempted with no session. No network access happened.
    #[error("no active session")]
    Unauthenticated,

    /// The server rejected an attached credential (401/403). The session has
    /// already been terminated when the caller sees this.
    #[error("session credential rejected by server (HTTP {status})")]
    AuthorizationExpired { status: u16 },

    /// Network failure or transport timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx application response, not interpreted by this layer.
    #[error("resource request failed with HTTP {status}")]
    Resource { status: u16, payload: Value },

    /// A 2xx response whose body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// Persisted token storage could not be read or written.
    #[error("token storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Storage(e.to_string())
    }
}

/// Result type for session and resource operations
pub type Result<T> = std::result::Result<T, ClientError>;
