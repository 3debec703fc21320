//! Error types
//!
//! Every error here is recoverable: session entry points log them and carry on.

/// Error reported by a DOM host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("Selector rejected by host: {0}")]
    RejectedSelector(String),
    #[error("Host error: {0}")]
    Host(String),
}

/// Error handling a message on either side of the runtime protocol.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Missing field '{field}' for action '{action}'")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },
}

/// Failure of a round trip to the policy authority.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorityError {
    #[error("Authority unreachable: {0}")]
    Unreachable(String),
    #[error("Authority replied with an error: {0}")]
    Rejected(String),
    #[error("Malformed authority reply: {0}")]
    MalformedReply(String),
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
