//! Error types for the core library.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No usable bearer token could be obtained from the security service.
    #[error("authentication unavailable: {0}")]
    AuthUnavailable(String),

    /// The Graph API rejected or failed the call.
    #[error("graph error: {0}")]
    Graph(String),

    /// Malformed caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// No chat matched a lookup.
    #[error("chat not found: {0}")]
    ChatNotFound(String),

    /// A configuration-related error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;
