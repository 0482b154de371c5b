//! Error types for token operations.

use thiserror::Error;

/// Errors that can occur while issuing or validating tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token is malformed, forged, or expired.
    #[error("token invalid")]
    Invalid,

    /// The service itself failed to produce a token.
    #[error("internal token error: {0}")]
    Internal(String),
}

/// Result type for token operations.
pub type Result<T> = std::result::Result<T, TokenError>;
