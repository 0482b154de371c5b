//! Error types for crypto operations.

use thiserror::Error;

/// Errors that can occur while securing or verifying secrets.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The supplied secret does not match the stored verifier.
    #[error("authorization failure")]
    AuthorizationFailure,

    /// The engine itself failed (malformed verifier, RNG failure, ...).
    #[error("internal crypto error: {0}")]
    Internal(String),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
