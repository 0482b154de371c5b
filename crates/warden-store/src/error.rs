//! Error types for storage operations.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entity with the requested ID.
    #[error("unknown entity: {0:?}")]
    UnknownEntity(String),

    /// No group with the requested name.
    #[error("unknown group: {0:?}")]
    UnknownGroup(String),

    /// The backend itself failed.
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
