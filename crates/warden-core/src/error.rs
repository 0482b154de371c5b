//! Error types for directory operations.
//!
//! This is the closed taxonomy every mutation can fail with. Errors bubble
//! verbatim from hook to chain to manager to caller; the RPC layer maps
//! them onto stable wire codes.

use thiserror::Error;

use warden_crypto::CryptoError;
use warden_proto::capability::UnknownCapability;
use warden_store::StoreError;

/// Errors that can occur during directory operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TreeError {
    /// Write attempted while the service is read-only.
    #[error("server is in read-only mode")]
    ReadOnly,

    /// An entity with this ID already exists.
    #[error("duplicate entity ID: {0:?}")]
    DuplicateEntityID(String),

    /// A group with this name already exists.
    #[error("duplicate group name: {0:?}")]
    DuplicateGroupName(String),

    /// No entity with the requested ID.
    #[error("unknown entity: {0:?}")]
    UnknownEntity(String),

    /// No group with the requested name.
    #[error("unknown group: {0:?}")]
    UnknownGroup(String),

    /// Capability name outside the closed enumeration.
    #[error("unknown capability: {0:?}")]
    UnknownCapability(String),

    /// A chain referenced a hook that was never registered.
    #[error("unknown hook: {0:?}")]
    UnknownHook(String),

    /// A key or meta operation named a mode outside its set.
    #[error("unknown mode: {0:?}")]
    UnknownMode(String),

    /// An expansion string did not parse as `OP:target`.
    #[error("malformed expansion: {0:?}")]
    MalformedExpansion(String),

    /// Authentication attempted against a locked entity.
    #[error("entity is locked: {0:?}")]
    EntityLocked(String),

    /// Secret verification failed.
    #[error("authorization failure")]
    AuthorizationFailure,

    /// A storage or crypto port failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for TreeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownEntity(id) => TreeError::UnknownEntity(id),
            StoreError::UnknownGroup(name) => TreeError::UnknownGroup(name),
            StoreError::Internal(msg) => TreeError::Internal(msg),
        }
    }
}

impl From<CryptoError> for TreeError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthorizationFailure => TreeError::AuthorizationFailure,
            CryptoError::Internal(msg) => TreeError::Internal(msg),
        }
    }
}

impl From<UnknownCapability> for TreeError {
    fn from(err: UnknownCapability) -> Self {
        TreeError::UnknownCapability(err.0)
    }
}

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, TreeError>;
