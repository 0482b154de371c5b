//! Error types for the RPC layer, and their wire-code mapping.

use thiserror::Error;

use warden_core::TreeError;
use warden_proto::WireCode;

/// Errors a request can fail with before or while reaching the directory.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The request was missing a field the operation requires.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The bearer token was missing, invalid, or expired.
    #[error("authentication required")]
    Unauthenticated,

    /// The token was valid but lacks the required capability.
    #[error("requestor not qualified for this operation")]
    RequestorUnqualified,

    /// The directory rejected the operation.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl RpcError {
    /// The stable wire code for this error.
    pub fn wire_code(&self) -> WireCode {
        match self {
            RpcError::MalformedRequest(_) => WireCode::Malformed,
            RpcError::Unauthenticated => WireCode::Unauthenticated,
            RpcError::RequestorUnqualified => WireCode::RequestorUnqualified,
            RpcError::Tree(err) => match err {
                TreeError::ReadOnly => WireCode::ReadOnly,
                TreeError::DuplicateEntityID(_) | TreeError::DuplicateGroupName(_) => {
                    WireCode::Exists
                }
                TreeError::UnknownEntity(_) | TreeError::UnknownGroup(_) => WireCode::DoesNotExist,
                TreeError::UnknownCapability(_)
                | TreeError::UnknownHook(_)
                | TreeError::UnknownMode(_)
                | TreeError::MalformedExpansion(_) => WireCode::Malformed,
                TreeError::EntityLocked(_) | TreeError::AuthorizationFailure => {
                    WireCode::Unauthenticated
                }
                TreeError::Internal(_) => WireCode::Internal,
            },
        }
    }
}

/// Result type for RPC handlers.
pub type Result<T> = std::result::Result<T, RpcError>;
