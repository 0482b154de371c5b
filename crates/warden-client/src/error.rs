//! Error types for client operations.

use thiserror::Error;

use warden_proto::WireCode;

/// Errors that can occur while talking to a warden server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The connection failed or dropped.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// The server's reply did not parse.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with a non-OK wire code.
    #[error("server error ({code:?}): {msg}")]
    Server {
        /// The wire code the server returned.
        code: WireCode,
        /// The server's message.
        msg: String,
    },

    /// The local token store failed.
    #[error("token store error: {0}")]
    TokenStore(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
