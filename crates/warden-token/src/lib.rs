//! # warden-token
//!
//! Issuance and validation of signed capability tokens.
//!
//! A token is an opaque bearer string carrying [`Claims`]: the entity it
//! was issued to, the capability set it grants, issue/expiry timestamps,
//! and a renewal indicator. The wire treats tokens as opaque; only the
//! issuing service can validate them.
//!
//! Two implementations of the port exist:
//!
//! - [`KeyedTokenService`]: claims serialized to JSON and authenticated
//!   with a BLAKE3 keyed MAC. The production service.
//! - [`NullTokenService`]: recognizes three fixed strings, for tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
mod keyed;
mod null;

pub use error::{Result, TokenError};
pub use keyed::KeyedTokenService;
pub use null::{NullTokenService, INVALID_TOKEN, VALID_EMPTY_TOKEN, VALID_TOKEN};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use warden_proto::Capability;

/// Capability claims carried by a token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// ID of the entity the token was issued to.
    pub entity_id: String,

    /// Capabilities the token grants.
    pub capabilities: Vec<Capability>,

    /// Issue time, unix seconds.
    pub issued_at: i64,

    /// Expiry time, unix seconds.
    pub expires_at: i64,

    /// Whether the token may be renewed without re-authentication.
    pub renewable: bool,
}

impl Claims {
    /// Build claims for an entity, valid for `lifetime` from now.
    pub fn new(entity_id: impl Into<String>, capabilities: Vec<Capability>, lifetime: Duration) -> Self {
        let now = Utc::now();
        Claims {
            entity_id: entity_id.into(),
            capabilities,
            issued_at: now.timestamp(),
            expires_at: (now + lifetime).timestamp(),
            renewable: false,
        }
    }

    /// Whether the claims grant a capability, directly or via `GLOBAL_ROOT`.
    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&Capability::GlobalRoot) || self.capabilities.contains(&cap)
    }

    /// Whether the claims have expired as of `now`.
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at
    }
}

/// The token port: generate and validate bearer tokens.
pub trait TokenService: Send + Sync {
    /// Serialize and sign claims into an opaque token string.
    fn generate(&self, claims: &Claims) -> Result<String>;

    /// Validate a token and recover its claims.
    ///
    /// Any failure (bad signature, expired, unparseable) is
    /// [`TokenError::Invalid`].
    fn validate(&self, token: &str) -> Result<Claims>;
}
