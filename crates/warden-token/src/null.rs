//! Fixed-string token service for tests.

use chrono::Utc;

use warden_proto::Capability;

use crate::error::{Result, TokenError};
use crate::{Claims, TokenService};

/// Token accepted with the full capability set.
pub const VALID_TOKEN: &str = "ValidToken";

/// Token accepted with no capabilities.
pub const VALID_EMPTY_TOKEN: &str = "ValidEmptyToken";

/// Token that always fails validation.
pub const INVALID_TOKEN: &str = "InvalidToken";

/// Token service recognizing three fixed strings.
///
/// `ValidToken` carries every capability, `ValidEmptyToken` carries none,
/// and anything else (including `InvalidToken`) is rejected. Generation
/// always returns `ValidToken`.
pub struct NullTokenService;

impl TokenService for NullTokenService {
    fn generate(&self, _claims: &Claims) -> Result<String> {
        Ok(VALID_TOKEN.to_string())
    }

    fn validate(&self, token: &str) -> Result<Claims> {
        let capabilities = match token {
            VALID_TOKEN => Capability::ALL.to_vec(),
            VALID_EMPTY_TOKEN => Vec::new(),
            _ => return Err(TokenError::Invalid),
        };
        let now = Utc::now().timestamp();
        Ok(Claims {
            entity_id: "valid".to_string(),
            capabilities,
            issued_at: now,
            expires_at: now + 3600,
            renewable: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_the_three_strings() {
        let svc = NullTokenService;
        assert!(svc.validate(VALID_TOKEN).unwrap().has_capability(Capability::GlobalRoot));
        assert!(svc.validate(VALID_EMPTY_TOKEN).unwrap().capabilities.is_empty());
        assert!(matches!(svc.validate(INVALID_TOKEN), Err(TokenError::Invalid)));
        assert!(matches!(svc.validate("anything-else"), Err(TokenError::Invalid)));
    }
}
