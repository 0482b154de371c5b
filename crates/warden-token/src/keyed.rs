//! BLAKE3 keyed-MAC token service.

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::{Result, TokenError};
use crate::{Claims, TokenService};

/// Domain separation for the token MAC key.
const TOKEN_MAC_CONTEXT: &str = "warden token mac v1";

/// Token service authenticating claims with a BLAKE3 keyed MAC.
///
/// Token format: `hex(json(claims)) . hex(mac)` where
/// `mac = blake3::keyed_hash(key, json(claims))`. Validation recomputes
/// the MAC over the payload (constant-time compare), then checks expiry.
pub struct KeyedTokenService {
    key: [u8; 32],
}

impl KeyedTokenService {
    /// Create a service from a 32-byte signing key.
    ///
    /// Every node that must validate each other's tokens shares this key.
    /// The raw key material is run through a derivation step so unrelated
    /// uses of the same input key cannot collide with token MACs.
    pub fn new(key_material: &[u8; 32]) -> Self {
        Self {
            key: blake3::derive_key(TOKEN_MAC_CONTEXT, key_material),
        }
    }

    /// Create a service with a fresh random key.
    ///
    /// Tokens from previous process lifetimes will not validate.
    pub fn ephemeral() -> Self {
        let mut key_material = [0u8; 32];
        OsRng.fill_bytes(&mut key_material);
        Self::new(&key_material)
    }

    fn mac(&self, payload: &[u8]) -> blake3::Hash {
        blake3::keyed_hash(&self.key, payload)
    }
}

impl TokenService for KeyedTokenService {
    fn generate(&self, claims: &Claims) -> Result<String> {
        let payload =
            serde_json::to_vec(claims).map_err(|e| TokenError::Internal(e.to_string()))?;
        let mac = self.mac(&payload);
        Ok(format!("{}.{}", hex::encode(&payload), mac.to_hex()))
    }

    fn validate(&self, token: &str) -> Result<Claims> {
        let (payload_hex, mac_hex) = token.split_once('.').ok_or(TokenError::Invalid)?;
        let payload = hex::decode(payload_hex).map_err(|_| TokenError::Invalid)?;
        let presented = hex::decode(mac_hex).map_err(|_| TokenError::Invalid)?;

        let expected = self.mac(&payload);
        if presented.len() != 32
            || !bool::from(presented.as_slice().ct_eq(expected.as_bytes()))
        {
            debug!("Token MAC mismatch");
            return Err(TokenError::Invalid);
        }

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Invalid)?;
        if claims.expired_at(Utc::now()) {
            debug!(entity = %claims.entity_id, "Token expired");
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use warden_proto::Capability;

    fn service() -> KeyedTokenService {
        KeyedTokenService::new(&[7u8; 32])
    }

    fn claims() -> Claims {
        Claims::new("foo", vec![Capability::GlobalRoot], Duration::hours(1))
    }

    #[test]
    fn generate_validate_roundtrip() {
        let svc = service();
        let token = svc.generate(&claims()).unwrap();
        let got = svc.validate(&token).unwrap();
        assert_eq!(got.entity_id, "foo");
        assert!(got.has_capability(Capability::GlobalRoot));
    }

    #[test]
    fn global_root_implies_everything() {
        let c = claims();
        assert!(c.has_capability(Capability::CreateEntity));
        assert!(c.has_capability(Capability::DestroyGroup));
    }

    #[test]
    fn tampered_payload_rejected() {
        let svc = service();
        let token = svc.generate(&claims()).unwrap();
        // Flip one nibble of the payload.
        let mut chars: Vec<char> = token.chars().collect();
        chars[0] = if chars[0] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();
        assert!(matches!(svc.validate(&tampered), Err(TokenError::Invalid)));
    }

    #[test]
    fn foreign_key_rejected() {
        let token = service().generate(&claims()).unwrap();
        let other = KeyedTokenService::new(&[8u8; 32]);
        assert!(matches!(other.validate(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn expired_token_rejected() {
        let svc = service();
        let mut c = claims();
        c.issued_at -= 7200;
        c.expires_at = c.issued_at + 3600;
        let token = svc.generate(&c).unwrap();
        assert!(matches!(svc.validate(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn garbage_rejected() {
        let svc = service();
        for junk in ["", "no-dot", "zz.zz", "00.00"] {
            assert!(matches!(svc.validate(junk), Err(TokenError::Invalid)));
        }
    }

    #[test]
    fn ephemeral_keys_differ() {
        let a = KeyedTokenService::ephemeral();
        let b = KeyedTokenService::ephemeral();
        let token = a.generate(&claims()).unwrap();
        assert!(a.validate(&token).is_ok());
        assert!(b.validate(&token).is_err());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_roundtrip_arbitrary_entities(id in "[a-zA-Z0-9_.-]{1,32}", renewable in any::<bool>()) {
            let svc = service();
            let mut c = Claims::new(&id, vec![], Duration::hours(1));
            c.renewable = renewable;
            let token = svc.generate(&c).unwrap();
            let got = svc.validate(&token).unwrap();
            prop_assert_eq!(got.entity_id, id);
            prop_assert_eq!(got.renewable, renewable);
        }

        #[test]
        fn prop_arbitrary_strings_rejected(junk in ".{0,128}") {
            let svc = service();
            prop_assert!(svc.validate(&junk).is_err());
        }
    }
}
