//! Degenerate equality-comparison engine for tests.

use subtle::ConstantTimeEq;

use crate::error::{CryptoError, Result};
use crate::SecretStore;

/// Secret engine that stores the plaintext as its own verifier.
///
/// Exists so tests can exercise secret flows without paying for a KDF.
/// Comparison is still constant-time to preserve the port contract.
pub struct PlainEngine;

impl SecretStore for PlainEngine {
    fn secure_secret(&self, secret: &str) -> Result<String> {
        Ok(secret.to_string())
    }

    fn verify_secret(&self, secret: &str, verifier: &str) -> Result<()> {
        if secret.len() == verifier.len()
            && secret.as_bytes().ct_eq(verifier.as_bytes()).into()
        {
            Ok(())
        } else {
            Err(CryptoError::AuthorizationFailure)
        }
    }
}
