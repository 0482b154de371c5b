//! Argon2id secret hashing engine.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use tracing::debug;

use crate::error::{CryptoError, Result};
use crate::SecretStore;

// Argon2id parameters (hardened for secret storage)
// Memory: 64 MiB, Iterations: 3, Parallelism: 4
const ARGON2_M_COST: u32 = 64 * 1024;
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;

/// Secret engine backed by Argon2id.
///
/// Verifiers are PHC strings carrying algorithm, parameters, and salt, so
/// parameter changes only affect newly secured secrets. A fresh random salt
/// is drawn per call, which makes `secure_secret` nondeterministic.
pub struct KdfEngine {
    argon2: Argon2<'static>,
}

impl KdfEngine {
    /// Create an engine with the hardened default parameters.
    pub fn new() -> Self {
        let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, None)
            .expect("static Argon2 parameters are valid");
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl Default for KdfEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KdfEngine {
    fn secure_secret(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| CryptoError::Internal(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify_secret(&self, secret: &str, verifier: &str) -> Result<()> {
        let parsed = PasswordHash::new(verifier).map_err(|e| {
            debug!(error = %e, "Stored verifier failed to parse");
            CryptoError::Internal(e.to_string())
        })?;
        self.argon2
            .verify_password(secret.as_bytes(), &parsed)
            .map_err(|_| CryptoError::AuthorizationFailure)
    }
}
