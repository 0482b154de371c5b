//! # warden-crypto
//!
//! One-way secret hashing and verification for the warden directory.
//!
//! The directory never stores plaintext secrets: it stores a verifier
//! produced by [`SecretStore::secure_secret`] and later checks candidate
//! secrets with [`SecretStore::verify_secret`]. Two engines implement the
//! port:
//!
//! - [`KdfEngine`]: Argon2id PHC-string hashes. The default.
//! - [`PlainEngine`]: verifier == plaintext, compared in constant time.
//!   Selected as the default only under the `nocrypto` feature, for tests.
//!
//! `secure_secret` is nondeterministic (fresh salt per call), so two
//! verifiers for the same secret never compare equal.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
mod kdf;
mod plain;

pub use error::{CryptoError, Result};
pub use kdf::KdfEngine;
pub use plain::PlainEngine;

/// The crypto port: one-way secret hashing and verification.
///
/// Implementations must be one-way, must salt (two calls on the same input
/// produce different verifiers), and must reject mismatches in constant
/// time. [`CryptoError::AuthorizationFailure`] is the only externally
/// observable failure for a wrong secret.
pub trait SecretStore: Send + Sync {
    /// Produce a storable verifier for a plaintext secret.
    fn secure_secret(&self, secret: &str) -> Result<String>;

    /// Check a plaintext secret against a stored verifier.
    fn verify_secret(&self, secret: &str, verifier: &str) -> Result<()>;
}

/// The engine selected by the build configuration.
#[cfg(not(feature = "nocrypto"))]
pub fn default_engine() -> Box<dyn SecretStore> {
    Box::new(KdfEngine::default())
}

/// The engine selected by the build configuration.
#[cfg(feature = "nocrypto")]
pub fn default_engine() -> Box<dyn SecretStore> {
    Box::new(PlainEngine)
}
