//! Secret hashing and verification, plus opaque token generation.
//!
//! Uses Argon2id with a cost fixed by configuration. Salts and tokens come
//! straight from the OS entropy source so an entropy failure surfaces as
//! [`OAuth2Error::Hashing`] instead of a panic.

use crate::config::PasswordHashConfig;
use crate::error::{OAuth2Error, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::Engine;
use std::sync::Arc;

/// One-way hasher for client secrets and user passwords.
#[derive(Clone)]
pub struct SecretHasher {
    params: Params,
    /// Digest of a random secret, verified against when an identity is
    /// unknown so both failure paths cost one Argon2 run.
    dummy_hash: Arc<str>,
}

impl SecretHasher {
    pub fn new(config: &PasswordHashConfig) -> Result<Self> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| OAuth2Error::Hashing(e.to_string()))?;

        let mut hasher = Self {
            params,
            dummy_hash: Arc::from(""),
        };
        let dummy = hasher.hash(&generate_token()?)?;
        hasher.dummy_hash = Arc::from(dummy);
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a secret, returning the PHC-formatted string suitable for storage.
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let mut salt = [0u8; 16];
        getrandom::fill(&mut salt).map_err(|e| OAuth2Error::Hashing(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt).map_err(|e| OAuth2Error::Hashing(e.to_string()))?;
        let hash = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| OAuth2Error::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Verify a secret against a stored digest.
    ///
    /// A malformed digest never verifies.
    pub fn verify(&self, hashed: &str, plaintext: &str) -> Result<()> {
        let Ok(parsed) = PasswordHash::new(hashed) else {
            tracing::warn!("Stored secret digest is not a valid PHC string");
            return Err(OAuth2Error::InvalidCredential);
        };
        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .map_err(|_| OAuth2Error::InvalidCredential)
    }

    /// Spend the cost of one verification without a stored digest.
    pub fn verify_dummy(&self, plaintext: &str) {
        let _ = self.verify(&self.dummy_hash, plaintext);
    }
}

/// Generate an opaque random token (256 bits, URL-safe base64, no padding).
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|e| OAuth2Error::Hashing(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
