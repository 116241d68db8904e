//! Password salting, hashing and verification.
//!
//! Two stages: the plaintext is reduced to a salted SHA-256 digest bound to the
//! server-side salt, then the digest is hashed with Argon2id using a random salt.
//! Only the resulting PHC string is ever persisted.

use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid password hashing parameters: {0}")]
    InvalidParams(String),
    #[error("failed to hash password")]
    Hash,
}

/// Hashing scheme settings, fixed at startup.
#[derive(Clone)]
pub struct PasswordConfig {
    salt: SecretString,
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
}

impl PasswordConfig {
    /// Argon2 recommended cost (19 MiB, 2 passes, 1 lane) with the given server salt.
    #[must_use]
    pub fn new(salt: SecretString) -> Self {
        Self {
            salt,
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }

    #[must_use]
    pub fn with_cost(mut self, memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        self.memory_kib = memory_kib;
        self.iterations = iterations;
        self.parallelism = parallelism;
        self
    }

    #[must_use]
    pub const fn memory_kib(&self) -> u32 {
        self.memory_kib
    }

    #[must_use]
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    #[must_use]
    pub const fn parallelism(&self) -> u32 {
        self.parallelism
    }
}

impl std::fmt::Debug for PasswordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordConfig")
            .field("salt", &"***")
            .field("memory_kib", &self.memory_kib)
            .field("iterations", &self.iterations)
            .field("parallelism", &self.parallelism)
            .finish()
    }
}

pub struct CredentialManager {
    salt: SecretString,
    hasher: Argon2<'static>,
}

impl CredentialManager {
    /// Build the manager, validating the Argon2 cost parameters once.
    ///
    /// # Errors
    /// Returns an error if the cost parameters are outside Argon2's accepted range.
    pub fn new(config: PasswordConfig) -> Result<Self, CredentialError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| CredentialError::InvalidParams(e.to_string()))?;

        Ok(Self {
            salt: config.salt,
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Deterministic `hex(SHA-256(plaintext || salt))`, the input to the KDF.
    #[must_use]
    pub fn salted_digest(&self, plaintext: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(plaintext.as_bytes());
        hasher.update(self.salt.expose_secret().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Produce a storable PHC hash for `plaintext`. Every call uses a fresh random salt.
    ///
    /// # Errors
    /// Returns an error if Argon2 fails to derive the key.
    pub fn set_password(&self, plaintext: &str) -> Result<String, CredentialError> {
        let digest = self.salted_digest(plaintext);
        let salt = SaltString::generate(&mut OsRng);

        self.hasher
            .hash_password(digest.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| CredentialError::Hash)
    }

    /// Check `plaintext` against a stored PHC hash. A malformed hash is a mismatch.
    #[must_use]
    pub fn verify_password(&self, plaintext: &str, stored_hash: &str) -> bool {
        let parsed = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Stored password hash is malformed: {}", e);
                return false;
            }
        };

        let digest = self.salted_digest(plaintext);

        self.hasher
            .verify_password(digest.as_bytes(), &parsed)
            .is_ok()
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("salt", &"***")
            .finish_non_exhaustive()
    }
}
