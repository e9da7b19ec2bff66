//! One-way hashing for hashed fields
//!
//! Uses Argon2id (OWASP recommended). Values stored in hashed fields are PHC
//! strings and are only ever compared through [`FieldHasher::verify`].

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Argon2id hasher for hashed field values
///
/// The cost parameters are configurable so deployments can trade latency for
/// resistance; verification reads the parameters from the stored hash, so
/// changing them never invalidates existing records.
#[derive(Clone)]
pub struct FieldHasher {
    argon2: Argon2<'static>,
}

impl Default for FieldHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FieldHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldHasher").finish_non_exhaustive()
    }
}

impl FieldHasher {
    /// Hasher with default Argon2id parameters
    ///
    /// Default parameters (OWASP recommended for 2024):
    /// - Memory: 19 MiB (19456 KiB)
    /// - Iterations: 2
    /// - Parallelism: 1
    pub fn new() -> Self {
        Self { argon2: Argon2::default() }
    }

    /// Hasher with explicit cost parameters
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| HashError::InvalidParams(e.to_string()))?;
        Ok(Self { argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) })
    }

    /// Hash a plaintext value into PHC string format
    ///
    /// Example: `$argon2id$v=19$m=19456,t=2,p=1$salt$hash`
    pub fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| HashError::HashingFailed(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Check a plaintext value against a stored hash
    ///
    /// A stored value that is not a PHC string never verifies: comparing a
    /// plaintext against the hash string itself is always a mismatch.
    pub fn verify(&self, plaintext: &str, stored: &str) -> bool {
        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::debug!("Stored value is not a valid hash: {}", e);
                return false;
            }
        };

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(e) => {
                log::warn!("Hash verification failed: {}", e);
                false
            }
        }
    }
}

/// Hashing errors
#[derive(thiserror::Error, Debug, Clone)]
pub enum HashError {
    #[error("Field hashing failed: {0}")]
    HashingFailed(String),

    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> FieldHasher {
        FieldHasher::with_params(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("secret").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("secret", &hash));
        assert!(!hasher.verify("wrong", &hash));
    }

    #[test]
    fn test_same_value_different_hashes() {
        let hasher = hasher();
        let hash1 = hasher.hash("secret").unwrap();
        let hash2 = hasher.hash("secret").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify("secret", &hash1));
        assert!(hasher.verify("secret", &hash2));
    }

    #[test]
    fn test_hash_string_is_not_its_own_preimage() {
        let hasher = hasher();
        let hash = hasher.hash("secret").unwrap();
        assert!(!hasher.verify(&hash, &hash));
    }

    #[test]
    fn test_plain_stored_value_never_verifies() {
        let hasher = hasher();
        assert!(!hasher.verify("secret", "secret"));
        assert!(!hasher.verify("", ""));
    }

    #[test]
    fn test_params_from_other_hasher_still_verify() {
        let hash = hasher().hash("secret").unwrap();
        let other = FieldHasher::with_params(2048, 2, 1).unwrap();
        assert!(other.verify("secret", &hash));
    }

    #[test]
    fn test_invalid_params() {
        assert!(FieldHasher::with_params(1, 0, 0).is_err());
    }
}
