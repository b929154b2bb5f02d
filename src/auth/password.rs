//! Password hashing and verification
//!
//! Secrets are hashed with Argon2id using a fresh random salt per entry and
//! stored as PHC strings (`$argon2id$v=19$...`).

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

/// Hash a secret using Argon2id
///
/// # Errors
///
/// Returns an error if hashing fails (should not happen in normal operation)
///
/// # Example
///
/// ```
/// use session_authority::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("secure123").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// assert!(verify_password("secure123", &hash));
/// ```
pub fn hash_password(secret: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashError::HashFailed(e.to_string()))
}

/// Verify a secret against a stored PHC hash
///
/// Returns `false` for a mismatch and for a hash that cannot be parsed.
pub fn verify_password(secret: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Error type for password hashing operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HashError {
    /// Hashing failed
    #[error("Hash failed: {0}")]
    HashFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: hash_password produces argon2id hash
    #[test]
    fn test_hash_password_argon2id() {
        let hash = hash_password("password123").unwrap();
        assert!(
            hash.starts_with("$argon2id$"),
            "Hash should be in Argon2id format"
        );
    }

    // Test 2: same secret hashes differently (per-entry salt)
    #[test]
    fn test_hash_password_unique_salts() {
        let hash1 = hash_password("password123").unwrap();
        let hash2 = hash_password("password123").unwrap();

        assert_ne!(
            hash1, hash2,
            "Same secret should produce different hashes due to different salts"
        );
    }

    // Test 3: verify_password succeeds for matching secret
    #[test]
    fn test_verify_password_success() {
        let hash = hash_password("traffic2024").unwrap();
        assert!(verify_password("traffic2024", &hash));
    }

    // Test 4: verify_password fails for wrong secret
    #[test]
    fn test_verify_password_wrong_secret() {
        let hash = hash_password("traffic2024").unwrap();
        assert!(!verify_password("traffic2025", &hash));
        assert!(!verify_password("", &hash));
    }

    // Test 5: verify_password fails for invalid hash format
    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(!verify_password("secret", "not_a_valid_hash"));
        assert!(!verify_password("secret", ""));
    }

    // Test 6: HashError message
    #[test]
    fn test_hash_error_display() {
        assert_eq!(
            HashError::HashFailed("out of memory".to_string()).to_string(),
            "Hash failed: out of memory"
        );
    }
}
