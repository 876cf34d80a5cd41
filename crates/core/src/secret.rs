//! Slow adaptive hashing for bearer token secrets.
//!
//! Token secrets are hashed with Argon2id before storage; the raw secret is
//! never retrievable again. Verification goes through the library's
//! constant-time primitive rather than comparing hash strings directly.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::error::{AuthError, AuthResult};

/// Hash a raw secret with Argon2id using a random salt.
pub fn hash_secret(secret: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AuthError::SecretHash(format!("Failed to hash secret: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a raw secret against a stored Argon2 hash string.
///
/// Returns `Ok(false)` on mismatch; only an unparseable stored hash is an
/// error.
pub fn verify_secret(secret: &str, hash: &str) -> AuthResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::SecretHash(format!("Invalid secret hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_secret("a-high-entropy-secret").unwrap();
        assert!(verify_secret("a-high-entropy-secret", &hash).unwrap());
        assert!(!verify_secret("a-different-secret", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_secret("same-input").unwrap();
        let b = hash_secret("same-input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_stored_hash_is_an_error() {
        assert!(verify_secret("anything", "not-a-phc-string").is_err());
    }
}
