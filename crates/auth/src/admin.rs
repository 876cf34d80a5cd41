//! Stateless signed-cookie admin authentication.
//!
//! A single shared password guards the admin surface. Login compares a
//! fixed-size SHA-256 digest of the supplied password against the digest of
//! the configured one in constant time — digesting first, so comparison
//! cost never varies with input length. Success issues a sealed
//! `{isAdmin, createdAt}` token; verification is a pure function of
//! signature and age. There is no revocation list: logout only clears the
//! client cookie, and a copied pre-expiry token stays valid until its TTL
//! elapses.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use creel_core::clock::Clock;
use creel_core::config::AuthConfig;
use creel_core::error::{AuthError, AuthResult};
use creel_core::signer::TokenSigner;
use creel_core::types::AdminSession;

pub struct AdminAuthenticator {
    config: Arc<AuthConfig>,
    signer: TokenSigner,
    clock: Arc<dyn Clock>,
}

impl AdminAuthenticator {
    pub fn new(config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        if config.admin.password.is_empty() {
            return Err(AuthError::config("admin password is not configured"));
        }
        let signer = TokenSigner::new(&config.secret)?;
        Ok(Self {
            config,
            signer,
            clock,
        })
    }

    /// Check the shared password and issue a signed admin token.
    pub fn login(&self, password: &str) -> AuthResult<String> {
        let supplied = Sha256::digest(password.as_bytes());
        let expected = Sha256::digest(self.config.admin.password.as_bytes());

        if supplied.as_slice().ct_eq(expected.as_slice()).unwrap_u8() == 0 {
            self.config.logger.warn("admin login failed: bad password");
            return Err(AuthError::InvalidCredentials);
        }

        self.signer.seal(&AdminSession {
            is_admin: true,
            created_at: self.clock.now().timestamp_millis(),
        })
    }

    /// Verify a signed admin token.
    ///
    /// Returns `None` for any malformed split, bad signature, bad decode,
    /// missing or invalid fields, or a token older than the configured TTL.
    /// No server-side state is consulted.
    pub fn verify_session(&self, token: &str) -> Option<AdminSession> {
        let session: AdminSession = self.signer.open(token)?;
        if !session.is_admin {
            return None;
        }

        let age_ms = self.clock.now().timestamp_millis() - session.created_at;
        if age_ms < 0 || age_ms > self.config.admin.token_ttl.num_milliseconds() {
            return None;
        }

        Some(session)
    }
}
