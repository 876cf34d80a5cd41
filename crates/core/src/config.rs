use std::sync::Arc;

use chrono::Duration;

use crate::error::{AuthError, AuthResult};
use crate::logger::{Logger, TracingLogger};

/// Minimum length of the signing secret in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Main configuration for the auth subsystem.
#[derive(Clone)]
pub struct AuthConfig {
    /// Secret key for signing admin tokens and passkey challenges.
    /// Must be at least [`MIN_SECRET_LENGTH`] bytes.
    pub secret: String,

    /// Application name, used for cookie names and passkey RP metadata.
    pub app_name: String,

    /// Logger implementation for auth-related logging.
    ///
    /// Defaults to a [`TracingLogger`] that delegates to the `tracing`
    /// crate.
    pub logger: Arc<dyn Logger>,

    /// Browser session configuration.
    pub session: SessionConfig,

    /// Bearer token configuration.
    pub token: TokenConfig,

    /// Admin cookie configuration.
    pub admin: AdminConfig,

    /// Passkey / WebAuthn configuration.
    pub passkey: PasskeyConfig,

    /// Invitation configuration.
    pub invitation: InvitationConfig,
}

/// Browser session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session lifetime from creation.
    pub expires_in: Duration,

    /// Sliding-window refresh threshold: `last_active_at` is only
    /// rewritten once this much time has passed since the previous write,
    /// bounding write frequency under frequent polling.
    pub refresh_threshold: Duration,

    /// Cookie name for the session id.
    pub cookie_name: String,

    /// Cookie settings.
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    pub cookie_same_site: SameSite,
}

/// Bearer token configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Maximum active tokens per `(user, organization)` pair.
    pub max_active_tokens: usize,

    /// Random bytes in a freshly generated token secret.
    pub secret_length: usize,
}

/// Admin cookie configuration.
#[derive(Clone)]
pub struct AdminConfig {
    /// The single shared admin password.
    pub password: String,

    /// Lifetime of an issued admin token. There is no revocation list; a
    /// copied token stays valid until this elapses.
    pub token_ttl: Duration,

    /// Cookie name for the admin token.
    pub cookie_name: String,
}

/// Passkey / WebAuthn configuration.
#[derive(Debug, Clone)]
pub struct PasskeyConfig {
    /// Relying-party id, usually the bare domain.
    pub rp_id: String,

    /// Human-readable relying-party name.
    pub rp_name: String,

    /// Expected origin of client responses.
    pub origin: String,

    /// Lifetime of a signed ceremony challenge. Minutes, not hours.
    pub challenge_ttl: Duration,
}

/// Invitation configuration.
#[derive(Debug, Clone)]
pub struct InvitationConfig {
    /// Default invitation lifetime in days.
    pub expires_in_days: i64,

    /// Length of generated invitation codes.
    pub code_length: usize,
}

#[derive(Debug, Clone)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl std::fmt::Display for SameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => f.write_str("Strict"),
            Self::Lax => f.write_str("Lax"),
            Self::None => f.write_str("None"),
        }
    }
}

impl AuthConfig {
    /// Create a configuration with the given signing secret and defaults
    /// for everything else.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    /// Validate invariants that cannot be expressed in the type system.
    pub fn validate(&self) -> AuthResult<()> {
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::config(format!(
                "signing secret must be at least {} bytes, got {}",
                MIN_SECRET_LENGTH,
                self.secret.len()
            )));
        }
        if self.token.max_active_tokens == 0 {
            return Err(AuthError::config("max_active_tokens must be at least 1"));
        }
        if self.session.refresh_threshold > self.session.expires_in {
            return Err(AuthError::config(
                "session refresh threshold exceeds the session lifetime",
            ));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            app_name: "Creel".to_string(),
            logger: Arc::new(TracingLogger),
            session: SessionConfig::default(),
            token: TokenConfig::default(),
            admin: AdminConfig::default(),
            passkey: PasskeyConfig::default(),
            invitation: InvitationConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expires_in: Duration::days(7),
            refresh_threshold: Duration::days(1),
            cookie_name: "creel.session".to_string(),
            cookie_secure: true,
            cookie_http_only: true,
            cookie_same_site: SameSite::Lax,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            max_active_tokens: 2,
            secret_length: 32,
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            password: String::new(),
            token_ttl: Duration::hours(24),
            cookie_name: "creel.admin".to_string(),
        }
    }
}

impl Default for PasskeyConfig {
    fn default() -> Self {
        Self {
            rp_id: "localhost".to_string(),
            rp_name: "Creel".to_string(),
            origin: "http://localhost:3000".to_string(),
            challenge_ttl: Duration::minutes(5),
        }
    }
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            expires_in_days: 7,
            code_length: 10,
        }
    }
}
