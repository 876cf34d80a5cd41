//! Bearer token issuance and validation.
//!
//! A raw credential is `id:secret`. The id is an opaque lookup key; the
//! secret is high-entropy, hashed with Argon2id at creation, and never
//! retrievable again. Validation parses, looks up by id, and verifies the
//! secret through the hashing library's constant-time primitive — never a
//! direct comparison of hash strings.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use uuid::Uuid;

use creel_core::adapters::DatabaseAdapter;
use creel_core::clock::Clock;
use creel_core::config::AuthConfig;
use creel_core::error::{AuthError, AuthResult};
use creel_core::secret::{hash_secret, verify_secret};
use creel_core::types::{ApiToken, AuthContext, CreateToken};

pub struct TokenAuthenticator {
    config: Arc<AuthConfig>,
    database: Arc<dyn DatabaseAdapter>,
    clock: Arc<dyn Clock>,
}

impl TokenAuthenticator {
    pub fn new(
        config: Arc<AuthConfig>,
        database: Arc<dyn DatabaseAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            database,
            clock,
        }
    }

    /// Create a token for a `(user, organization)` pair.
    ///
    /// Returns the stored view together with the raw `id:secret` credential,
    /// which is shown exactly once. The count-and-insert happens inside one
    /// adapter operation, so concurrent creations cannot exceed the quota.
    pub async fn create_token(
        &self,
        user_id: &str,
        organization_id: &str,
        name: &str,
    ) -> AuthResult<(ApiToken, String)> {
        let id = Uuid::new_v4().simple().to_string();
        let secret = generate_secret(self.config.token.secret_length);
        let secret_hash = hash_secret(&secret)?;

        let limit = self.config.token.max_active_tokens;
        let token = self
            .database
            .create_token_within_limit(
                CreateToken {
                    id: id.clone(),
                    user_id: user_id.to_string(),
                    organization_id: organization_id.to_string(),
                    secret_hash,
                    name: name.to_string(),
                },
                limit,
                self.clock.now(),
            )
            .await?
            .ok_or(AuthError::TokenLimitReached { limit })?;

        Ok((token, format!("{}:{}", id, secret)))
    }

    /// Validate a raw `id:secret` credential.
    ///
    /// On success returns the authenticated context and schedules a
    /// best-effort `last_used_at` update off the success path.
    pub async fn validate_token(&self, raw: &str) -> AuthResult<AuthContext> {
        let (id, secret) = raw.split_once(':').ok_or(AuthError::InvalidTokenFormat)?;
        if id.is_empty() || secret.is_empty() {
            return Err(AuthError::InvalidTokenFormat);
        }

        let token = self
            .database
            .get_token_by_id(id)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if !verify_secret(secret, &token.secret_hash)? {
            return Err(AuthError::TokenSecretMismatch);
        }

        let database = self.database.clone();
        let token_id = token.id.clone();
        let now = self.clock.now();
        tokio::spawn(async move {
            if let Err(err) = database.touch_token(&token_id, now).await {
                tracing::debug!("failed to record token use: {}", err);
            }
        });

        Ok(AuthContext {
            user_id: token.user_id,
            organization_id: token.organization_id,
            session_id: None,
        })
    }

    /// List a user's tokens for an organization. Secret hashes are never
    /// serialized out of the entity type.
    pub async fn list_tokens(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> AuthResult<Vec<ApiToken>> {
        self.database.list_tokens(user_id, organization_id).await
    }

    /// Delete a token. Deleting an absent id is success.
    pub async fn revoke_token(&self, id: &str) -> AuthResult<()> {
        self.database.delete_token(id).await
    }
}

fn generate_secret(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
