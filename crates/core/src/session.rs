use std::sync::Arc;

use crate::adapters::DatabaseAdapter;
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::types::{CreateSession, MemberRole, UserSession};

/// Session manager handles browser session creation, validation,
/// sliding-window refresh, organization switching, and cleanup.
pub struct SessionManager {
    config: Arc<AuthConfig>,
    database: Arc<dyn DatabaseAdapter>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
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

    /// Create a new session for a user.
    ///
    /// With an explicit `organization_id` the user must be a member of that
    /// organization. Without one, the user's personal organization is
    /// selected when present, else the earliest membership. A user with no
    /// memberships cannot hold a session.
    pub async fn create_session(
        &self,
        user_id: &str,
        organization_id: Option<&str>,
    ) -> AuthResult<UserSession> {
        let memberships = self.database.list_user_memberships(user_id).await?;
        if memberships.is_empty() {
            return Err(AuthError::NoMemberships);
        }

        let selected = match organization_id {
            Some(org_id) => memberships
                .iter()
                .find(|m| m.organization_id == org_id)
                .ok_or(AuthError::NotAMember)?,
            None => memberships
                .iter()
                .find(|m| m.is_personal_org && m.role == MemberRole::Owner)
                .unwrap_or(&memberships[0]),
        };

        let now = self.clock.now();
        let session = self
            .database
            .create_session(
                CreateSession {
                    user_id: user_id.to_string(),
                    current_organization_id: selected.organization_id.clone(),
                    expires_at: now + self.config.session.expires_in,
                },
                now,
            )
            .await?;
        Ok(session)
    }

    /// Get a live session by id.
    ///
    /// Absence and expiry are both nullable outcomes, not errors; an
    /// expired row is deleted lazily on detection.
    pub async fn validate_session(&self, id: &str) -> AuthResult<Option<UserSession>> {
        let session = match self.database.get_session(id).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.expires_at <= self.clock.now() {
            self.database.delete_session(id).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Sliding-window renewal.
    ///
    /// Rewrites `last_active_at` and returns `true` only once the refresh
    /// threshold has elapsed since the previous write; otherwise no write
    /// occurs and `false` is returned. This amortizes writes under
    /// frequent polling. A missing or expired session also returns
    /// `false` — nothing was written.
    pub async fn refresh_session(&self, id: &str) -> AuthResult<bool> {
        let session = match self.validate_session(id).await? {
            Some(session) => session,
            None => return Ok(false),
        };

        let now = self.clock.now();
        if now - session.last_active_at < self.config.session.refresh_threshold {
            return Ok(false);
        }

        self.database.update_session_last_active(id, now).await?;
        Ok(true)
    }

    /// Point the session at another of the user's organizations.
    pub async fn switch_organization(
        &self,
        session_id: &str,
        organization_id: &str,
    ) -> AuthResult<UserSession> {
        let session = self
            .validate_session(session_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        self.database
            .get_membership(organization_id, &session.user_id)
            .await?
            .ok_or(AuthError::NotAMember)?;

        self.database
            .update_session_organization(session_id, organization_id)
            .await
    }

    /// List the user's live sessions, newest first.
    pub async fn list_user_sessions(&self, user_id: &str) -> AuthResult<Vec<UserSession>> {
        let sessions = self.database.list_user_sessions(user_id).await?;
        let now = self.clock.now();
        Ok(sessions
            .into_iter()
            .filter(|s| s.expires_at > now)
            .collect())
    }

    /// Delete a session. Deleting an absent session is success.
    pub async fn revoke_session(&self, id: &str) -> AuthResult<()> {
        self.database.delete_session(id).await
    }

    /// Delete all of a user's sessions. Idempotent.
    pub async fn revoke_all_user_sessions(&self, user_id: &str) -> AuthResult<()> {
        self.database.delete_user_sessions(user_id).await
    }

    /// Batch-delete rows past their expiry; returns the count deleted.
    /// Intended to run on a periodic external trigger, not per request.
    pub async fn cleanup_expired_sessions(&self) -> AuthResult<usize> {
        let count = self
            .database
            .delete_expired_sessions(self.clock.now())
            .await?;
        if count > 0 {
            self.config
                .logger
                .info(&format!("purged {} expired sessions", count));
        }
        Ok(count)
    }
}
