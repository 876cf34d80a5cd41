//! Single-use, time-boxed, org-scoped invitations.
//!
//! An invitation is a short globally-unique code granting a role in one
//! organization, optionally restricted to an exact email address. Accepting
//! is terminal; rows are never deleted (they are the audit trail), and
//! revocation marks the code expired instead.
//!
//! Accepting does not create the membership — that is a separate
//! `MembershipService::add_member` call the caller sequences. A crash
//! between the two leaves an accepted-but-unjoined invitation; callers
//! needing atomicity must wrap both writes in a store-level transaction.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;

use creel_core::adapters::DatabaseAdapter;
use creel_core::clock::Clock;
use creel_core::config::AuthConfig;
use creel_core::error::{AuthError, AuthResult, DatabaseError};
use creel_core::types::{CreateInvitation, Invitation, MemberRole};

pub struct InvitationService {
    config: Arc<AuthConfig>,
    database: Arc<dyn DatabaseAdapter>,
    clock: Arc<dyn Clock>,
}

impl InvitationService {
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

    /// Create an invitation. The caller is responsible for checking that
    /// `invited_by_user_id` holds an owner/admin role in the organization.
    pub async fn create_invitation(
        &self,
        organization_id: &str,
        invited_by_user_id: &str,
        role: MemberRole,
        email: Option<&str>,
        expires_in_days: Option<i64>,
    ) -> AuthResult<Invitation> {
        let days = expires_in_days.unwrap_or(self.config.invitation.expires_in_days);
        let expires_at = self.clock.now() + chrono::Duration::days(days);

        // Codes are short, so collisions are unlikely but possible; the
        // store's uniqueness constraint is the backstop and we retry a
        // few times before giving up.
        for _ in 0..3 {
            let code = generate_code(self.config.invitation.code_length);
            let result = self
                .database
                .create_invitation(
                    CreateInvitation {
                        code,
                        email: email.map(String::from),
                        organization_id: organization_id.to_string(),
                        invited_by_user_id: invited_by_user_id.to_string(),
                        role,
                        expires_at,
                    },
                    self.clock.now(),
                )
                .await;

            match result {
                Err(AuthError::Database(DatabaseError::Constraint(_))) => continue,
                other => return other,
            }
        }

        Err(AuthError::conflict("Could not allocate a unique invitation code"))
    }

    /// Validate a code against its lifecycle and optional email
    /// restriction. Does not mutate anything.
    pub async fn validate_invitation(
        &self,
        code: &str,
        email: Option<&str>,
    ) -> AuthResult<Invitation> {
        let invitation = self
            .database
            .get_invitation_by_code(code)
            .await?
            .ok_or(AuthError::InvitationNotFound)?;

        if invitation.accepted_at.is_some() {
            return Err(AuthError::InvitationAlreadyAccepted);
        }
        if self.clock.now() > invitation.expires_at {
            return Err(AuthError::InvitationExpired);
        }
        if let Some(restricted_to) = &invitation.email {
            // Exact match only; a missing email counts as a mismatch.
            if email != Some(restricted_to.as_str()) {
                return Err(AuthError::InvitationEmailMismatch);
            }
        }

        Ok(invitation)
    }

    /// Accept a code on behalf of a user. Re-runs validation against the
    /// user's stored email, then marks the invitation accepted. Membership
    /// creation is the caller's next step.
    pub async fn accept_invitation(&self, code: &str, user_id: &str) -> AuthResult<Invitation> {
        let user = self
            .database
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let invitation = self
            .validate_invitation(code, Some(&user.email))
            .await?;

        self.database
            .mark_invitation_accepted(&invitation.id, user_id, self.clock.now())
            .await
    }

    /// Mark an invitation expired. The row is kept as an audit record.
    pub async fn revoke_invitation(&self, id: &str) -> AuthResult<Invitation> {
        self.database.expire_invitation(id, self.clock.now()).await
    }

    /// Unaccepted, unexpired invitations for an organization, newest first.
    pub async fn list_pending_invitations(
        &self,
        organization_id: &str,
    ) -> AuthResult<Vec<Invitation>> {
        self.database
            .list_pending_invitations(organization_id, self.clock.now())
            .await
    }
}

fn generate_code(length: usize) -> String {
    rand::rngs::OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use creel_core::adapters::MemoryDatabaseAdapter;
    use creel_core::clock::ManualClock;
    use creel_core::types::CreateUser;

    struct Fixture {
        invitations: InvitationService,
        database: Arc<MemoryDatabaseAdapter>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let config = Arc::new(AuthConfig::new("0123456789012345678901234567890X"));
        let database = Arc::new(MemoryDatabaseAdapter::new());
        let clock = Arc::new(ManualClock::starting_now());
        let invitations = InvitationService::new(config, database.clone(), clock.clone());
        Fixture {
            invitations,
            database,
            clock,
        }
    }

    async fn seed_user(fx: &Fixture, email: &str) -> String {
        let (user, _, _) = fx
            .database
            .create_user_with_personal_org(
                CreateUser {
                    email: email.into(),
                    name: None,
                },
                format!("{}'s workspace", email),
                fx.clock.now(),
            )
            .await
            .unwrap();
        user.id
    }

    #[tokio::test]
    async fn create_issues_a_short_unique_code() {
        let fx = fixture();
        let a = fx
            .invitations
            .create_invitation("o1", "u1", MemberRole::Member, None, None)
            .await
            .unwrap();
        let b = fx
            .invitations
            .create_invitation("o1", "u1", MemberRole::Member, None, None)
            .await
            .unwrap();

        assert_eq!(a.code.len(), 10);
        assert_ne!(a.code, b.code);
        assert_eq!(a.expires_at - a.created_at, Duration::days(7));
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let fx = fixture();
        let err = fx
            .invitations
            .validate_invitation("nope", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvitationNotFound));
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let fx = fixture();
        let invitation = fx
            .invitations
            .create_invitation("o1", "u1", MemberRole::Member, None, Some(2))
            .await
            .unwrap();

        fx.clock.advance(Duration::days(3));
        let err = fx
            .invitations
            .validate_invitation(&invitation.code, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvitationExpired));
    }

    #[tokio::test]
    async fn email_restriction_requires_an_exact_match() {
        let fx = fixture();
        let invitation = fx
            .invitations
            .create_invitation("o1", "u1", MemberRole::Member, Some("a@x.com"), None)
            .await
            .unwrap();

        fx.invitations
            .validate_invitation(&invitation.code, Some("a@x.com"))
            .await
            .unwrap();

        for email in [Some("b@x.com"), Some("A@x.com"), None] {
            let err = fx
                .invitations
                .validate_invitation(&invitation.code, email)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvitationEmailMismatch), "{:?}", email);
        }
    }

    #[tokio::test]
    async fn accept_is_single_use() {
        let fx = fixture();
        let user_id = seed_user(&fx, "a@x.com").await;
        let invitation = fx
            .invitations
            .create_invitation("o1", "u1", MemberRole::Member, None, None)
            .await
            .unwrap();

        let accepted = fx
            .invitations
            .accept_invitation(&invitation.code, &user_id)
            .await
            .unwrap();
        assert!(accepted.accepted_at.is_some());
        assert_eq!(accepted.accepted_by_user_id.as_deref(), Some(user_id.as_str()));

        let err = fx
            .invitations
            .accept_invitation(&invitation.code, &user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvitationAlreadyAccepted));
    }

    #[tokio::test]
    async fn accept_checks_the_accepting_users_email() {
        let fx = fixture();
        let invited = seed_user(&fx, "a@x.com").await;
        let stranger = seed_user(&fx, "b@x.com").await;
        let invitation = fx
            .invitations
            .create_invitation("o1", "u1", MemberRole::Member, Some("a@x.com"), None)
            .await
            .unwrap();

        let err = fx
            .invitations
            .accept_invitation(&invitation.code, &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvitationEmailMismatch));

        fx.invitations
            .accept_invitation(&invitation.code, &invited)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn revoke_marks_expired_but_keeps_the_row() {
        let fx = fixture();
        let invitation = fx
            .invitations
            .create_invitation("o1", "u1", MemberRole::Member, None, None)
            .await
            .unwrap();

        fx.clock.advance(Duration::seconds(1));
        fx.invitations.revoke_invitation(&invitation.id).await.unwrap();

        let err = fx
            .invitations
            .validate_invitation(&invitation.code, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvitationExpired));
        assert!(fx
            .database
            .get_invitation_by_code(&invitation.code)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn pending_list_is_newest_first_and_filtered() {
        let fx = fixture();
        let user_id = seed_user(&fx, "a@x.com").await;

        let older = fx
            .invitations
            .create_invitation("o1", "u1", MemberRole::Member, None, None)
            .await
            .unwrap();
        fx.clock.advance(Duration::hours(1));
        let newer = fx
            .invitations
            .create_invitation("o1", "u1", MemberRole::Admin, None, None)
            .await
            .unwrap();
        fx.clock.advance(Duration::hours(1));
        let accepted = fx
            .invitations
            .create_invitation("o1", "u1", MemberRole::Member, None, None)
            .await
            .unwrap();
        fx.invitations
            .accept_invitation(&accepted.code, &user_id)
            .await
            .unwrap();
        // Another org's invitation stays out of this list.
        fx.invitations
            .create_invitation("o2", "u1", MemberRole::Member, None, None)
            .await
            .unwrap();

        let pending = fx.invitations.list_pending_invitations("o1").await.unwrap();
        let codes: Vec<&str> = pending.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec![newer.code.as_str(), older.code.as_str()]);
    }
}
