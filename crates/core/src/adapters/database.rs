use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AuthResult;
use crate::types::{
    ApiToken, CreateCredential, CreateInvitation, CreateMembership, CreateSession, CreateToken,
    CreateUser, Invitation, Membership, Organization, PasskeyCredential, User, UserSession,
};

/// Database adapter trait for persistence.
///
/// The store is assumed to provide per-statement atomicity and uniqueness
/// constraints; the two race-sensitive writes (token quota, passkey
/// counter) are therefore single adapter operations rather than
/// read-then-write sequences in the services. Methods take explicit
/// timestamps wherever time is compared so that expiry logic stays
/// deterministic under test.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync + 'static {
    // User operations.
    //
    // Signup creates the user, their personal organization, and the owner
    // membership in one atomic operation; there is deliberately no way to
    // create a bare user.
    async fn create_user_with_personal_org(
        &self,
        user: CreateUser,
        org_name: String,
        now: DateTime<Utc>,
    ) -> AuthResult<(User, Organization, Membership)>;
    async fn get_user_by_id(&self, id: &str) -> AuthResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    // Organization operations
    async fn get_organization_by_id(&self, id: &str) -> AuthResult<Option<Organization>>;

    // Membership operations
    async fn create_membership(
        &self,
        membership: CreateMembership,
        now: DateTime<Utc>,
    ) -> AuthResult<Membership>;
    async fn get_membership(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> AuthResult<Option<Membership>>;
    async fn list_organization_memberships(
        &self,
        organization_id: &str,
    ) -> AuthResult<Vec<Membership>>;
    async fn list_user_memberships(&self, user_id: &str) -> AuthResult<Vec<Membership>>;
    async fn delete_membership(&self, membership_id: &str) -> AuthResult<()>;

    // Bearer token operations.
    //
    // `create_token_within_limit` counts and inserts atomically; it returns
    // `None` when the `(user, organization)` pair already holds `limit`
    // active tokens, so concurrent creations cannot admit limit + 1.
    async fn create_token_within_limit(
        &self,
        token: CreateToken,
        limit: usize,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<ApiToken>>;
    async fn get_token_by_id(&self, id: &str) -> AuthResult<Option<ApiToken>>;
    async fn list_tokens(&self, user_id: &str, organization_id: &str)
        -> AuthResult<Vec<ApiToken>>;
    async fn touch_token(&self, id: &str, at: DateTime<Utc>) -> AuthResult<()>;
    async fn delete_token(&self, id: &str) -> AuthResult<()>;

    // Passkey credential operations.
    //
    // `update_credential_counter` is a compare-and-set: the write happens
    // only if `counter` is strictly greater than the stored value, and the
    // return value says whether it did. Two concurrent assertions carrying
    // the same counter cannot both succeed.
    async fn create_credential(
        &self,
        credential: CreateCredential,
        now: DateTime<Utc>,
    ) -> AuthResult<PasskeyCredential>;
    async fn get_credential_by_id(&self, id: &str) -> AuthResult<Option<PasskeyCredential>>;
    async fn get_credential_by_credential_id(
        &self,
        credential_id: &str,
    ) -> AuthResult<Option<PasskeyCredential>>;
    async fn list_user_credentials(&self, user_id: &str) -> AuthResult<Vec<PasskeyCredential>>;
    async fn update_credential_counter(
        &self,
        id: &str,
        counter: u64,
        at: DateTime<Utc>,
    ) -> AuthResult<bool>;
    async fn update_credential_name(&self, id: &str, name: &str) -> AuthResult<PasskeyCredential>;
    async fn delete_credential(&self, id: &str) -> AuthResult<()>;

    // Session operations
    async fn create_session(
        &self,
        session: CreateSession,
        now: DateTime<Utc>,
    ) -> AuthResult<UserSession>;
    async fn get_session(&self, id: &str) -> AuthResult<Option<UserSession>>;
    async fn list_user_sessions(&self, user_id: &str) -> AuthResult<Vec<UserSession>>;
    async fn update_session_last_active(&self, id: &str, at: DateTime<Utc>) -> AuthResult<()>;
    async fn update_session_organization(
        &self,
        id: &str,
        organization_id: &str,
    ) -> AuthResult<UserSession>;
    async fn delete_session(&self, id: &str) -> AuthResult<()>;
    async fn delete_user_sessions(&self, user_id: &str) -> AuthResult<()>;
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<usize>;

    // Invitation operations
    async fn create_invitation(
        &self,
        invitation: CreateInvitation,
        now: DateTime<Utc>,
    ) -> AuthResult<Invitation>;
    async fn get_invitation_by_code(&self, code: &str) -> AuthResult<Option<Invitation>>;
    async fn mark_invitation_accepted(
        &self,
        id: &str,
        accepted_by_user_id: &str,
        at: DateTime<Utc>,
    ) -> AuthResult<Invitation>;
    async fn expire_invitation(&self, id: &str, at: DateTime<Utc>) -> AuthResult<Invitation>;
    async fn list_pending_invitations(
        &self,
        organization_id: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Invitation>>;
}
