//! Entity types shared across the subsystem.
//!
//! These are the concrete rows the [`DatabaseAdapter`](crate::adapters::DatabaseAdapter)
//! persists, plus the `Create*` payloads it consumes and the
//! [`AuthContext`] every authenticator ultimately produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a user inside one organization.
///
/// The derived ordering is the permission order: `Member < Admin < Owner`.
/// All management checks reduce to comparisons on this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Member,
    Admin,
    Owner,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    /// Whether a holder of this role may manage (remove, re-role) a holder
    /// of `target`. Owners may act on anyone, admins only on plain members,
    /// members on no one. Acting on oneself is never routed through here;
    /// self-removal has its own leave operation.
    pub fn can_manage(&self, target: MemberRole) -> bool {
        match self {
            Self::Owner => true,
            Self::Admin => target == Self::Member,
            Self::Member => false,
        }
    }

    /// Owners and admins administer an organization.
    pub fn is_admin(&self) -> bool {
        *self >= Self::Admin
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A user's role-tagged membership in one organization.
///
/// Unique per `(user_id, organization_id)`. Exactly one membership per user
/// has `is_personal_org = true`; it is created atomically with the user's
/// personal organization at signup and can never be left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: String,
    pub user_id: String,
    pub organization_id: String,
    pub role: MemberRole,
    pub is_personal_org: bool,
    pub joined_at: DateTime<Utc>,
}

/// A long-lived bearer credential. Only the argon2 hash of the secret is
/// stored; the raw `id:secret` string is shown to the caller exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: String,
    pub user_id: String,
    pub organization_id: String,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// A registered WebAuthn credential.
///
/// `counter` is the authenticator's signature counter and is monotonically
/// non-decreasing across verified assertions; a user always retains at
/// least one credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasskeyCredential {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub credential_id: String,
    pub public_key: String,
    pub counter: u64,
    pub device_type: String,
    pub backed_up: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// A browser session. `current_organization_id` always references a live
/// membership of `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    pub id: String,
    pub user_id: String,
    pub current_organization_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

/// A single-use, time-boxed grant of a role in one organization.
///
/// Once `accepted_at` is set the invitation is terminal. Rows are kept as
/// an audit trail; revocation marks them expired instead of deleting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: String,
    pub code: String,
    pub email: Option<String>,
    pub organization_id: String,
    pub invited_by_user_id: String,
    pub role: MemberRole,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Claims carried by the stateless signed admin token. Never persisted;
/// validity is a pure function of signature and age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub is_admin: bool,
    /// Unix timestamp in milliseconds.
    pub created_at: i64,
}

/// The uniform authenticated-request context produced by every credential
/// path and attached to the request for downstream handlers.
///
/// `session_id` is present only for session-authenticated requests;
/// operations that mutate the session (like switching organizations) call
/// [`AuthContext::require_session_id`] to reject token-authenticated calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: String,
    pub organization_id: String,
    pub session_id: Option<String>,
}

impl AuthContext {
    pub fn require_session_id(&self) -> crate::error::AuthResult<&str> {
        self.session_id
            .as_deref()
            .ok_or(crate::error::AuthError::RequiresSession)
    }
}

// --- Creation payloads consumed by the adapter ---

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateMembership {
    pub user_id: String,
    pub organization_id: String,
    pub role: MemberRole,
    pub is_personal_org: bool,
}

#[derive(Debug, Clone)]
pub struct CreateToken {
    pub id: String,
    pub user_id: String,
    pub organization_id: String,
    pub secret_hash: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct CreateCredential {
    pub user_id: String,
    pub name: String,
    pub credential_id: String,
    pub public_key: String,
    pub counter: u64,
    pub device_type: String,
    pub backed_up: bool,
}

#[derive(Debug, Clone)]
pub struct CreateSession {
    pub user_id: String,
    pub current_organization_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateInvitation {
    pub code: String,
    pub email: Option<String>,
    pub organization_id: String,
    pub invited_by_user_id: String,
    pub role: MemberRole,
    pub expires_at: DateTime<Utc>,
}
