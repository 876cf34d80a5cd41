use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult, DatabaseError};
use crate::types::{
    ApiToken, CreateCredential, CreateInvitation, CreateMembership, CreateSession, CreateToken,
    CreateUser, Invitation, Membership, Organization, PasskeyCredential, User, UserSession,
};

use super::DatabaseAdapter;

/// In-memory database adapter.
///
/// Backs every test suite and doubles as the reference implementation of
/// the [`DatabaseAdapter`] atomicity contract: each operation takes the
/// relevant collection lock once, so count-and-insert and compare-and-set
/// writes are indivisible exactly as a SQL statement would be.
#[derive(Clone, Default)]
pub struct MemoryDatabaseAdapter {
    users: Arc<Mutex<HashMap<String, User>>>,
    email_index: Arc<Mutex<HashMap<String, String>>>,
    organizations: Arc<Mutex<HashMap<String, Organization>>>,
    memberships: Arc<Mutex<HashMap<String, Membership>>>,
    tokens: Arc<Mutex<HashMap<String, ApiToken>>>,
    credentials: Arc<Mutex<HashMap<String, PasskeyCredential>>>,
    sessions: Arc<Mutex<HashMap<String, UserSession>>>,
    invitations: Arc<Mutex<HashMap<String, Invitation>>>,
}

impl MemoryDatabaseAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

fn membership_key(organization_id: &str, user_id: &str) -> String {
    format!("{}:{}", organization_id, user_id)
}

#[async_trait]
impl DatabaseAdapter for MemoryDatabaseAdapter {
    async fn create_user_with_personal_org(
        &self,
        create: CreateUser,
        org_name: String,
        now: DateTime<Utc>,
    ) -> AuthResult<(User, Organization, Membership)> {
        let mut email_index = self.email_index.lock().expect("email index poisoned");
        if email_index.contains_key(&create.email) {
            return Err(DatabaseError::Constraint(format!(
                "users.email duplicate: {}",
                create.email
            ))
            .into());
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: create.email.clone(),
            name: create.name,
            created_at: now,
        };
        let org = Organization {
            id: Uuid::new_v4().to_string(),
            name: org_name,
            created_at: now,
        };
        let membership = Membership {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            organization_id: org.id.clone(),
            role: crate::types::MemberRole::Owner,
            is_personal_org: true,
            joined_at: now,
        };

        email_index.insert(create.email, user.id.clone());
        self.users
            .lock()
            .expect("users poisoned")
            .insert(user.id.clone(), user.clone());
        self.organizations
            .lock()
            .expect("organizations poisoned")
            .insert(org.id.clone(), org.clone());
        self.memberships
            .lock()
            .expect("memberships poisoned")
            .insert(membership.id.clone(), membership.clone());

        Ok((user, org, membership))
    }

    async fn get_user_by_id(&self, id: &str) -> AuthResult<Option<User>> {
        Ok(self.users.lock().expect("users poisoned").get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let id = self
            .email_index
            .lock()
            .expect("email index poisoned")
            .get(email)
            .cloned();
        match id {
            Some(id) => self.get_user_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn get_organization_by_id(&self, id: &str) -> AuthResult<Option<Organization>> {
        Ok(self
            .organizations
            .lock()
            .expect("organizations poisoned")
            .get(id)
            .cloned())
    }

    async fn create_membership(
        &self,
        create: CreateMembership,
        now: DateTime<Utc>,
    ) -> AuthResult<Membership> {
        let mut memberships = self.memberships.lock().expect("memberships poisoned");
        let key = membership_key(&create.organization_id, &create.user_id);
        if memberships
            .values()
            .any(|m| membership_key(&m.organization_id, &m.user_id) == key)
        {
            return Err(
                DatabaseError::Constraint(format!("member duplicate: {}", key)).into(),
            );
        }

        let membership = Membership {
            id: Uuid::new_v4().to_string(),
            user_id: create.user_id,
            organization_id: create.organization_id,
            role: create.role,
            is_personal_org: create.is_personal_org,
            joined_at: now,
        };
        memberships.insert(membership.id.clone(), membership.clone());
        Ok(membership)
    }

    async fn get_membership(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> AuthResult<Option<Membership>> {
        Ok(self
            .memberships
            .lock()
            .expect("memberships poisoned")
            .values()
            .find(|m| m.organization_id == organization_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_organization_memberships(
        &self,
        organization_id: &str,
    ) -> AuthResult<Vec<Membership>> {
        let mut members: Vec<Membership> = self
            .memberships
            .lock()
            .expect("memberships poisoned")
            .values()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }

    async fn list_user_memberships(&self, user_id: &str) -> AuthResult<Vec<Membership>> {
        let mut members: Vec<Membership> = self
            .memberships
            .lock()
            .expect("memberships poisoned")
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }

    async fn delete_membership(&self, membership_id: &str) -> AuthResult<()> {
        self.memberships
            .lock()
            .expect("memberships poisoned")
            .remove(membership_id);
        Ok(())
    }

    async fn create_token_within_limit(
        &self,
        create: CreateToken,
        limit: usize,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<ApiToken>> {
        let mut tokens = self.tokens.lock().expect("tokens poisoned");
        let active = tokens
            .values()
            .filter(|t| t.user_id == create.user_id && t.organization_id == create.organization_id)
            .count();
        if active >= limit {
            return Ok(None);
        }

        let token = ApiToken {
            id: create.id,
            user_id: create.user_id,
            organization_id: create.organization_id,
            secret_hash: create.secret_hash,
            name: create.name,
            created_at: now,
            last_used_at: None,
        };
        tokens.insert(token.id.clone(), token.clone());
        Ok(Some(token))
    }

    async fn get_token_by_id(&self, id: &str) -> AuthResult<Option<ApiToken>> {
        Ok(self.tokens.lock().expect("tokens poisoned").get(id).cloned())
    }

    async fn list_tokens(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> AuthResult<Vec<ApiToken>> {
        let mut tokens: Vec<ApiToken> = self
            .tokens
            .lock()
            .expect("tokens poisoned")
            .values()
            .filter(|t| t.user_id == user_id && t.organization_id == organization_id)
            .cloned()
            .collect();
        tokens.sort_by_key(|t| t.created_at);
        Ok(tokens)
    }

    async fn touch_token(&self, id: &str, at: DateTime<Utc>) -> AuthResult<()> {
        if let Some(token) = self.tokens.lock().expect("tokens poisoned").get_mut(id) {
            token.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn delete_token(&self, id: &str) -> AuthResult<()> {
        self.tokens.lock().expect("tokens poisoned").remove(id);
        Ok(())
    }

    async fn create_credential(
        &self,
        create: CreateCredential,
        now: DateTime<Utc>,
    ) -> AuthResult<PasskeyCredential> {
        let mut credentials = self.credentials.lock().expect("credentials poisoned");
        if credentials
            .values()
            .any(|c| c.credential_id == create.credential_id)
        {
            return Err(DatabaseError::Constraint(format!(
                "passkeys.credential_id duplicate: {}",
                create.credential_id
            ))
            .into());
        }

        let credential = PasskeyCredential {
            id: Uuid::new_v4().to_string(),
            user_id: create.user_id,
            name: create.name,
            credential_id: create.credential_id,
            public_key: create.public_key,
            counter: create.counter,
            device_type: create.device_type,
            backed_up: create.backed_up,
            created_at: now,
            last_used_at: None,
        };
        credentials.insert(credential.id.clone(), credential.clone());
        Ok(credential)
    }

    async fn get_credential_by_id(&self, id: &str) -> AuthResult<Option<PasskeyCredential>> {
        Ok(self
            .credentials
            .lock()
            .expect("credentials poisoned")
            .get(id)
            .cloned())
    }

    async fn get_credential_by_credential_id(
        &self,
        credential_id: &str,
    ) -> AuthResult<Option<PasskeyCredential>> {
        Ok(self
            .credentials
            .lock()
            .expect("credentials poisoned")
            .values()
            .find(|c| c.credential_id == credential_id)
            .cloned())
    }

    async fn list_user_credentials(&self, user_id: &str) -> AuthResult<Vec<PasskeyCredential>> {
        let mut credentials: Vec<PasskeyCredential> = self
            .credentials
            .lock()
            .expect("credentials poisoned")
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        credentials.sort_by_key(|c| c.created_at);
        Ok(credentials)
    }

    async fn update_credential_counter(
        &self,
        id: &str,
        counter: u64,
        at: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut credentials = self.credentials.lock().expect("credentials poisoned");
        let credential = credentials
            .get_mut(id)
            .ok_or(AuthError::CredentialNotFound)?;
        if counter <= credential.counter {
            return Ok(false);
        }
        credential.counter = counter;
        credential.last_used_at = Some(at);
        Ok(true)
    }

    async fn update_credential_name(&self, id: &str, name: &str) -> AuthResult<PasskeyCredential> {
        let mut credentials = self.credentials.lock().expect("credentials poisoned");
        let credential = credentials
            .get_mut(id)
            .ok_or(AuthError::CredentialNotFound)?;
        credential.name = name.to_string();
        Ok(credential.clone())
    }

    async fn delete_credential(&self, id: &str) -> AuthResult<()> {
        self.credentials
            .lock()
            .expect("credentials poisoned")
            .remove(id);
        Ok(())
    }

    async fn create_session(
        &self,
        create: CreateSession,
        now: DateTime<Utc>,
    ) -> AuthResult<UserSession> {
        let session = UserSession {
            id: Uuid::new_v4().to_string(),
            user_id: create.user_id,
            current_organization_id: create.current_organization_id,
            created_at: now,
            expires_at: create.expires_at,
            last_active_at: now,
        };
        self.sessions
            .lock()
            .expect("sessions poisoned")
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> AuthResult<Option<UserSession>> {
        Ok(self
            .sessions
            .lock()
            .expect("sessions poisoned")
            .get(id)
            .cloned())
    }

    async fn list_user_sessions(&self, user_id: &str) -> AuthResult<Vec<UserSession>> {
        let mut sessions: Vec<UserSession> = self
            .sessions
            .lock()
            .expect("sessions poisoned")
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn update_session_last_active(&self, id: &str, at: DateTime<Utc>) -> AuthResult<()> {
        let mut sessions = self.sessions.lock().expect("sessions poisoned");
        let session = sessions.get_mut(id).ok_or(AuthError::SessionNotFound)?;
        session.last_active_at = at;
        Ok(())
    }

    async fn update_session_organization(
        &self,
        id: &str,
        organization_id: &str,
    ) -> AuthResult<UserSession> {
        let mut sessions = self.sessions.lock().expect("sessions poisoned");
        let session = sessions.get_mut(id).ok_or(AuthError::SessionNotFound)?;
        session.current_organization_id = organization_id.to_string();
        Ok(session.clone())
    }

    async fn delete_session(&self, id: &str) -> AuthResult<()> {
        self.sessions.lock().expect("sessions poisoned").remove(id);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: &str) -> AuthResult<()> {
        self.sessions
            .lock()
            .expect("sessions poisoned")
            .retain(|_, s| s.user_id != user_id);
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<usize> {
        let mut sessions = self.sessions.lock().expect("sessions poisoned");
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at >= now);
        Ok(before - sessions.len())
    }

    async fn create_invitation(
        &self,
        create: CreateInvitation,
        now: DateTime<Utc>,
    ) -> AuthResult<Invitation> {
        let mut invitations = self.invitations.lock().expect("invitations poisoned");
        if invitations.values().any(|i| i.code == create.code) {
            return Err(DatabaseError::Constraint(format!(
                "invitations.code duplicate: {}",
                create.code
            ))
            .into());
        }

        let invitation = Invitation {
            id: Uuid::new_v4().to_string(),
            code: create.code,
            email: create.email,
            organization_id: create.organization_id,
            invited_by_user_id: create.invited_by_user_id,
            role: create.role,
            expires_at: create.expires_at,
            accepted_at: None,
            accepted_by_user_id: None,
            created_at: now,
        };
        invitations.insert(invitation.id.clone(), invitation.clone());
        Ok(invitation)
    }

    async fn get_invitation_by_code(&self, code: &str) -> AuthResult<Option<Invitation>> {
        Ok(self
            .invitations
            .lock()
            .expect("invitations poisoned")
            .values()
            .find(|i| i.code == code)
            .cloned())
    }

    async fn mark_invitation_accepted(
        &self,
        id: &str,
        accepted_by_user_id: &str,
        at: DateTime<Utc>,
    ) -> AuthResult<Invitation> {
        let mut invitations = self.invitations.lock().expect("invitations poisoned");
        let invitation = invitations.get_mut(id).ok_or(AuthError::InvitationNotFound)?;
        if invitation.accepted_at.is_some() {
            return Err(AuthError::InvitationAlreadyAccepted);
        }
        invitation.accepted_at = Some(at);
        invitation.accepted_by_user_id = Some(accepted_by_user_id.to_string());
        Ok(invitation.clone())
    }

    async fn expire_invitation(&self, id: &str, at: DateTime<Utc>) -> AuthResult<Invitation> {
        let mut invitations = self.invitations.lock().expect("invitations poisoned");
        let invitation = invitations.get_mut(id).ok_or(AuthError::InvitationNotFound)?;
        invitation.expires_at = at;
        Ok(invitation.clone())
    }

    async fn list_pending_invitations(
        &self,
        organization_id: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Invitation>> {
        let mut pending: Vec<Invitation> = self
            .invitations
            .lock()
            .expect("invitations poisoned")
            .values()
            .filter(|i| {
                i.organization_id == organization_id
                    && i.accepted_at.is_none()
                    && i.expires_at > now
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }
}
