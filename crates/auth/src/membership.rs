//! Organizations, users, and role-tagged memberships.
//!
//! Signup creates a user together with their personal organization and an
//! owner membership in one atomic store operation. Management operations
//! enforce the role order (owner > admin > member): admins act only on
//! plain members, owners on anyone, members on no one. Self-removal never
//! goes through [`MembershipService::remove_member`]; it has its own
//! [`MembershipService::leave_organization`] so a user can always opt out
//! of an organization that another path would treat as privileged.

use std::sync::Arc;

use creel_core::adapters::DatabaseAdapter;
use creel_core::clock::Clock;
use creel_core::error::{AuthError, AuthResult, DatabaseError};
use creel_core::types::{
    CreateMembership, CreateUser, MemberRole, Membership, Organization, User,
};

pub struct MembershipService {
    database: Arc<dyn DatabaseAdapter>,
    clock: Arc<dyn Clock>,
}

impl MembershipService {
    pub fn new(database: Arc<dyn DatabaseAdapter>, clock: Arc<dyn Clock>) -> Self {
        Self { database, clock }
    }

    /// Sign up a new user: the user row, their personal organization, and
    /// the owner membership are created atomically.
    pub async fn register_user(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> AuthResult<(User, Organization, Membership)> {
        if self.database.get_user_by_email(email).await?.is_some() {
            return Err(AuthError::EmailAlreadyRegistered);
        }

        let display = name.unwrap_or_else(|| email.split('@').next().unwrap_or(email));
        let result = self
            .database
            .create_user_with_personal_org(
                CreateUser {
                    email: email.to_string(),
                    name: name.map(String::from),
                },
                format!("{}'s workspace", display),
                self.clock.now(),
            )
            .await;

        // The pre-check races with concurrent signups; the store's
        // uniqueness constraint is the authority.
        match result {
            Err(AuthError::Database(DatabaseError::Constraint(_))) => {
                Err(AuthError::EmailAlreadyRegistered)
            }
            other => other,
        }
    }

    pub async fn get_membership(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> AuthResult<Option<Membership>> {
        self.database.get_membership(organization_id, user_id).await
    }

    pub async fn list_memberships(&self, organization_id: &str) -> AuthResult<Vec<Membership>> {
        self.database
            .list_organization_memberships(organization_id)
            .await
    }

    pub async fn list_user_memberships(&self, user_id: &str) -> AuthResult<Vec<Membership>> {
        self.database.list_user_memberships(user_id).await
    }

    /// Add a user to an organization with the given role.
    pub async fn add_member(
        &self,
        organization_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> AuthResult<Membership> {
        self.database
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let result = self
            .database
            .create_membership(
                CreateMembership {
                    user_id: user_id.to_string(),
                    organization_id: organization_id.to_string(),
                    role,
                    is_personal_org: false,
                },
                self.clock.now(),
            )
            .await;

        match result {
            Err(AuthError::Database(DatabaseError::Constraint(_))) => Err(AuthError::conflict(
                "User is already a member of this organization",
            )),
            other => other,
        }
    }

    /// Remove another member from an organization.
    ///
    /// The acting user must outrank the target per the role order. Fails
    /// with `LAST_ADMIN` if the target is the organization's only
    /// owner/admin and with `CANNOT_LEAVE_PERSONAL_ORG` if the organization
    /// is the target's personal org. Self-removal is routed to
    /// [`Self::leave_organization`] instead.
    pub async fn remove_member(
        &self,
        organization_id: &str,
        acting_user_id: &str,
        target_user_id: &str,
    ) -> AuthResult<()> {
        if acting_user_id == target_user_id {
            return Err(AuthError::forbidden(
                "Use the leave operation to remove yourself",
            ));
        }

        let actor = self
            .database
            .get_membership(organization_id, acting_user_id)
            .await?
            .ok_or(AuthError::NotAMember)?;
        let target = self
            .database
            .get_membership(organization_id, target_user_id)
            .await?
            .ok_or(AuthError::NotAMember)?;

        if !actor.role.can_manage(target.role) {
            return Err(AuthError::forbidden(
                "Insufficient role to remove this member",
            ));
        }

        self.guard_removal(&target).await?;
        self.database.delete_membership(&target.id).await
    }

    /// Leave an organization. Always allowed for the user themselves,
    /// except for their personal org or when they are its last admin.
    pub async fn leave_organization(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> AuthResult<()> {
        let membership = self
            .database
            .get_membership(organization_id, user_id)
            .await?
            .ok_or(AuthError::NotAMember)?;

        self.guard_removal(&membership).await?;
        self.database.delete_membership(&membership.id).await
    }

    /// Shared guards for any membership removal: the personal org can
    /// never be left, and an organization must keep at least one
    /// owner/admin.
    async fn guard_removal(&self, target: &Membership) -> AuthResult<()> {
        if target.is_personal_org {
            return Err(AuthError::CannotLeavePersonalOrg);
        }

        if target.role.is_admin() {
            let admins = self
                .database
                .list_organization_memberships(&target.organization_id)
                .await?
                .into_iter()
                .filter(|m| m.role.is_admin())
                .count();
            if admins <= 1 {
                return Err(AuthError::LastAdmin);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creel_core::adapters::MemoryDatabaseAdapter;
    use creel_core::clock::ManualClock;

    struct Fixture {
        members: MembershipService,
        database: Arc<MemoryDatabaseAdapter>,
    }

    fn fixture() -> Fixture {
        let database = Arc::new(MemoryDatabaseAdapter::new());
        let clock = Arc::new(ManualClock::starting_now());
        let members = MembershipService::new(database.clone(), clock);
        Fixture { members, database }
    }

    #[tokio::test]
    async fn register_creates_the_personal_org() {
        let fx = fixture();
        let (user, org, membership) = fx
            .members
            .register_user("ana@example.com", Some("Ana"))
            .await
            .unwrap();

        assert_eq!(user.email, "ana@example.com");
        assert_eq!(org.name, "Ana's workspace");
        assert_eq!(membership.role, MemberRole::Owner);
        assert!(membership.is_personal_org);
        assert_eq!(membership.user_id, user.id);
        assert_eq!(membership.organization_id, org.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let fx = fixture();
        fx.members
            .register_user("ana@example.com", None)
            .await
            .unwrap();
        let err = fx
            .members
            .register_user("ana@example.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailAlreadyRegistered));
    }

    #[tokio::test]
    async fn add_member_rejects_unknown_users_and_duplicates() {
        let fx = fixture();
        let (_, org, _) = fx
            .members
            .register_user("owner@example.com", None)
            .await
            .unwrap();
        let (user, _, _) = fx
            .members
            .register_user("joiner@example.com", None)
            .await
            .unwrap();

        let err = fx
            .members
            .add_member(&org.id, "nope", MemberRole::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));

        fx.members
            .add_member(&org.id, &user.id, MemberRole::Member)
            .await
            .unwrap();
        let err = fx
            .members
            .add_member(&org.id, &user.id, MemberRole::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn admins_cannot_remove_admins_or_owners() {
        let fx = fixture();
        let (owner, org, _) = fx
            .members
            .register_user("owner@example.com", None)
            .await
            .unwrap();
        let (admin, _, _) = fx
            .members
            .register_user("admin@example.com", None)
            .await
            .unwrap();
        let (member, _, _) = fx
            .members
            .register_user("member@example.com", None)
            .await
            .unwrap();
        fx.members
            .add_member(&org.id, &admin.id, MemberRole::Admin)
            .await
            .unwrap();
        fx.members
            .add_member(&org.id, &member.id, MemberRole::Member)
            .await
            .unwrap();

        // Admin on owner: forbidden.
        let err = fx
            .members
            .remove_member(&org.id, &admin.id, &owner.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));

        // Member acting on anyone: forbidden.
        let err = fx
            .members
            .remove_member(&org.id, &member.id, &admin.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));

        // Admin on member: allowed.
        fx.members
            .remove_member(&org.id, &admin.id, &member.id)
            .await
            .unwrap();
        assert!(fx
            .database
            .get_membership(&org.id, &member.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn owner_can_remove_another_owner() {
        let fx = fixture();
        let (owner_a, org, _) = fx
            .members
            .register_user("a@example.com", None)
            .await
            .unwrap();
        let (owner_b, _, _) = fx
            .members
            .register_user("b@example.com", None)
            .await
            .unwrap();
        fx.members
            .add_member(&org.id, &owner_b.id, MemberRole::Owner)
            .await
            .unwrap();

        fx.members
            .remove_member(&org.id, &owner_a.id, &owner_b.id)
            .await
            .unwrap();

        // owner_a's own membership is the personal-org owner row.
        let err = fx
            .members
            .leave_organization(&org.id, &owner_a.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CannotLeavePersonalOrg));
    }

    #[tokio::test]
    async fn self_removal_must_use_leave() {
        let fx = fixture();
        let (owner, org, _) = fx
            .members
            .register_user("owner@example.com", None)
            .await
            .unwrap();
        let err = fx
            .members
            .remove_member(&org.id, &owner.id, &owner.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }

    #[tokio::test]
    async fn member_can_leave_a_joined_org() {
        let fx = fixture();
        let (_, org, _) = fx
            .members
            .register_user("owner@example.com", None)
            .await
            .unwrap();
        let (member, _, _) = fx
            .members
            .register_user("member@example.com", None)
            .await
            .unwrap();
        fx.members
            .add_member(&org.id, &member.id, MemberRole::Member)
            .await
            .unwrap();

        fx.members
            .leave_organization(&org.id, &member.id)
            .await
            .unwrap();
        assert!(fx
            .members
            .get_membership(&member.id, &org.id)
            .await
            .unwrap()
            .is_none());

        // Leaving again: no membership.
        let err = fx
            .members
            .leave_organization(&org.id, &member.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotAMember));
    }

    #[tokio::test]
    async fn sole_remaining_admin_cannot_leave() {
        let fx = fixture();
        let (_, org, _) = fx
            .members
            .register_user("owner@example.com", None)
            .await
            .unwrap();
        let (solo, _, _) = fx
            .members
            .register_user("solo@example.com", None)
            .await
            .unwrap();
        fx.members
            .add_member(&org.id, &solo.id, MemberRole::Admin)
            .await
            .unwrap();

        // Model an org whose only remaining admin-ranked member is the
        // joined admin (the original owner row is gone).
        let owner_row = fx
            .database
            .list_organization_memberships(&org.id)
            .await
            .unwrap()
            .into_iter()
            .find(|m| m.is_personal_org)
            .unwrap();
        fx.database.delete_membership(&owner_row.id).await.unwrap();

        let err = fx
            .members
            .leave_organization(&org.id, &solo.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::LastAdmin));
    }
}
