//! Permission checks and audited role changes.

use crate::membership::{Membership, MembershipRepository, RoleChange};
use crate::roles::ProjectRole;
use crate::AccessError;

/// Answers "can user X perform an action requiring role R on project P" and
/// performs audited role changes.
///
/// Every check consults the membership store directly - permission results
/// are never cached, because a stale grant is a security bug, not a
/// performance optimization opportunity.
#[derive(Clone)]
pub struct PermissionService<M: MembershipRepository> {
    memberships: M,
}

impl<M: MembershipRepository> PermissionService<M> {
    /// Creates a service over the given membership store.
    pub fn new(memberships: M) -> Self {
        Self { memberships }
    }

    /// Whether the user holds a role satisfying `required` on the project.
    ///
    /// Returns `false` - never an error - when no membership exists; absence
    /// of access is a normal outcome.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn has_permission(
        &self,
        project_id: &str,
        user_id: &str,
        required: ProjectRole,
    ) -> Result<bool, AccessError> {
        let membership = self.memberships.find(project_id, user_id).await?;
        Ok(membership.is_some_and(|m| m.role.satisfies(required)))
    }

    /// The user's role on the project, if any.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn get_role(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<ProjectRole>, AccessError> {
        let membership = self.memberships.find(project_id, user_id).await?;
        Ok(membership.map(|m| m.role))
    }

    /// Like [`has_permission`](PermissionService::has_permission) but fails
    /// with `Forbidden` instead of returning `false`.
    pub async fn require(
        &self,
        project_id: &str,
        user_id: &str,
        required: ProjectRole,
    ) -> Result<(), AccessError> {
        if self.has_permission(project_id, user_id, required).await? {
            Ok(())
        } else {
            Err(AccessError::Forbidden)
        }
    }

    /// Changes a member's role and appends a `RoleChangeLog` entry, as one
    /// atomic unit.
    ///
    /// This method does NOT check that the acting user is generally
    /// authorized to manage members - that is the caller's responsibility:
    /// every route-level caller must check
    /// [`has_permission`](PermissionService::has_permission) (typically
    /// requiring `Admin`) before calling this. Keeping who-can-act out of
    /// here separates authorization policy from the change mechanism.
    ///
    /// Two guards ARE enforced here because they protect store invariants
    /// rather than route policy:
    ///
    /// - `new_role == Owner` fails `InvalidInput`; ownership moves only
    ///   through [`TransferOwnershipAction`](crate::TransferOwnershipAction).
    /// - Promoting to `Admin` requires the acting user to be the project
    ///   owner, otherwise `Forbidden`.
    ///
    /// # Errors
    ///
    /// - `NotAMember` - target has no membership
    /// - `InvalidInput` - new role equals the current role, or is `Owner`
    /// - `Forbidden` - non-owner actor promoting to `Admin`
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "change_role", skip(self, reason), err)
    )]
    pub async fn change_role(
        &self,
        project_id: &str,
        target_user_id: &str,
        new_role: ProjectRole,
        acting_user_id: &str,
        reason: Option<String>,
    ) -> Result<Membership, AccessError> {
        if new_role == ProjectRole::Owner {
            return Err(AccessError::InvalidInput(
                "ownership is granted by transfer, not role change".to_owned(),
            ));
        }

        if new_role == ProjectRole::Admin {
            let actor_role = self.get_role(project_id, acting_user_id).await?;
            if actor_role != Some(ProjectRole::Owner) {
                return Err(AccessError::Forbidden);
            }
        }

        let membership = self
            .memberships
            .change_role_logged(RoleChange {
                project_id: project_id.to_owned(),
                user_id: target_user_id.to_owned(),
                new_role,
                changed_by: acting_user_id.to_owned(),
                reason,
            })
            .await?;

        log::info!(
            target: "parapet",
            "msg=\"role changed\", project_id=\"{}\", user_id=\"{}\", new_role=\"{}\", changed_by=\"{}\"",
            membership.project_id,
            membership.user_id,
            membership.role.as_str(),
            acting_user_id
        );

        Ok(membership)
    }
}
