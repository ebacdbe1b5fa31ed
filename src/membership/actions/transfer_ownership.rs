use crate::membership::{Membership, MembershipRepository, OwnershipTransfer};
use crate::permissions::PermissionService;
use crate::roles::ProjectRole;
use crate::AccessError;

/// Action to hand project ownership to another member.
///
/// Only the current owner may initiate the transfer. The store swaps the two
/// roles (old owner becomes `Admin`) and writes both audit entries in one
/// atomic unit, so the project never observably has zero or two owners.
pub struct TransferOwnershipAction<M>
where
    M: MembershipRepository + Clone,
{
    permissions: PermissionService<M>,
    memberships: M,
}

impl<M> TransferOwnershipAction<M>
where
    M: MembershipRepository + Clone,
{
    /// Creates a new `TransferOwnershipAction`.
    pub fn new(memberships: M) -> Self {
        Self {
            permissions: PermissionService::new(memberships.clone()),
            memberships,
        }
    }

    /// Transfers ownership of the project to `new_owner_id`.
    ///
    /// # Errors
    ///
    /// - `Forbidden` - the acting user is not the current owner
    /// - `NotAMember` - the target is not a member of the project
    /// - `InvalidInput` - the target already owns the project
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "transfer_ownership", skip(self), err)
    )]
    pub async fn execute(
        &self,
        project_id: &str,
        new_owner_id: &str,
        acting_user_id: &str,
    ) -> Result<Membership, AccessError> {
        let actor_role = self.permissions.get_role(project_id, acting_user_id).await?;
        if actor_role != Some(ProjectRole::Owner) {
            return Err(AccessError::Forbidden);
        }

        let membership = self
            .memberships
            .transfer_ownership(OwnershipTransfer {
                project_id: project_id.to_owned(),
                new_owner_id: new_owner_id.to_owned(),
                initiated_by: acting_user_id.to_owned(),
            })
            .await?;

        log::info!(
            target: "parapet",
            "msg=\"ownership transferred\", project_id=\"{}\", new_owner=\"{}\", previous_owner=\"{}\"",
            project_id,
            new_owner_id,
            acting_user_id
        );

        Ok(membership)
    }
}

#[cfg(all(test, feature = "mocks"))]
mod tests {
    use super::*;
    use crate::audit::{AuditQuery, RoleChangeLogRepository};
    use crate::membership::NewMembership;
    use crate::mocks::MockStore;

    async fn seed(store: &MockStore, project: &str, user: &str, role: ProjectRole) {
        store
            .create(NewMembership {
                project_id: project.to_owned(),
                user_id: user.to_owned(),
                role,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transfer_swaps_roles_and_logs_both_sides() {
        let store = MockStore::new();
        seed(&store, "p1", "alice", ProjectRole::Owner).await;
        seed(&store, "p1", "bob", ProjectRole::Member).await;

        let action = TransferOwnershipAction::new(store.clone());
        let new_owner = action.execute("p1", "bob", "alice").await.unwrap();
        assert_eq!(new_owner.role, ProjectRole::Owner);

        let alice = store.find("p1", "alice").await.unwrap().unwrap();
        assert_eq!(alice.role, ProjectRole::Admin);

        let changes = RoleChangeLogRepository::by_project(&store, "p1", AuditQuery::default())
            .await
            .unwrap();
        assert_eq!(changes.len(), 2);
    }

    #[tokio::test]
    async fn test_transfer_requires_current_owner() {
        let store = MockStore::new();
        seed(&store, "p1", "alice", ProjectRole::Owner).await;
        seed(&store, "p1", "bob", ProjectRole::Admin).await;
        seed(&store, "p1", "carol", ProjectRole::Member).await;

        let action = TransferOwnershipAction::new(store);
        let result = action.execute("p1", "carol", "bob").await;
        assert!(matches!(result, Err(AccessError::Forbidden)));
    }

    #[tokio::test]
    async fn test_transfer_to_non_member_fails() {
        let store = MockStore::new();
        seed(&store, "p1", "alice", ProjectRole::Owner).await;

        let action = TransferOwnershipAction::new(store);
        let result = action.execute("p1", "ghost", "alice").await;
        assert!(matches!(result, Err(AccessError::NotAMember)));
    }

    #[tokio::test]
    async fn test_transfer_to_self_fails() {
        let store = MockStore::new();
        seed(&store, "p1", "alice", ProjectRole::Owner).await;

        let action = TransferOwnershipAction::new(store);
        let result = action.execute("p1", "alice", "alice").await;
        assert!(matches!(result, Err(AccessError::InvalidInput(_))));
    }
}
