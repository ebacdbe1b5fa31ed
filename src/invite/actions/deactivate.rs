use crate::invite::InviteLinkRepository;
use crate::membership::MembershipRepository;
use crate::permissions::PermissionService;
use crate::roles::ProjectRole;
use crate::AccessError;

/// Action to revoke a project's invitation links.
pub struct DeactivateInviteLinksAction<M, L>
where
    M: MembershipRepository,
    L: InviteLinkRepository,
{
    permissions: PermissionService<M>,
    links: L,
}

impl<M, L> DeactivateInviteLinksAction<M, L>
where
    M: MembershipRepository,
    L: InviteLinkRepository,
{
    /// Creates a new `DeactivateInviteLinksAction`.
    pub fn new(memberships: M, links: L) -> Self {
        Self {
            permissions: PermissionService::new(memberships),
            links,
        }
    }

    /// Deactivates every active link for the project. Returns how many were
    /// deactivated.
    ///
    /// # Errors
    ///
    /// - `Forbidden` - the acting user is not at least `Admin`
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "deactivate_invite_links", skip(self), err)
    )]
    pub async fn execute(
        &self,
        project_id: &str,
        acting_user_id: &str,
    ) -> Result<u64, AccessError> {
        self.permissions
            .require(project_id, acting_user_id, ProjectRole::Admin)
            .await?;

        let deactivated = self.links.deactivate_for_project(project_id).await?;

        log::info!(
            target: "parapet",
            "msg=\"invite links deactivated\", project_id=\"{}\", count={}, deactivated_by=\"{}\"",
            project_id,
            deactivated,
            acting_user_id
        );

        Ok(deactivated)
    }
}

#[cfg(all(test, feature = "mocks"))]
mod tests {
    use super::*;
    use crate::crypto::hash_token;
    use crate::invite::NewInviteLink;
    use crate::membership::NewMembership;
    use crate::mocks::MockStore;
    use crate::roles::JoinRole;

    #[tokio::test]
    async fn test_deactivate_requires_admin() {
        let store = MockStore::new();
        store
            .create(NewMembership {
                project_id: "p1".to_owned(),
                user_id: "owner".to_owned(),
                role: ProjectRole::Owner,
            })
            .await
            .unwrap();
        store
            .create(NewMembership {
                project_id: "p1".to_owned(),
                user_id: "viewer".to_owned(),
                role: ProjectRole::Viewer,
            })
            .await
            .unwrap();
        store
            .insert(NewInviteLink {
                project_id: "p1".to_owned(),
                created_by: "owner".to_owned(),
                token_hash: hash_token("tok-1"),
                join_role: JoinRole::Member,
                max_uses: None,
                expires_at: None,
            })
            .await
            .unwrap();

        let action = DeactivateInviteLinksAction::new(store.clone(), store.clone());

        let result = action.execute("p1", "viewer").await;
        assert!(matches!(result, Err(AccessError::Forbidden)));

        let deactivated = action.execute("p1", "owner").await.unwrap();
        assert_eq!(deactivated, 1);
        assert!(store.find_active_by_project("p1").await.unwrap().is_none());
    }
}
