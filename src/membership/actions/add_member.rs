use crate::audit::{JoinMethod, MemberJoinLogRepository, NewMemberJoin};
use crate::membership::{Membership, MembershipRepository, NewMembership};
use crate::permissions::PermissionService;
use crate::roles::ProjectRole;
use crate::AccessError;

/// Input for directly adding a member to a project.
#[derive(Debug, Clone)]
pub struct AddMemberInput {
    pub project_id: String,
    pub user_id: String,
    pub role: ProjectRole,
    /// The admin performing the add.
    pub added_by: String,
}

/// Action to add a member directly, without an invitation link.
///
/// This action:
/// 1. Verifies the actor holds at least `Admin` on the project
/// 2. Creates the membership
/// 3. Appends a `MemberJoinLog` entry with method `AdminAdded`
pub struct AddMemberAction<M, J>
where
    M: MembershipRepository + Clone,
    J: MemberJoinLogRepository,
{
    permissions: PermissionService<M>,
    memberships: M,
    join_log: J,
}

impl<M, J> AddMemberAction<M, J>
where
    M: MembershipRepository + Clone,
    J: MemberJoinLogRepository,
{
    /// Creates a new `AddMemberAction`.
    pub fn new(memberships: M, join_log: J) -> Self {
        Self {
            permissions: PermissionService::new(memberships.clone()),
            memberships,
            join_log,
        }
    }

    /// Adds the member and records how they joined.
    ///
    /// # Errors
    ///
    /// - `Forbidden` - actor is not at least `Admin`, or a non-owner actor
    ///   granted `Admin`
    /// - `InvalidInput` - role is `Owner` (ownership moves only by transfer)
    /// - `DuplicateMembership` - the user is already a member
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "add_member", skip_all, err)
    )]
    pub async fn execute(&self, input: AddMemberInput) -> Result<Membership, AccessError> {
        self.permissions
            .require(&input.project_id, &input.added_by, ProjectRole::Admin)
            .await?;

        if input.role == ProjectRole::Owner {
            return Err(AccessError::InvalidInput(
                "ownership is granted by transfer, not direct add".to_owned(),
            ));
        }
        if input.role == ProjectRole::Admin {
            let actor_role = self
                .permissions
                .get_role(&input.project_id, &input.added_by)
                .await?;
            if actor_role != Some(ProjectRole::Owner) {
                return Err(AccessError::Forbidden);
            }
        }

        let membership = self
            .memberships
            .create(NewMembership {
                project_id: input.project_id.clone(),
                user_id: input.user_id.clone(),
                role: input.role,
            })
            .await?;

        self.join_log
            .append(NewMemberJoin {
                project_id: input.project_id,
                user_id: input.user_id,
                join_method: JoinMethod::AdminAdded,
                invite_token_hash: None,
                ip_address: None,
                user_agent: None,
            })
            .await?;

        log::info!(
            target: "parapet",
            "msg=\"member added\", project_id=\"{}\", user_id=\"{}\", role=\"{}\", added_by=\"{}\"",
            membership.project_id,
            membership.user_id,
            membership.role.as_str(),
            input.added_by
        );

        Ok(membership)
    }
}
