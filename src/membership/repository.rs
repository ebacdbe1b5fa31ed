use async_trait::async_trait;

use super::types::{ListMembersOptions, Membership, RoleCounts};
use crate::roles::ProjectRole;
use crate::AccessError;

/// Data for creating a membership.
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub project_id: String,
    pub user_id: String,
    pub role: ProjectRole,
}

/// An audited role change: the update and its log entry are written as one
/// atomic unit.
#[derive(Debug, Clone)]
pub struct RoleChange {
    pub project_id: String,
    pub user_id: String,
    pub new_role: ProjectRole,
    /// The user who made the change (for the audit entry).
    pub changed_by: String,
    /// Optional free-text reason recorded in the audit entry.
    pub reason: Option<String>,
}

/// An ownership hand-off between two existing members.
#[derive(Debug, Clone)]
pub struct OwnershipTransfer {
    pub project_id: String,
    /// The member receiving ownership.
    pub new_owner_id: String,
    /// The user who initiated the transfer (for the audit entries).
    pub initiated_by: String,
}

/// Storage for (project, user) → role records.
///
/// Implementations enforce the membership invariants inside the operation
/// bodies (single owner per project, unique (project, user) pair) rather than
/// relying on callers, and execute the composite operations
/// ([`change_role_logged`](MembershipRepository::change_role_logged),
/// [`transfer_ownership`](MembershipRepository::transfer_ownership)) as
/// single atomic units: if any write in the composite fails, none survive.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Creates a membership.
    ///
    /// Fails with `DuplicateMembership` if the (project, user) pair already
    /// has a record, and with `OwnerConflict` if `role` is `Owner` and the
    /// project already has one. Project bootstrap needs no special path: the
    /// first `Owner` write for a project finds no existing owner and
    /// succeeds.
    async fn create(&self, data: NewMembership) -> Result<Membership, AccessError>;

    /// Looks up one membership. Absence is a normal outcome, not an error.
    async fn find(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<Membership>, AccessError>;

    /// Lists project members in deterministic order: role level descending,
    /// then joined-at ascending. Owners first is a contract - UI and export
    /// surfaces depend on it.
    async fn list_by_project(
        &self,
        project_id: &str,
        options: ListMembersOptions,
    ) -> Result<Vec<Membership>, AccessError>;

    /// Updates a member's role without writing an audit entry.
    ///
    /// Mechanism only; privilege changes that must be audited go through
    /// [`change_role_logged`](MembershipRepository::change_role_logged).
    /// Fails with `NotAMember` if no record exists.
    async fn update_role(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<Membership, AccessError>;

    /// Atomically updates a member's role and appends the matching
    /// `RoleChangeLog` entry.
    ///
    /// Fails with `NotAMember` if no record exists and with `InvalidInput`
    /// if the new role equals the current one - no-op changes surface caller
    /// bugs and are never silently accepted. If the audit write fails the
    /// role change must not become visible.
    async fn change_role_logged(&self, change: RoleChange) -> Result<Membership, AccessError>;

    /// Deletes one membership.
    ///
    /// Fails with `NotAMember` if absent and with `CannotRemoveOwner` if the
    /// target currently owns the project - ownership must be transferred
    /// first so projects are never orphaned.
    async fn remove(&self, project_id: &str, user_id: &str) -> Result<(), AccessError>;

    /// Project-deletion cascade: removes the project's memberships, invite
    /// links, and audit entries. Returns the number of memberships removed.
    async fn remove_project(&self, project_id: &str) -> Result<u64, AccessError>;

    /// Per-role membership counts for a project.
    async fn count_by_role(&self, project_id: &str) -> Result<RoleCounts, AccessError>;

    /// Atomically demotes the current owner to `Admin`, promotes
    /// `new_owner_id` to `Owner`, and appends a `RoleChangeLog` entry for
    /// each side.
    ///
    /// Fails with `NotFound` if the project has no owner (unknown project),
    /// `NotAMember` if the target is not a member, and `InvalidInput` if the
    /// target already owns the project. Returns the new owner's membership.
    async fn transfer_ownership(
        &self,
        transfer: OwnershipTransfer,
    ) -> Result<Membership, AccessError>;
}
