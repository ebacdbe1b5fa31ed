use async_trait::async_trait;

use super::types::{AuditQuery, MemberJoinLog, NewMemberJoin, NewRoleChange, RoleChangeLog};
use crate::AccessError;

/// Append-and-query storage for role change entries.
///
/// No update or delete is exposed; rows leave only through the
/// project-deletion cascade. The audited composites on the membership store
/// write this table inside their own transactions - this trait serves
/// standalone appends and queries.
#[async_trait]
pub trait RoleChangeLogRepository: Send + Sync {
    /// Appends one entry.
    ///
    /// Fails with `InvalidInput` if `old_role == new_role`; a no-op change
    /// is a caller bug, not an auditable event.
    async fn append(&self, entry: NewRoleChange) -> Result<RoleChangeLog, AccessError>;

    /// Entries for a project, most recent first.
    async fn by_project(
        &self,
        project_id: &str,
        query: AuditQuery,
    ) -> Result<Vec<RoleChangeLog>, AccessError>;

    /// Entries affecting a user across projects, most recent first.
    async fn by_user(
        &self,
        user_id: &str,
        query: AuditQuery,
    ) -> Result<Vec<RoleChangeLog>, AccessError>;
}

/// Append-and-query storage for member join entries.
#[async_trait]
pub trait MemberJoinLogRepository: Send + Sync {
    /// Appends one entry.
    async fn append(&self, entry: NewMemberJoin) -> Result<MemberJoinLog, AccessError>;

    /// Entries for a project, most recent first.
    async fn by_project(
        &self,
        project_id: &str,
        query: AuditQuery,
    ) -> Result<Vec<MemberJoinLog>, AccessError>;

    /// Entries for a user across projects, most recent first.
    async fn by_user(
        &self,
        user_id: &str,
        query: AuditQuery,
    ) -> Result<Vec<MemberJoinLog>, AccessError>;
}
