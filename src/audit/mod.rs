//! Append-only audit trail of privilege changes and member joins.
//!
//! Entries are immutable once written and disappear only through the
//! project-deletion cascade. Retention and purge policy is an external
//! concern.

mod repository;
mod types;

pub use repository::{MemberJoinLogRepository, RoleChangeLogRepository};
pub use types::{
    AuditQuery, JoinMethod, MemberJoinLog, NewMemberJoin, NewRoleChange, RoleChangeLog,
    DEFAULT_AUDIT_LIMIT,
};
