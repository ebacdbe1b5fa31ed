//! Audit trail types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roles::ProjectRole;

/// Default page size for audit queries.
pub const DEFAULT_AUDIT_LIMIT: i64 = 50;

/// How a user came to be a member of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMethod {
    /// Redeemed a shareable invitation link.
    InviteLink,
    /// Accepted a direct (emailed) invitation.
    DirectInvite,
    /// Added directly by a project admin.
    AdminAdded,
}

impl JoinMethod {
    /// String form for database storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InviteLink => "invite_link",
            Self::DirectInvite => "direct_invite",
            Self::AdminAdded => "admin_added",
        }
    }

    /// Parse from the database string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invite_link" => Some(Self::InviteLink),
            "direct_invite" => Some(Self::DirectInvite),
            "admin_added" => Some(Self::AdminAdded),
            _ => None,
        }
    }
}

/// Immutable record of one privilege change.
///
/// `old_role != new_role` always holds: no-op changes are rejected at write
/// time, never logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleChangeLog {
    pub id: i64,
    pub project_id: String,
    /// The member whose role changed.
    pub user_id: String,
    /// The actor who made the change.
    pub changed_by: String,
    pub old_role: ProjectRole,
    pub new_role: ProjectRole,
    /// Optional free-text reason supplied by the actor.
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Immutable record of how a user joined a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberJoinLog {
    pub id: i64,
    pub project_id: String,
    pub user_id: String,
    pub join_method: JoinMethod,
    /// Hash of the invitation token used, when joined via a link.
    pub invite_token_hash: Option<String>,
    /// Requester IP, when the route handler captured one.
    pub ip_address: Option<String>,
    /// Requester user agent, when the route handler captured one.
    pub user_agent: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// Data for appending a role change entry.
#[derive(Debug, Clone)]
pub struct NewRoleChange {
    pub project_id: String,
    pub user_id: String,
    pub changed_by: String,
    pub old_role: ProjectRole,
    pub new_role: ProjectRole,
    pub reason: Option<String>,
}

/// Data for appending a member join entry.
#[derive(Debug, Clone)]
pub struct NewMemberJoin {
    pub project_id: String,
    pub user_id: String,
    pub join_method: JoinMethod,
    pub invite_token_hash: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Recognized options for audit queries. Results come back recent-first;
/// pass the oldest `changed_at`/`joined_at` seen as `before` to page.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditQuery {
    /// Only return entries strictly older than this timestamp.
    pub before: Option<DateTime<Utc>>,
    /// Page size; defaults to [`DEFAULT_AUDIT_LIMIT`].
    pub limit: Option<i64>,
}

impl AuditQuery {
    /// The effective page size.
    #[must_use]
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_AUDIT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_method_roundtrip() {
        for method in [
            JoinMethod::InviteLink,
            JoinMethod::DirectInvite,
            JoinMethod::AdminAdded,
        ] {
            assert_eq!(JoinMethod::parse(method.as_str()), Some(method));
        }
        assert_eq!(JoinMethod::parse("teleported"), None);
    }

    #[test]
    fn test_audit_query_default_limit() {
        assert_eq!(AuditQuery::default().effective_limit(), DEFAULT_AUDIT_LIMIT);
        let query = AuditQuery {
            limit: Some(5),
            ..Default::default()
        };
        assert_eq!(query.effective_limit(), 5);
    }
}
