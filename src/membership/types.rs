//! Core membership types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roles::ProjectRole;

/// One user's standing in one project.
///
/// At most one membership exists per (project, user) pair, and exactly one
/// membership per project holds [`ProjectRole::Owner`] at all times after
/// project creation. Both invariants are enforced at write time by the
/// store, not by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    /// Unique identifier.
    pub id: i64,
    /// The project this membership belongs to (opaque identifier).
    pub project_id: String,
    /// The member (opaque identifier from the identity provider).
    pub user_id: String,
    /// The member's role in the project.
    pub role: ProjectRole,
    /// When the user joined the project.
    pub joined_at: DateTime<Utc>,
    /// When the membership was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Recognized options for listing project members.
#[derive(Debug, Clone, Default)]
pub struct ListMembersOptions {
    /// Only return members holding exactly this role.
    pub role: Option<ProjectRole>,
    /// Cap the number of returned rows.
    pub limit: Option<i64>,
}

/// Per-role membership counts for a project, for statistics surfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    pub owners: i64,
    pub admins: i64,
    pub members: i64,
    pub viewers: i64,
}

impl RoleCounts {
    /// Total members across all roles.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.owners + self.admins + self.members + self.viewers
    }

    /// Adds `n` members holding `role` to the tally.
    pub fn add(&mut self, role: ProjectRole, n: i64) {
        match role {
            ProjectRole::Owner => self.owners += n,
            ProjectRole::Admin => self.admins += n,
            ProjectRole::Member => self.members += n,
            ProjectRole::Viewer => self.viewers += n,
        }
    }
}
