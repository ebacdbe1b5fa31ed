//! Role hierarchy for project memberships.
//!
//! Roles form a total order used only for "at least this role" comparisons,
//! never for display. The hierarchy is the four-level canonical set; the
//! legacy three-level set (no admin) is a subset and parses the same way.

use serde::{Deserialize, Serialize};

/// A role assigned to a user within one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl ProjectRole {
    /// Numeric level for hierarchical comparison. Higher grants more.
    ///
    /// Unknown roles never reach this function: they fail [`ProjectRole::parse`]
    /// and therefore carry level 0 implicitly, failing every `satisfies` check.
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::Owner => 4,
            Self::Admin => 3,
            Self::Member => 2,
            Self::Viewer => 1,
        }
    }

    /// Whether this role meets or exceeds the required role.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        self.level() >= required.level()
    }

    /// String form for database storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }

    /// Parse from the database string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

/// The roles an invitation link may grant on join.
///
/// A closed subset of [`ProjectRole`]: links never mint owners or admins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRole {
    #[default]
    Member,
    Viewer,
}

impl JoinRole {
    /// String form for database storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }

    /// Parse from the database string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "member" => Some(Self::Member),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

impl From<JoinRole> for ProjectRole {
    fn from(role: JoinRole) -> Self {
        match role {
            JoinRole::Member => ProjectRole::Member,
            JoinRole::Viewer => ProjectRole::Viewer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_total_order() {
        assert!(ProjectRole::Owner.level() > ProjectRole::Admin.level());
        assert!(ProjectRole::Admin.level() > ProjectRole::Member.level());
        assert!(ProjectRole::Member.level() > ProjectRole::Viewer.level());
    }

    #[test]
    fn test_satisfies_reflexive() {
        for role in [
            ProjectRole::Owner,
            ProjectRole::Admin,
            ProjectRole::Member,
            ProjectRole::Viewer,
        ] {
            assert!(role.satisfies(role));
        }
    }

    #[test]
    fn test_satisfies_monotonic() {
        // if a role satisfies r1, it satisfies every r2 with level(r2) <= level(r1)
        let all = [
            ProjectRole::Owner,
            ProjectRole::Admin,
            ProjectRole::Member,
            ProjectRole::Viewer,
        ];
        for role in all {
            for r1 in all {
                if !role.satisfies(r1) {
                    continue;
                }
                for r2 in all {
                    if r2.level() <= r1.level() {
                        assert!(role.satisfies(r2));
                    }
                }
            }
        }
    }

    #[test]
    fn test_viewer_satisfies_only_viewer() {
        assert!(ProjectRole::Viewer.satisfies(ProjectRole::Viewer));
        assert!(!ProjectRole::Viewer.satisfies(ProjectRole::Member));
        assert!(!ProjectRole::Viewer.satisfies(ProjectRole::Admin));
        assert!(!ProjectRole::Viewer.satisfies(ProjectRole::Owner));
    }

    #[test]
    fn test_role_string_roundtrip() {
        for role in [
            ProjectRole::Owner,
            ProjectRole::Admin,
            ProjectRole::Member,
            ProjectRole::Viewer,
        ] {
            assert_eq!(ProjectRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(ProjectRole::parse("superuser"), None);
        assert_eq!(ProjectRole::parse(""), None);
    }

    #[test]
    fn test_join_role_into_project_role() {
        assert_eq!(ProjectRole::from(JoinRole::Member), ProjectRole::Member);
        assert_eq!(ProjectRole::from(JoinRole::Viewer), ProjectRole::Viewer);
        assert_eq!(JoinRole::default(), JoinRole::Member);
    }

    #[test]
    fn test_join_role_rejects_privileged_roles() {
        assert_eq!(JoinRole::parse("owner"), None);
        assert_eq!(JoinRole::parse("admin"), None);
    }
}
