//! Invitation link types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::DEFAULT_TOKEN_RANDOM_LEN;
use crate::roles::JoinRole;

/// A shareable token granting join rights to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteLink {
    /// Unique identifier.
    pub id: i64,
    /// The project the link joins users into.
    pub project_id: String,
    /// The admin who created the link.
    pub created_by: String,
    /// SHA-256 hash of the token. The plain token is never stored.
    #[serde(skip_serializing)]
    pub token_hash: String,
    /// Role granted on join.
    pub join_role: JoinRole,
    /// Whether the link is currently active. Superseded and explicitly
    /// deactivated links stay on record with `is_active = false`.
    pub is_active: bool,
    /// Maximum number of successful redemptions; `None` is unlimited.
    pub max_uses: Option<i32>,
    /// Successful redemptions so far. Monotonic, starts at 0, and never
    /// exceeds `max_uses` when one is set.
    pub current_uses: i32,
    /// When the link stops being usable; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the link was created.
    pub created_at: DateTime<Utc>,
}

impl InviteLink {
    /// The usability predicate: active, unexpired, and not exhausted.
    ///
    /// Callers outside a transaction must treat the answer as advisory -
    /// a concurrent redemption can flip it. Redemption re-checks under the
    /// store's locking.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.expires_at.is_none_or(|at| at > now)
            && self
                .max_uses
                .is_none_or(|max| self.current_uses < max)
    }
}

/// Context captured from the redeeming request, recorded in the join log.
#[derive(Debug, Clone, Default)]
pub struct RedeemContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Configuration for invitation links.
#[derive(Debug, Clone)]
pub struct InviteLinkConfig {
    /// Number of random characters in a generated token.
    pub token_random_len: usize,
    /// Expiry applied when the creator sets none. `None` means such links
    /// never expire.
    pub default_expiry: Option<Duration>,
}

impl Default for InviteLinkConfig {
    fn default() -> Self {
        Self {
            token_random_len: DEFAULT_TOKEN_RANDOM_LEN,
            default_expiry: Some(Duration::days(7)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> InviteLink {
        InviteLink {
            id: 1,
            project_id: "p1".to_owned(),
            created_by: "u1".to_owned(),
            token_hash: "hash".to_owned(),
            join_role: JoinRole::Member,
            is_active: true,
            max_uses: None,
            current_uses: 0,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_usable_when_active_unbounded() {
        assert!(link().is_usable(Utc::now()));
    }

    #[test]
    fn test_unusable_when_inactive() {
        let mut l = link();
        l.is_active = false;
        assert!(!l.is_usable(Utc::now()));
    }

    #[test]
    fn test_unusable_when_expired() {
        let mut l = link();
        l.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(!l.is_usable(Utc::now()));

        l.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(l.is_usable(Utc::now()));
    }

    #[test]
    fn test_unusable_when_exhausted() {
        let mut l = link();
        l.max_uses = Some(3);
        l.current_uses = 2;
        assert!(l.is_usable(Utc::now()));

        l.current_uses = 3;
        assert!(!l.is_usable(Utc::now()));
    }
}
