use chrono::Utc;

use crate::crypto::hash_token;
use crate::invite::{InviteLinkRepository, RedeemContext};
use crate::membership::Membership;
use crate::{AccessError, SecretString};

/// Action to redeem an invitation token into a membership.
///
/// The store's [`redeem`](InviteLinkRepository::redeem) runs as one atomic
/// unit: membership creation, the join-log entry, and the use-count
/// increment all land together or not at all. Concurrent redeemers racing
/// for a link's last use slot resolve to exactly one winner; the rest fail
/// with `InvalidOrExpiredToken`.
pub struct RedeemInviteLinkAction<L>
where
    L: InviteLinkRepository,
{
    links: L,
}

impl<L> RedeemInviteLinkAction<L>
where
    L: InviteLinkRepository,
{
    /// Creates a new `RedeemInviteLinkAction`.
    pub fn new(links: L) -> Self {
        Self { links }
    }

    /// Redeems the token for `user_id`.
    ///
    /// # Errors
    ///
    /// - `InvalidOrExpiredToken` - unknown token, or the link is inactive,
    ///   expired, or usage-exhausted (including losing the race for the
    ///   last slot)
    /// - `AlreadyMember` - the user already belongs to the project; nothing
    ///   is written
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "redeem_invite_link", skip(self, token), err)
    )]
    pub async fn execute(
        &self,
        token: &SecretString,
        user_id: &str,
        context: RedeemContext,
    ) -> Result<Membership, AccessError> {
        let token_hash = hash_token(token.expose_secret());

        // cheap pre-check outside the transaction; the store re-checks
        // under its locking
        let link = self
            .links
            .find_by_token_hash(&token_hash)
            .await?
            .ok_or(AccessError::InvalidOrExpiredToken)?;
        if !link.is_usable(Utc::now()) {
            return Err(AccessError::InvalidOrExpiredToken);
        }

        let membership = self.links.redeem(&token_hash, user_id, context).await?;

        log::info!(
            target: "parapet",
            "msg=\"invite link redeemed\", project_id=\"{}\", user_id=\"{}\", link_id={}",
            membership.project_id,
            membership.user_id,
            link.id
        );

        Ok(membership)
    }
}

#[cfg(all(test, feature = "mocks"))]
mod tests {
    use super::*;
    use crate::audit::{AuditQuery, JoinMethod, MemberJoinLogRepository};
    use crate::invite::NewInviteLink;
    use crate::membership::{MembershipRepository, NewMembership};
    use crate::mocks::MockStore;
    use crate::roles::{JoinRole, ProjectRole};

    async fn seed_link(store: &MockStore, token: &str, max_uses: Option<i32>) {
        store
            .create(NewMembership {
                project_id: "p1".to_owned(),
                user_id: "owner".to_owned(),
                role: ProjectRole::Owner,
            })
            .await
            .unwrap();
        store
            .insert(NewInviteLink {
                project_id: "p1".to_owned(),
                created_by: "owner".to_owned(),
                token_hash: hash_token(token),
                join_role: JoinRole::Member,
                max_uses,
                expires_at: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_redeem_creates_membership_log_and_count() {
        let store = MockStore::new();
        seed_link(&store, "tok-1", Some(1)).await;

        let action = RedeemInviteLinkAction::new(store.clone());
        let membership = action
            .execute(
                &SecretString::new("tok-1"),
                "newcomer",
                RedeemContext {
                    ip_address: Some("203.0.113.9".to_owned()),
                    user_agent: Some("test-agent".to_owned()),
                },
            )
            .await
            .unwrap();

        assert_eq!(membership.project_id, "p1");
        assert_eq!(membership.role, ProjectRole::Member);

        let link = store
            .find_by_token_hash(&hash_token("tok-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(link.current_uses, 1);

        let joins = MemberJoinLogRepository::by_project(&store, "p1", AuditQuery::default())
            .await
            .unwrap();
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].join_method, JoinMethod::InviteLink);
        assert_eq!(joins[0].invite_token_hash, Some(hash_token("tok-1")));
        assert_eq!(joins[0].ip_address.as_deref(), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn test_redeem_exhausted_link_fails() {
        let store = MockStore::new();
        seed_link(&store, "tok-1", Some(1)).await;

        let action = RedeemInviteLinkAction::new(store.clone());
        action
            .execute(&SecretString::new("tok-1"), "x", RedeemContext::default())
            .await
            .unwrap();

        let result = action
            .execute(&SecretString::new("tok-1"), "y", RedeemContext::default())
            .await;
        assert!(matches!(result, Err(AccessError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_redeem_already_member_leaves_no_trace() {
        let store = MockStore::new();
        seed_link(&store, "tok-1", Some(5)).await;

        let action = RedeemInviteLinkAction::new(store.clone());
        let result = action
            .execute(&SecretString::new("tok-1"), "owner", RedeemContext::default())
            .await;
        assert!(matches!(result, Err(AccessError::AlreadyMember)));

        // all-or-nothing: no join log row, no use-count change
        let joins = MemberJoinLogRepository::by_project(&store, "p1", AuditQuery::default())
            .await
            .unwrap();
        assert!(joins.is_empty());
        let link = store
            .find_by_token_hash(&hash_token("tok-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(link.current_uses, 0);
    }

    #[tokio::test]
    async fn test_redeem_grants_viewer_when_link_says_so() {
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
            .insert(NewInviteLink {
                project_id: "p1".to_owned(),
                created_by: "owner".to_owned(),
                token_hash: hash_token("tok-v"),
                join_role: JoinRole::Viewer,
                max_uses: None,
                expires_at: None,
            })
            .await
            .unwrap();

        let action = RedeemInviteLinkAction::new(store.clone());
        let membership = action
            .execute(&SecretString::new("tok-v"), "peek", RedeemContext::default())
            .await
            .unwrap();
        assert_eq!(membership.role, ProjectRole::Viewer);
    }
}
