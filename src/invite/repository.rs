use async_trait::async_trait;

use super::types::{InviteLink, RedeemContext};
use crate::membership::Membership;
use crate::roles::JoinRole;
use crate::AccessError;

/// Data for creating an invitation link.
#[derive(Debug, Clone)]
pub struct NewInviteLink {
    pub project_id: String,
    pub created_by: String,
    pub token_hash: String,
    pub join_role: JoinRole,
    pub max_uses: Option<i32>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Storage for invitation links.
///
/// [`redeem`](InviteLinkRepository::redeem) is the engine's central atomic
/// unit; implementations execute it under the backend's native locking so
/// that concurrent redeemers racing for the last use slot resolve to exactly
/// one winner.
#[async_trait]
pub trait InviteLinkRepository: Send + Sync {
    /// Inserts a new active link, atomically deactivating every previously
    /// active link for the project (single-active-link policy).
    async fn insert(&self, data: NewInviteLink) -> Result<InviteLink, AccessError>;

    /// Looks up a link by token hash, active or not.
    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<InviteLink>, AccessError>;

    /// The project's currently active link, if any.
    async fn find_active_by_project(
        &self,
        project_id: &str,
    ) -> Result<Option<InviteLink>, AccessError>;

    /// Deactivates every active link for the project. Returns how many were
    /// deactivated.
    async fn deactivate_for_project(&self, project_id: &str) -> Result<u64, AccessError>;

    /// Converts a token redemption into a membership, as one atomic unit:
    ///
    /// 1. Re-fetch the link under the backend's locking and re-check the
    ///    usability predicate - `InvalidOrExpiredToken` if it fails.
    /// 2. Create the membership with the link's join role - `AlreadyMember`
    ///    aborts everything.
    /// 3. Append a `MemberJoinLog` entry with method `InviteLink`.
    /// 4. Increment the link's use count by exactly one.
    ///
    /// On any failure the whole unit rolls back: no membership, no log
    /// entry, no count change.
    async fn redeem(
        &self,
        token_hash: &str,
        user_id: &str,
        context: RedeemContext,
    ) -> Result<Membership, AccessError>;
}
