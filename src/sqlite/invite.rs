//! `SQLite` implementation of [`InviteLinkRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::{join_role_from_db, map_db_err, role_from_db};
use crate::invite::{InviteLink, InviteLinkRepository, NewInviteLink, RedeemContext};
use crate::membership::Membership;
use crate::AccessError;

const LINK_COLUMNS: &str = "id, project_id, created_by, token_hash, join_role, is_active, \
     max_uses, current_uses, expires_at, created_at";

/// `SQLite`-backed invitation link repository.
///
/// Redemption claims a use slot with a single conditional `UPDATE` as the
/// transaction's first statement, so concurrent redeemers serialize on the
/// database write lock and the usability predicate is evaluated atomically
/// with the increment.
#[derive(Clone)]
pub struct SqliteInviteLinkRepository {
    pool: SqlitePool,
}

impl SqliteInviteLinkRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct InviteLinkRecord {
    id: i64,
    project_id: String,
    created_by: String,
    token_hash: String,
    join_role: String,
    is_active: bool,
    max_uses: Option<i32>,
    current_uses: i32,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<InviteLinkRecord> for InviteLink {
    type Error = AccessError;

    fn try_from(row: InviteLinkRecord) -> Result<Self, Self::Error> {
        Ok(InviteLink {
            id: row.id,
            project_id: row.project_id,
            created_by: row.created_by,
            token_hash: row.token_hash,
            join_role: join_role_from_db(&row.join_role)?,
            is_active: row.is_active,
            max_uses: row.max_uses,
            current_uses: row.current_uses,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct MembershipRecord {
    id: i64,
    project_id: String,
    user_id: String,
    role: String,
    joined_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl InviteLinkRepository for SqliteInviteLinkRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, data), err))]
    async fn insert(&self, data: NewInviteLink) -> Result<InviteLink, AccessError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_err("insert_invite_link", &e))?;

        // single-active-link policy: the new link supersedes all others
        sqlx::query("UPDATE invite_links SET is_active = FALSE WHERE project_id = ? AND is_active")
            .bind(&data.project_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_err("insert_invite_link", &e))?;

        let row: InviteLinkRecord = sqlx::query_as(&format!(
            "INSERT INTO invite_links (project_id, created_by, token_hash, join_role, max_uses, expires_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(&data.project_id)
        .bind(&data.created_by)
        .bind(&data.token_hash)
        .bind(data.join_role.as_str())
        .bind(data.max_uses)
        .bind(data.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_err("insert_invite_link", &e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_err("insert_invite_link", &e))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<InviteLink>, AccessError> {
        let row: Option<InviteLinkRecord> = sqlx::query_as(&format!(
            "SELECT {LINK_COLUMNS} FROM invite_links WHERE token_hash = ?"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err("find_invite_link_by_token_hash", &e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_active_by_project(
        &self,
        project_id: &str,
    ) -> Result<Option<InviteLink>, AccessError> {
        let row: Option<InviteLinkRecord> = sqlx::query_as(&format!(
            "SELECT {LINK_COLUMNS} FROM invite_links WHERE project_id = ? AND is_active"
        ))
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err("find_active_invite_link", &e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn deactivate_for_project(&self, project_id: &str) -> Result<u64, AccessError> {
        let result = sqlx::query(
            "UPDATE invite_links SET is_active = FALSE WHERE project_id = ? AND is_active",
        )
        .bind(project_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("deactivate_invite_links", &e))?;

        Ok(result.rows_affected())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, token_hash, context), err))]
    async fn redeem(
        &self,
        token_hash: &str,
        user_id: &str,
        context: RedeemContext,
    ) -> Result<Membership, AccessError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_err("redeem_invite_link", &e))?;

        // claim a use slot; the conditional re-checks usability atomically
        // with the increment, and a rollback returns the slot
        let claimed = sqlx::query(
            "UPDATE invite_links SET current_uses = current_uses + 1 \
             WHERE token_hash = ?1 \
               AND is_active \
               AND (expires_at IS NULL OR expires_at > ?2) \
               AND (max_uses IS NULL OR current_uses < max_uses)",
        )
        .bind(token_hash)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_err("redeem_invite_link", &e))?;

        if claimed.rows_affected() == 0 {
            return Err(AccessError::InvalidOrExpiredToken);
        }

        let row: InviteLinkRecord = sqlx::query_as(&format!(
            "SELECT {LINK_COLUMNS} FROM invite_links WHERE token_hash = ?"
        ))
        .bind(token_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_err("redeem_invite_link", &e))?;
        let link: InviteLink = row.try_into()?;

        let already: Option<i64> =
            sqlx::query_scalar("SELECT id FROM memberships WHERE project_id = ? AND user_id = ?")
                .bind(&link.project_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_db_err("redeem_invite_link", &e))?;
        if already.is_some() {
            return Err(AccessError::AlreadyMember);
        }

        let membership: MembershipRecord = sqlx::query_as(
            "INSERT INTO memberships (project_id, user_id, role) \
             VALUES (?, ?, ?) \
             RETURNING id, project_id, user_id, role, joined_at, updated_at",
        )
        .bind(&link.project_id)
        .bind(user_id)
        .bind(link.join_role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_err("redeem_invite_link", &e))?;

        sqlx::query(
            "INSERT INTO member_join_log (project_id, user_id, join_method, invite_token_hash, ip_address, user_agent) \
             VALUES (?, ?, 'invite_link', ?, ?, ?)",
        )
        .bind(&link.project_id)
        .bind(user_id)
        .bind(token_hash)
        .bind(&context.ip_address)
        .bind(&context.user_agent)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_err("redeem_invite_link", &e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_err("redeem_invite_link", &e))?;

        Ok(Membership {
            id: membership.id,
            project_id: membership.project_id,
            user_id: membership.user_id,
            role: role_from_db(&membership.role)?,
            joined_at: membership.joined_at,
            updated_at: membership.updated_at,
        })
    }
}
