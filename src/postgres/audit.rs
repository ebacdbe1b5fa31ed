//! `PostgreSQL` implementations of the audit trail repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{map_db_err, role_from_db};
use crate::audit::{
    AuditQuery, JoinMethod, MemberJoinLog, MemberJoinLogRepository, NewMemberJoin, NewRoleChange,
    RoleChangeLog, RoleChangeLogRepository,
};
use crate::AccessError;

const ROLE_CHANGE_COLUMNS: &str =
    "id, project_id, user_id, changed_by, old_role, new_role, reason, changed_at";

const JOIN_LOG_COLUMNS: &str =
    "id, project_id, user_id, join_method, invite_token_hash, ip_address, user_agent, joined_at";

/// PostgreSQL-backed role change log.
#[derive(Clone)]
pub struct PostgresRoleChangeLogRepository {
    pool: PgPool,
}

impl PostgresRoleChangeLogRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct RoleChangeRecord {
    id: i64,
    project_id: String,
    user_id: String,
    changed_by: String,
    old_role: String,
    new_role: String,
    reason: Option<String>,
    changed_at: DateTime<Utc>,
}

impl TryFrom<RoleChangeRecord> for RoleChangeLog {
    type Error = AccessError;

    fn try_from(row: RoleChangeRecord) -> Result<Self, Self::Error> {
        Ok(RoleChangeLog {
            id: row.id,
            project_id: row.project_id,
            user_id: row.user_id,
            changed_by: row.changed_by,
            old_role: role_from_db(&row.old_role)?,
            new_role: role_from_db(&row.new_role)?,
            reason: row.reason,
            changed_at: row.changed_at,
        })
    }
}

#[async_trait]
impl RoleChangeLogRepository for PostgresRoleChangeLogRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, entry), err))]
    async fn append(&self, entry: NewRoleChange) -> Result<RoleChangeLog, AccessError> {
        if entry.old_role == entry.new_role {
            return Err(AccessError::InvalidInput(
                "old and new role are identical".to_owned(),
            ));
        }

        let row: RoleChangeRecord = sqlx::query_as(&format!(
            "INSERT INTO role_change_log (project_id, user_id, changed_by, old_role, new_role, reason) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ROLE_CHANGE_COLUMNS}"
        ))
        .bind(&entry.project_id)
        .bind(&entry.user_id)
        .bind(&entry.changed_by)
        .bind(entry.old_role.as_str())
        .bind(entry.new_role.as_str())
        .bind(&entry.reason)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err("append_role_change", &e))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn by_project(
        &self,
        project_id: &str,
        query: AuditQuery,
    ) -> Result<Vec<RoleChangeLog>, AccessError> {
        let rows: Vec<RoleChangeRecord> = sqlx::query_as(&format!(
            "SELECT {ROLE_CHANGE_COLUMNS} FROM role_change_log \
             WHERE project_id = $1 AND ($2::timestamptz IS NULL OR changed_at < $2) \
             ORDER BY changed_at DESC, id DESC \
             LIMIT $3"
        ))
        .bind(project_id)
        .bind(query.before)
        .bind(query.effective_limit())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("role_changes_by_project", &e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn by_user(
        &self,
        user_id: &str,
        query: AuditQuery,
    ) -> Result<Vec<RoleChangeLog>, AccessError> {
        let rows: Vec<RoleChangeRecord> = sqlx::query_as(&format!(
            "SELECT {ROLE_CHANGE_COLUMNS} FROM role_change_log \
             WHERE user_id = $1 AND ($2::timestamptz IS NULL OR changed_at < $2) \
             ORDER BY changed_at DESC, id DESC \
             LIMIT $3"
        ))
        .bind(user_id)
        .bind(query.before)
        .bind(query.effective_limit())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("role_changes_by_user", &e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

/// PostgreSQL-backed member join log.
#[derive(Clone)]
pub struct PostgresMemberJoinLogRepository {
    pool: PgPool,
}

impl PostgresMemberJoinLogRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct JoinLogRecord {
    id: i64,
    project_id: String,
    user_id: String,
    join_method: String,
    invite_token_hash: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    joined_at: DateTime<Utc>,
}

impl TryFrom<JoinLogRecord> for MemberJoinLog {
    type Error = AccessError;

    fn try_from(row: JoinLogRecord) -> Result<Self, Self::Error> {
        let join_method = JoinMethod::parse(&row.join_method).ok_or_else(|| {
            AccessError::DatabaseError(format!(
                "unrecognized join method in storage: {}",
                row.join_method
            ))
        })?;
        Ok(MemberJoinLog {
            id: row.id,
            project_id: row.project_id,
            user_id: row.user_id,
            join_method,
            invite_token_hash: row.invite_token_hash,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            joined_at: row.joined_at,
        })
    }
}

#[async_trait]
impl MemberJoinLogRepository for PostgresMemberJoinLogRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, entry), err))]
    async fn append(&self, entry: NewMemberJoin) -> Result<MemberJoinLog, AccessError> {
        let row: JoinLogRecord = sqlx::query_as(&format!(
            "INSERT INTO member_join_log (project_id, user_id, join_method, invite_token_hash, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {JOIN_LOG_COLUMNS}"
        ))
        .bind(&entry.project_id)
        .bind(&entry.user_id)
        .bind(entry.join_method.as_str())
        .bind(&entry.invite_token_hash)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err("append_member_join", &e))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn by_project(
        &self,
        project_id: &str,
        query: AuditQuery,
    ) -> Result<Vec<MemberJoinLog>, AccessError> {
        let rows: Vec<JoinLogRecord> = sqlx::query_as(&format!(
            "SELECT {JOIN_LOG_COLUMNS} FROM member_join_log \
             WHERE project_id = $1 AND ($2::timestamptz IS NULL OR joined_at < $2) \
             ORDER BY joined_at DESC, id DESC \
             LIMIT $3"
        ))
        .bind(project_id)
        .bind(query.before)
        .bind(query.effective_limit())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("member_joins_by_project", &e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn by_user(
        &self,
        user_id: &str,
        query: AuditQuery,
    ) -> Result<Vec<MemberJoinLog>, AccessError> {
        let rows: Vec<JoinLogRecord> = sqlx::query_as(&format!(
            "SELECT {JOIN_LOG_COLUMNS} FROM member_join_log \
             WHERE user_id = $1 AND ($2::timestamptz IS NULL OR joined_at < $2) \
             ORDER BY joined_at DESC, id DESC \
             LIMIT $3"
        ))
        .bind(user_id)
        .bind(query.before)
        .bind(query.effective_limit())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("member_joins_by_user", &e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
