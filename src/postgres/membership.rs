//! `PostgreSQL` implementation of [`MembershipRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{map_db_err, role_from_db};
use crate::membership::{
    ListMembersOptions, Membership, MembershipRepository, NewMembership, OwnershipTransfer,
    RoleChange, RoleCounts,
};
use crate::roles::ProjectRole;
use crate::AccessError;

const MEMBERSHIP_COLUMNS: &str = "id, project_id, user_id, role, joined_at, updated_at";

/// Deterministic member ordering: role level descending, then joined-at
/// ascending. Owners-first is a contract for UI and export surfaces.
const ROLE_ORDER: &str = "CASE role \
    WHEN 'owner' THEN 4 \
    WHEN 'admin' THEN 3 \
    WHEN 'member' THEN 2 \
    WHEN 'viewer' THEN 1 \
    ELSE 0 END DESC, joined_at ASC";

/// PostgreSQL-backed membership repository.
#[derive(Clone)]
pub struct PostgresMembershipRepository {
    pool: PgPool,
}

impl PostgresMembershipRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
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

impl TryFrom<MembershipRecord> for Membership {
    type Error = AccessError;

    fn try_from(row: MembershipRecord) -> Result<Self, Self::Error> {
        Ok(Membership {
            id: row.id,
            project_id: row.project_id,
            user_id: row.user_id,
            role: role_from_db(&row.role)?,
            joined_at: row.joined_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_insert_error(e: sqlx::Error) -> AccessError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some("memberships_single_owner_idx") => AccessError::OwnerConflict,
                _ => AccessError::DuplicateMembership,
            };
        }
    }
    map_db_err("create_membership", &e)
}

#[async_trait]
impl MembershipRepository for PostgresMembershipRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create(&self, data: NewMembership) -> Result<Membership, AccessError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_err("create_membership", &e))?;

        if data.role == ProjectRole::Owner {
            // lock any existing owner row; the partial unique index
            // backstops the first-owner race where there is nothing to lock
            let existing: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM memberships WHERE project_id = $1 AND role = 'owner' FOR UPDATE",
            )
            .bind(&data.project_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_db_err("create_membership", &e))?;

            if existing.is_some() {
                return Err(AccessError::OwnerConflict);
            }
        }

        let row: MembershipRecord = sqlx::query_as(&format!(
            "INSERT INTO memberships (project_id, user_id, role) \
             VALUES ($1, $2, $3) \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(&data.project_id)
        .bind(&data.user_id)
        .bind(data.role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        tx.commit()
            .await
            .map_err(|e| map_db_err("create_membership", &e))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<Membership>, AccessError> {
        let row: Option<MembershipRecord> = sqlx::query_as(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE project_id = $1 AND user_id = $2"
        ))
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err("find_membership", &e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn list_by_project(
        &self,
        project_id: &str,
        options: ListMembersOptions,
    ) -> Result<Vec<Membership>, AccessError> {
        let rows: Vec<MembershipRecord> = sqlx::query_as(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE project_id = $1 AND ($2::text IS NULL OR role = $2) \
             ORDER BY {ROLE_ORDER} \
             LIMIT $3"
        ))
        .bind(project_id)
        .bind(options.role.map(ProjectRole::as_str))
        .bind(options.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("list_members", &e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn update_role(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<Membership, AccessError> {
        let row: MembershipRecord = sqlx::query_as(&format!(
            "UPDATE memberships SET role = $3, updated_at = NOW() \
             WHERE project_id = $1 AND user_id = $2 \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(project_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => AccessError::NotAMember,
            _ => map_db_err("update_membership_role", &e),
        })?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn change_role_logged(&self, change: RoleChange) -> Result<Membership, AccessError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_err("change_role", &e))?;

        let current: Option<String> = sqlx::query_scalar(
            "SELECT role FROM memberships WHERE project_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(&change.project_id)
        .bind(&change.user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_db_err("change_role", &e))?;

        let old_role = role_from_db(&current.ok_or(AccessError::NotAMember)?)?;
        if old_role == change.new_role {
            return Err(AccessError::InvalidInput("role is unchanged".to_owned()));
        }

        let row: MembershipRecord = sqlx::query_as(&format!(
            "UPDATE memberships SET role = $3, updated_at = NOW() \
             WHERE project_id = $1 AND user_id = $2 \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(&change.project_id)
        .bind(&change.user_id)
        .bind(change.new_role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_err("change_role", &e))?;

        sqlx::query(
            "INSERT INTO role_change_log (project_id, user_id, changed_by, old_role, new_role, reason) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&change.project_id)
        .bind(&change.user_id)
        .bind(&change.changed_by)
        .bind(old_role.as_str())
        .bind(change.new_role.as_str())
        .bind(&change.reason)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_err("change_role", &e))?;

        tx.commit().await.map_err(|e| map_db_err("change_role", &e))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn remove(&self, project_id: &str, user_id: &str) -> Result<(), AccessError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_err("remove_membership", &e))?;

        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM memberships WHERE project_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_db_err("remove_membership", &e))?;

        let role = role.ok_or(AccessError::NotAMember)?;
        if role_from_db(&role)? == ProjectRole::Owner {
            return Err(AccessError::CannotRemoveOwner);
        }

        sqlx::query("DELETE FROM memberships WHERE project_id = $1 AND user_id = $2")
            .bind(project_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_err("remove_membership", &e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_err("remove_membership", &e))?;

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn remove_project(&self, project_id: &str) -> Result<u64, AccessError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_err("remove_project", &e))?;

        for table in ["invite_links", "role_change_log", "member_join_log"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE project_id = $1"))
                .bind(project_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_db_err("remove_project", &e))?;
        }

        let result = sqlx::query("DELETE FROM memberships WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_err("remove_project", &e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_err("remove_project", &e))?;

        Ok(result.rows_affected())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn count_by_role(&self, project_id: &str) -> Result<RoleCounts, AccessError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM memberships WHERE project_id = $1 GROUP BY role")
                .bind(project_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_db_err("count_by_role", &e))?;

        let mut counts = RoleCounts::default();
        for (role, n) in rows {
            counts.add(role_from_db(&role)?, n);
        }
        Ok(counts)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn transfer_ownership(
        &self,
        transfer: OwnershipTransfer,
    ) -> Result<Membership, AccessError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_err("transfer_ownership", &e))?;

        let owner: Option<MembershipRecord> = sqlx::query_as(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE project_id = $1 AND role = 'owner' FOR UPDATE"
        ))
        .bind(&transfer.project_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_db_err("transfer_ownership", &e))?;

        let owner = owner.ok_or(AccessError::NotFound)?;
        if owner.user_id == transfer.new_owner_id {
            return Err(AccessError::InvalidInput(
                "user already owns this project".to_owned(),
            ));
        }

        let target: Option<MembershipRecord> = sqlx::query_as(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE project_id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(&transfer.project_id)
        .bind(&transfer.new_owner_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_db_err("transfer_ownership", &e))?;

        let target = target.ok_or(AccessError::NotAMember)?;
        let target_role = role_from_db(&target.role)?;

        // demote before promoting so the partial unique owner index never
        // sees two owners
        sqlx::query("UPDATE memberships SET role = 'admin', updated_at = NOW() WHERE id = $1")
            .bind(owner.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_err("transfer_ownership", &e))?;

        let row: MembershipRecord = sqlx::query_as(&format!(
            "UPDATE memberships SET role = 'owner', updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(target.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_err("transfer_ownership", &e))?;

        for (user_id, old_role, new_role) in [
            (&owner.user_id, ProjectRole::Owner, ProjectRole::Admin),
            (&target.user_id, target_role, ProjectRole::Owner),
        ] {
            sqlx::query(
                "INSERT INTO role_change_log (project_id, user_id, changed_by, old_role, new_role, reason) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&transfer.project_id)
            .bind(user_id)
            .bind(&transfer.initiated_by)
            .bind(old_role.as_str())
            .bind(new_role.as_str())
            .bind("ownership transferred")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_err("transfer_ownership", &e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_db_err("transfer_ownership", &e))?;

        row.try_into()
    }
}
