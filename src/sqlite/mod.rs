//! `SQLite` backend implementations.
//!
//! This module provides `SQLite`-backed implementations for every repository
//! trait. Enable the `sqlx_sqlite` feature to use them. Composite operations
//! run inside a transaction whose first statement is a write, so they
//! serialize on SQLite's database write lock.

mod audit;
mod invite;
mod membership;
pub mod migrations;

pub use audit::{SqliteMemberJoinLogRepository, SqliteRoleChangeLogRepository};
pub use invite::SqliteInviteLinkRepository;
pub use membership::SqliteMembershipRepository;

use sqlx::SqlitePool;

use crate::roles::{JoinRole, ProjectRole};
use crate::AccessError;

/// Creates all `SQLite` repository instances from a connection pool.
pub fn create_repositories(
    pool: SqlitePool,
) -> (
    SqliteMembershipRepository,
    SqliteInviteLinkRepository,
    SqliteRoleChangeLogRepository,
    SqliteMemberJoinLogRepository,
) {
    (
        SqliteMembershipRepository::new(pool.clone()),
        SqliteInviteLinkRepository::new(pool.clone()),
        SqliteRoleChangeLogRepository::new(pool.clone()),
        SqliteMemberJoinLogRepository::new(pool),
    )
}

pub(crate) fn map_db_err(operation: &str, e: &sqlx::Error) -> AccessError {
    log::error!(target: "parapet", "msg=\"database error\", operation=\"{operation}\", error=\"{e}\"");
    AccessError::DatabaseError(e.to_string())
}

pub(crate) fn role_from_db(s: &str) -> Result<ProjectRole, AccessError> {
    ProjectRole::parse(s)
        .ok_or_else(|| AccessError::DatabaseError(format!("unrecognized role in storage: {s}")))
}

pub(crate) fn join_role_from_db(s: &str) -> Result<JoinRole, AccessError> {
    JoinRole::parse(s).ok_or_else(|| {
        AccessError::DatabaseError(format!("unrecognized join role in storage: {s}"))
    })
}
