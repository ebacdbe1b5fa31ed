//! `PostgreSQL` backend implementations.
//!
//! This module provides PostgreSQL-backed implementations for every
//! repository trait. Enable the `sqlx_postgres` feature to use them.
//! Composite operations run inside a transaction with `SELECT ... FOR
//! UPDATE` row locking; unique and partial-unique indexes backstop the
//! in-body invariant checks against races.

mod audit;
mod invite;
mod membership;
pub mod migrations;

pub use audit::{PostgresMemberJoinLogRepository, PostgresRoleChangeLogRepository};
pub use invite::PostgresInviteLinkRepository;
pub use membership::PostgresMembershipRepository;

use sqlx::PgPool;

use crate::roles::{JoinRole, ProjectRole};
use crate::AccessError;

/// Creates all Postgres repository instances from a connection pool.
pub fn create_repositories(
    pool: PgPool,
) -> (
    PostgresMembershipRepository,
    PostgresInviteLinkRepository,
    PostgresRoleChangeLogRepository,
    PostgresMemberJoinLogRepository,
) {
    (
        PostgresMembershipRepository::new(pool.clone()),
        PostgresInviteLinkRepository::new(pool.clone()),
        PostgresRoleChangeLogRepository::new(pool.clone()),
        PostgresMemberJoinLogRepository::new(pool),
    )
}

pub(crate) fn map_db_err(operation: &str, e: &sqlx::Error) -> AccessError {
    log::error!(target: "parapet", "msg=\"database error\", operation=\"{operation}\", error=\"{e}\"");
    AccessError::DatabaseError(e.to_string())
}

/// A role string that reached storage through the typed enum; anything else
/// is data corruption, surfaced as a database error rather than silently
/// granting or denying access.
pub(crate) fn role_from_db(s: &str) -> Result<ProjectRole, AccessError> {
    ProjectRole::parse(s)
        .ok_or_else(|| AccessError::DatabaseError(format!("unrecognized role in storage: {s}")))
}

pub(crate) fn join_role_from_db(s: &str) -> Result<JoinRole, AccessError> {
    JoinRole::parse(s).ok_or_else(|| {
        AccessError::DatabaseError(format!("unrecognized join role in storage: {s}"))
    })
}
