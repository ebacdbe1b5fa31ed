//! Database migrations for the `PostgreSQL` backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use parapet::postgres::migrations;
//! use sqlx::PgPool;
//!
//! async fn setup_database(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//!     migrations::run(pool).await
//! }
//! ```

use sqlx::PgPool;

/// Runs the access-control migrations.
///
/// This creates the tables:
/// - `memberships`
/// - `invite_links`
/// - `role_change_log`
/// - `member_join_log`
pub async fn run(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations/access").run(pool).await
}
