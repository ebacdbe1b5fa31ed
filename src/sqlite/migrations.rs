//! Embedded database migrations for `SQLite`.
//!
//! Migrations are embedded at compile time and tracked in the
//! `_parapet_migrations` table, so re-running is a no-op.
//!
//! # Example
//!
//! ```rust,ignore
//! use parapet::sqlite::migrations;
//! use sqlx::SqlitePool;
//!
//! async fn setup_database(pool: &SqlitePool) -> Result<(), sqlx::Error> {
//!     migrations::run(pool).await
//! }
//! ```

use sqlx::{Executor, SqlitePool};

const ACCESS_MIGRATIONS: &[(&str, &str)] = &[
    (
        "20250705000001_create_memberships_table",
        include_str!("../../migrations_sqlite/access/20250705000001_create_memberships_table.sql"),
    ),
    (
        "20250705000002_create_invite_links_table",
        include_str!("../../migrations_sqlite/access/20250705000002_create_invite_links_table.sql"),
    ),
    (
        "20250705000003_create_role_change_log_table",
        include_str!(
            "../../migrations_sqlite/access/20250705000003_create_role_change_log_table.sql"
        ),
    ),
    (
        "20250705000004_create_member_join_log_table",
        include_str!(
            "../../migrations_sqlite/access/20250705000004_create_member_join_log_table.sql"
        ),
    ),
];

/// Runs all access-control migrations.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r"
        CREATE TABLE IF NOT EXISTS _parapet_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        ",
    )
    .await?;

    for (name, sql) in ACCESS_MIGRATIONS {
        let applied: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _parapet_migrations WHERE name = ?)")
                .bind(*name)
                .fetch_one(pool)
                .await?;

        if !applied {
            // SQLite executes one statement per call, so split on semicolons.
            // The bundled migrations keep semicolons out of string literals.
            for statement in sql.split(';') {
                let trimmed = statement.trim();
                if !trimmed.is_empty() {
                    pool.execute(trimmed).await?;
                }
            }

            sqlx::query("INSERT INTO _parapet_migrations (name) VALUES (?)")
                .bind(*name)
                .execute(pool)
                .await?;
        }
    }

    Ok(())
}
