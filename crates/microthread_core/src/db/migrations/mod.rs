//! SQLite schema migrations for the board store.
//!
//! # Responsibility
//! - `content` (v1): posts with their family edges, taxonomy terms, meta
//!   pairs and author links (`posts`, `posts_family`, `taxonomy`,
//!   `posts_taxonomy`, `meta`, `posts_meta`, `users`, `posts_users`).
//! - `sessions` (v2): the encrypted session table used by the session
//!   repository.
//! - Apply everything past the stored version in one transaction.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    tables: &'static [&'static str],
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "content",
        tables: &[
            "posts",
            "posts_family",
            "taxonomy",
            "posts_taxonomy",
            "meta",
            "posts_meta",
            "users",
            "posts_users",
        ],
        sql: include_str!("0001_content.sql"),
    },
    Migration {
        version: 2,
        name: "sessions",
        tables: &["sessions"],
        sql: include_str!("0002_sessions.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Every table the known migrations create, in creation order.
pub fn schema_tables() -> Vec<&'static str> {
    MIGRATIONS
        .iter()
        .flat_map(|migration| migration.tables.iter().copied())
        .collect()
}

/// Applies pending migrations and returns the versions it ran.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<Vec<u32>> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    let pending = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current_version)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    for migration in &pending {
        info!(
            "event=migration_apply module=migrations status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    Ok(pending.iter().map(|migration| migration.version).collect())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
