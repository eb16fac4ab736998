//! Connection bootstrap for parsed connection strings.
//!
//! # Responsibility
//! - Open file or in-memory SQLite handles from a `Dsn`.
//! - Configure pragmas and the busy timeout required by the engine.
//! - Apply schema migrations before a handle is handed to the registry.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Non-SQLite dialects are rejected; their SQL is rendered, never executed.

use super::migrations::apply_migrations;
use super::{DbError, DbResult, Dsn};
use log::{error, info};
use rusqlite::Connection;
use std::time::{Duration, Instant};

/// Bootstrap options applied to each newly opened handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectSettings {
    /// Upper bound for lock waits, mirroring a connection-attempt timeout.
    pub timeout: Duration,
    pub apply_migrations: bool,
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            apply_migrations: true,
        }
    }
}

/// Opens one connection for `name` described by `dsn`.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
///
/// # Errors
/// - `DbError::UnsupportedDialect` for non-SQLite targets.
/// - `DbError::Sqlite` / `DbError::UnsupportedSchemaVersion` from bootstrap.
pub fn open_connection(name: &str, dsn: &Dsn, settings: ConnectSettings) -> DbResult<Connection> {
    let started_at = Instant::now();
    let Some(path) = dsn.sqlite_path() else {
        error!(
            "event=db_open module=db status=error connection={} dialect={} error_code=unsupported_dialect",
            name,
            dsn.dialect.as_str()
        );
        return Err(DbError::UnsupportedDialect {
            name: name.to_string(),
            dialect: dsn.dialect,
        });
    };
    let mode = if dsn.is_memory() { "memory" } else { "file" };
    info!("event=db_open module=db status=start connection={name} mode={mode}");

    let opened = if dsn.is_memory() {
        Connection::open_in_memory()
    } else {
        Connection::open(path)
    };
    let mut conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error connection={} mode={} duration_ms={} error_code=db_open_failed error={}",
                name,
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, settings) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok connection={} mode={} duration_ms={}",
                name,
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error connection={} mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                name,
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, settings: ConnectSettings) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(settings.timeout)?;
    if settings.apply_migrations {
        apply_migrations(conn)?;
    }
    Ok(())
}
