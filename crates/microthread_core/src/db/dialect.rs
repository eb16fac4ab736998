//! SQL dialect detection and per-dialect statement strategy.

use serde::{Deserialize, Serialize};

/// SQL variant spoken by one connection.
///
/// Resolved once when a connection is opened; every dialect-specific rendering
/// dispatches on this enum instead of comparing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
    /// Anything else; rendered with the MySQL-compatible forms.
    Other,
}

impl Dialect {
    /// Infers the dialect from the leading scheme of a connection string.
    pub fn from_connection_string(dsn: &str) -> Self {
        let dsn = dsn.trim_start();
        if dsn.starts_with("mysql") {
            Self::MySql
        } else if dsn.starts_with("postgres") {
            Self::Postgres
        } else if dsn.starts_with("sqlite") {
            Self::Sqlite
        } else {
            Self::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Other => "other",
        }
    }

    /// Statement that physically opens a transaction.
    pub fn begin_sql(self) -> &'static str {
        match self {
            // Take the write lock up front so nested writers never deadlock on upgrade.
            Self::Sqlite => "BEGIN IMMEDIATE;",
            Self::MySql => "START TRANSACTION;",
            Self::Postgres | Self::Other => "BEGIN;",
        }
    }

    /// Whether last-inserted-id retrieval must go through the `id` sequence.
    pub fn uses_sequence_for_last_id(self) -> bool {
        matches!(self, Self::Postgres)
    }

    /// Row locator used to cap `DELETE` statements, or `None` when the dialect
    /// accepts `DELETE ... LIMIT n` directly.
    pub fn delete_row_locator(self) -> Option<&'static str> {
        match self {
            Self::Sqlite => Some("rowid"),
            Self::Postgres => Some("ctid"),
            Self::MySql | Self::Other => None,
        }
    }
}
