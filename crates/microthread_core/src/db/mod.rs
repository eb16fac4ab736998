//! Storage bootstrap, dialect detection and connection registry.
//!
//! # Responsibility
//! - Parse connection strings and infer the SQL dialect once per connection.
//! - Open and configure live handles, applying schema migrations.
//! - Own named connections and their transaction depth counters.
//!
//! # Invariants
//! - Live handles never leave this crate.
//! - Transaction depth only moves through begin/commit/rollback.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod dialect;
pub mod dsn;
pub mod migrations;
mod open;
pub mod registry;

pub use dialect::Dialect;
pub use dsn::Dsn;
pub use open::{open_connection, ConnectSettings};
pub use registry::{
    BeginOutcome, CommitOutcome, ConnectionRegistry, RollbackOutcome, TransactionStats,
    DEFAULT_CONNECTION,
};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// Driver-level failure reported by SQLite.
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// No connection string is registered under this name.
    MissingConnectionString(String),
    /// A connection string names a backend this build cannot open.
    UnsupportedDialect { name: String, dialect: Dialect },
    /// An inner rollback already aborted the transaction open on this connection.
    TransactionAborted(String),
}

impl DbError {
    /// Returns whether this error comes from configuration rather than the store.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingConnectionString(_) | Self::UnsupportedDialect { .. }
        )
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::MissingConnectionString(name) => {
                write!(f, "connection string not found for `{name}`")
            }
            Self::UnsupportedDialect { name, dialect } => write!(
                f,
                "connection `{name}` uses dialect `{}` which has no driver in this build",
                dialect.as_str()
            ),
            Self::TransactionAborted(name) => write!(
                f,
                "transaction on `{name}` was aborted by an inner rollback"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::MissingConnectionString(_) => None,
            Self::UnsupportedDialect { .. } => None,
            Self::TransactionAborted(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
