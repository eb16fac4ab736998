//! Engine context: connection registry plus error log, owned by one caller.
//!
//! # Responsibility
//! - Build a registry from `EngineConfig` and hand out `Store` views.
//! - Expose the explicit begin/commit/rollback protocol per connection.
//!
//! # Invariants
//! - Only configuration and connect failures escape as `EngineError`;
//!   everything else lands in the `ErrorLog`.
//! - `Engine` is `Send` but not `Sync`; hosts use one engine per worker.

mod error_log;
mod store;

pub use error_log::{ErrorKind, ErrorLog, ErrorRecord};
pub use store::Store;

use crate::config::{ConfigError, EngineConfig};
use crate::db::{
    BeginOutcome, CommitOutcome, ConnectionRegistry, DbError, DbResult, Dialect, RollbackOutcome,
    TransactionStats, DEFAULT_CONNECTION,
};
use crate::logging::{init_logging, LoggingError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug)]
pub enum EngineError {
    /// Missing connection string, unsupported backend or invalid settings.
    Configuration(String),
    /// A configured connection could not be opened or bootstrapped.
    Connect(DbError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(details) => write!(f, "configuration error: {details}"),
            Self::Connect(err) => write!(f, "connection failed: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(_) => None,
            Self::Connect(err) => Some(err),
        }
    }
}

impl From<DbError> for EngineError {
    fn from(value: DbError) -> Self {
        if value.is_configuration() {
            Self::Configuration(value.to_string())
        } else {
            Self::Connect(value)
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}

impl From<LoggingError> for EngineError {
    fn from(value: LoggingError) -> Self {
        Self::Configuration(value.to_string())
    }
}

pub struct Engine {
    registry: ConnectionRegistry,
    errors: ErrorLog,
}

impl Engine {
    /// Builds an engine; connections open lazily on first use.
    ///
    /// Starts file logging when `config.log` is set.
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        if let Some(log) = &config.log {
            init_logging(log)?;
        }

        let mut registry = ConnectionRegistry::new(config.connect_settings());
        for (name, dsn) in &config.connections {
            registry.set_connection_string(name.as_str(), dsn.as_str());
        }
        info!(
            "event=engine_new module=engine status=ok connections={}",
            config.connections.len()
        );
        Ok(Self {
            registry,
            errors: ErrorLog::new(),
        })
    }

    /// Engine over a single in-memory SQLite `default` connection.
    pub fn in_memory() -> EngineResult<Self> {
        Self::new(&EngineConfig::in_memory())
    }

    /// Persistence operations on the `default` connection.
    pub fn store(&mut self) -> Store<'_> {
        self.store_on(DEFAULT_CONNECTION)
    }

    pub fn store_on(&mut self, name: &str) -> Store<'_> {
        Store::new(&mut self.registry, &mut self.errors, name)
    }

    pub fn set_connection_string(&mut self, name: &str, dsn: &str) {
        self.registry.set_connection_string(name, dsn);
    }

    /// Opens `name` if needed and returns its dialect.
    pub fn acquire(&mut self, name: &str) -> EngineResult<Dialect> {
        Ok(self.registry.acquire(name)?)
    }

    pub fn begin_transaction(&mut self, name: &str) -> DbResult<BeginOutcome> {
        self.registry.begin_transaction(name)
    }

    pub fn commit(&mut self, name: &str) -> DbResult<CommitOutcome> {
        self.registry.commit(name)
    }

    pub fn rollback(&mut self, name: &str) -> DbResult<RollbackOutcome> {
        self.registry.rollback(name)
    }

    pub fn depth(&self, name: &str) -> u32 {
        self.registry.depth(name)
    }

    pub fn stats(&self, name: &str) -> Option<TransactionStats> {
        self.registry.stats(name)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<ErrorRecord> {
        self.errors.drain()
    }

    /// Releases every connection; the next operation re-opens lazily.
    pub fn teardown(&mut self) {
        self.registry.teardown();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.registry.teardown();
    }
}
