//! Core persistence for the microthread board engine.
//! Named SQLite connections, nested transactions, a SQL builder, and
//! repositories for posts, families, taxonomy, meta, users and sessions.

pub mod codec;
pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;
pub mod text;

pub use codec::ConfidentialityCodec;
pub use config::{ConfigError, EngineConfig};
pub use db::{
    BeginOutcome, CommitOutcome, ConnectionRegistry, DbError, DbResult, Dialect, RollbackOutcome,
    DEFAULT_CONNECTION,
};
pub use engine::{Engine, EngineError, EngineResult, ErrorKind, ErrorLog, ErrorRecord, Store};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings};
pub use model::{MetaValue, Persistable, Post, Session, TaxonomyTerm, User};
pub use query::{Fields, Filter, RawFilter, SelectQuery, Statement};
pub use repo::{
    FamilyRepository, MetaRepository, PostRepository, SessionRepository, TaxonomyRepository,
    UserRepository, UserSaveStatus,
};
pub use service::{PostService, SaveStatus};
pub use text::{EscapingSanitizer, Sanitizer};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
