//! Connection string parsing.
//!
//! # Responsibility
//! - Split credentials out of `;`-separated DSN parameters.
//! - Expose the storage target for the SQLite driver.
//!
//! # Invariants
//! - Parsing never fails; unknown parameters are kept verbatim.

use super::Dialect;

const SQLITE_SCHEME: &str = "sqlite:";
const SQLITE_MEMORY: &str = ":memory:";

/// Parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    pub dialect: Dialect,
    /// Connection string with credential parameters removed.
    pub target: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Dsn {
    /// Parses a raw DSN, extracting `uid|user|username` and `pwd|pass|password`.
    pub fn parse(raw: &str) -> Self {
        let mut username = None;
        let mut password = None;
        let mut kept: Vec<String> = Vec::new();

        for part in raw.trim().split(';') {
            let Some((key, value)) = part.split_once('=') else {
                if !part.is_empty() {
                    kept.push(part.to_string());
                }
                continue;
            };

            match key.trim() {
                "uid" | "user" | "username" => username = Some(value.trim().to_string()),
                "pwd" | "pass" | "password" => password = Some(value.trim().to_string()),
                _ => kept.push(part.to_string()),
            }
        }

        let target = kept.join(";");
        Self {
            dialect: Dialect::from_connection_string(&target),
            target,
            username,
            password,
        }
    }

    /// Returns the database path for SQLite targets.
    ///
    /// `sqlite::memory:` (or an empty path) maps to `:memory:`.
    pub fn sqlite_path(&self) -> Option<&str> {
        if self.dialect != Dialect::Sqlite {
            return None;
        }
        let path = self
            .target
            .strip_prefix(SQLITE_SCHEME)
            .unwrap_or(self.target.as_str())
            .trim();
        let path = path.strip_prefix("//").unwrap_or(path);
        if path.is_empty() {
            Some(SQLITE_MEMORY)
        } else {
            Some(path)
        }
    }

    pub fn is_memory(&self) -> bool {
        self.sqlite_path() == Some(SQLITE_MEMORY)
    }
}

/// A configured value without `:` refers to another named connection string.
pub fn is_alias(raw: &str) -> bool {
    !raw.contains(':')
}

#[cfg(test)]
mod tests {
    use super::{is_alias, Dsn};
    use crate::db::Dialect;

    #[test]
    fn extracts_credentials_and_keeps_other_parameters() {
        let dsn = Dsn::parse("mysql:host=localhost;dbname=board;user=admin;password=s3cret");
        assert_eq!(dsn.dialect, Dialect::MySql);
        assert_eq!(dsn.target, "mysql:host=localhost;dbname=board");
        assert_eq!(dsn.username.as_deref(), Some("admin"));
        assert_eq!(dsn.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn sqlite_paths_resolve_memory_and_files() {
        assert!(Dsn::parse("sqlite::memory:").is_memory());
        assert!(Dsn::parse("sqlite:").is_memory());
        assert_eq!(
            Dsn::parse("sqlite:/var/data/board.db").sqlite_path(),
            Some("/var/data/board.db")
        );
        assert_eq!(Dsn::parse("mysql:host=db").sqlite_path(), None);
    }

    #[test]
    fn values_without_scheme_are_aliases() {
        assert!(is_alias("board_database"));
        assert!(!is_alias("sqlite::memory:"));
    }
}
