//! Engine configuration.
//!
//! # Responsibility
//! - Describe named connection strings and bootstrap options.
//! - Load them from JSON files or strings.
//!
//! # Invariants
//! - A validated config has a positive connect timeout and non-empty names.

use crate::db::{ConnectSettings, DEFAULT_CONNECTION};
use crate::logging::LogSettings;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Logical name -> connection string (or alias of another name).
    pub connections: BTreeMap<String, String>,
    pub connect_timeout_secs: u64,
    pub apply_migrations: bool,
    pub log: Option<LogSettings>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connections: BTreeMap::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            apply_migrations: true,
            log: None,
        }
    }
}

impl EngineConfig {
    /// Config with a single in-memory SQLite `default` connection.
    pub fn in_memory() -> Self {
        Self::default().with_connection(DEFAULT_CONNECTION, "sqlite::memory:")
    }

    pub fn with_connection(mut self, name: impl Into<String>, dsn: impl Into<String>) -> Self {
        self.connections.insert(name.into(), dsn.into());
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_secs must be positive".to_string(),
            ));
        }
        if let Some(name) = self.connections.keys().find(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "connection name `{name}` is empty"
            )));
        }
        Ok(())
    }

    pub fn connect_settings(&self) -> ConnectSettings {
        ConnectSettings {
            timeout: Duration::from_secs(self.connect_timeout_secs),
            apply_migrations: self.apply_migrations,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "malformed config: {err}"),
            Self::Invalid(details) => write!(f, "invalid config: {details}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn missing_fields_take_defaults() {
        let config = EngineConfig::from_json_str(r#"{"connections":{"default":"sqlite::memory:"}}"#)
            .expect("config");
        assert_eq!(config.connect_timeout_secs, 5);
        assert!(config.apply_migrations);
        assert!(config.log.is_none());
        assert_eq!(config.connect_settings().timeout, Duration::from_secs(5));
    }

    #[test]
    fn parses_aliases_and_log_settings() {
        let raw = serde_json::json!({
            "connections": {
                "default": "board",
                "board": "sqlite:/tmp/board.db"
            },
            "connect_timeout_secs": 2,
            "log": { "level": "warn", "directory": "/tmp/microthread-logs" }
        })
        .to_string();
        let config = EngineConfig::from_json_str(&raw).expect("config");
        assert_eq!(config.connections["default"], "board");
        assert_eq!(config.log.expect("log").level, "warn");
    }

    #[test]
    fn rejects_zero_timeout_and_unknown_fields() {
        let err = EngineConfig::from_json_str(r#"{"connect_timeout_secs":0}"#).expect_err("zero");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_json_str(r#"{"cache":true}"#).expect_err("unknown");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"connections":{{"default":"sqlite::memory:"}}}}"#).expect("write");
        let config = EngineConfig::load(file.path()).expect("load");
        assert_eq!(config, EngineConfig::in_memory());

        let err = EngineConfig::load(file.path().with_extension("missing")).expect_err("io");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
