//! Named connection registry with reentrant transaction depth.
//!
//! # Responsibility
//! - Open connections lazily on first use per logical name.
//! - Count logical transaction nesting and issue physical BEGIN/COMMIT/ROLLBACK
//!   only at the outermost level.
//!
//! # Invariants
//! - `depth` never goes negative; commit at depth 0 is a no-op.
//! - Rollback never nests: it always aborts the whole outer transaction.
//! - Enclosing levels unwound by a rollback cannot begin again; each one is
//!   closed by its own commit (`Aborted`) or rollback before work resumes.
//! - After `teardown` no handle is live; the next `acquire` re-opens.

use super::dsn::is_alias;
use super::{open_connection, ConnectSettings, DbError, DbResult, Dialect, Dsn};
use log::{debug, info, warn};
use rusqlite::Connection;
use std::collections::{BTreeMap, HashMap};

/// Connection name used when callers do not pick one.
pub const DEFAULT_CONNECTION: &str = "default";

/// Result of a logical begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Depth moved 0 -> 1 and a physical transaction was opened.
    Started,
    /// Joined an already open transaction at the given depth.
    Nested(u32),
}

/// Result of a logical commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Depth moved 1 -> 0 and the physical transaction was committed.
    Committed,
    /// Inner level closed; the outer transaction stays open at this depth.
    Deferred(u32),
    /// An inner rollback already aborted this transaction; nothing was committed.
    Aborted,
    /// No transaction was open.
    NoOp,
}

/// Result of a rollback; driver failures are reported through `DbResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    RolledBack,
    NoOp,
}

/// Physical transaction statements issued on one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub begins: u32,
    pub commits: u32,
    pub rollbacks: u32,
}

struct ConnectionEntry {
    conn: Connection,
    dialect: Dialect,
    depth: u32,
    /// Enclosing logical levels still open after a rollback reset `depth`.
    aborted: u32,
    stats: TransactionStats,
}

/// Owner of every live connection of one engine.
pub struct ConnectionRegistry {
    connection_strings: BTreeMap<String, String>,
    settings: ConnectSettings,
    entries: HashMap<String, ConnectionEntry>,
    opened: u64,
}

impl ConnectionRegistry {
    pub fn new(settings: ConnectSettings) -> Self {
        Self {
            connection_strings: BTreeMap::new(),
            settings,
            entries: HashMap::new(),
            opened: 0,
        }
    }

    /// Registers (or replaces) the connection string for `name`.
    ///
    /// An already open connection keeps running until `teardown`.
    pub fn set_connection_string(&mut self, name: impl Into<String>, dsn: impl Into<String>) {
        self.connection_strings.insert(name.into(), dsn.into());
    }

    /// Ensures a live connection for `name` and returns its dialect.
    ///
    /// # Errors
    /// - `DbError::MissingConnectionString` when nothing is registered for `name`.
    /// - `DbError::UnsupportedDialect` / `DbError::Sqlite` when opening fails.
    pub fn acquire(&mut self, name: &str) -> DbResult<Dialect> {
        self.entry(name).map(|entry| entry.dialect)
    }

    /// Live handle and dialect for `name`, opening it when needed.
    pub(crate) fn connection(&mut self, name: &str) -> DbResult<(&Connection, Dialect)> {
        let entry = self.entry(name)?;
        Ok((&entry.conn, entry.dialect))
    }

    /// Dialect of an already open connection.
    pub fn dialect(&self, name: &str) -> Option<Dialect> {
        self.entries.get(name).map(|entry| entry.dialect)
    }

    /// Current logical transaction depth (0 when not open).
    pub fn depth(&self, name: &str) -> u32 {
        self.entries.get(name).map_or(0, |entry| entry.depth)
    }

    pub fn stats(&self, name: &str) -> Option<TransactionStats> {
        self.entries.get(name).map(|entry| entry.stats)
    }

    /// Whether a rollback unwound levels that have not been closed yet.
    pub fn is_aborted(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|entry| entry.aborted > 0)
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of physical connections opened over the registry lifetime.
    pub fn opened_connections(&self) -> u64 {
        self.opened
    }

    /// Increments depth; opens a physical transaction only on 0 -> 1.
    pub fn begin_transaction(&mut self, name: &str) -> DbResult<BeginOutcome> {
        let entry = self.entry(name)?;
        if entry.aborted > 0 {
            warn!(
                "event=tx_begin module=registry status=error connection={} error_code=aborted pending={}",
                name, entry.aborted
            );
            return Err(DbError::TransactionAborted(name.to_string()));
        }
        entry.depth += 1;
        if entry.depth > 1 {
            debug!(
                "event=tx_begin module=registry status=nested connection={} depth={}",
                name, entry.depth
            );
            return Ok(BeginOutcome::Nested(entry.depth));
        }

        if let Err(err) = entry.conn.execute_batch(entry.dialect.begin_sql()) {
            entry.depth = 0;
            warn!("event=tx_begin module=registry status=error connection={name} error={err}");
            return Err(err.into());
        }
        entry.stats.begins += 1;
        debug!("event=tx_begin module=registry status=ok connection={name} depth=1");
        Ok(BeginOutcome::Started)
    }

    /// Decrements depth; commits physically only on 1 -> 0.
    ///
    /// A failed physical commit leaves depth at 1 so a following rollback
    /// still aborts the open transaction.
    pub fn commit(&mut self, name: &str) -> DbResult<CommitOutcome> {
        let Some(entry) = self.entries.get_mut(name) else {
            return Ok(CommitOutcome::NoOp);
        };

        match entry.depth {
            0 if entry.aborted > 0 => {
                entry.aborted -= 1;
                warn!(
                    "event=tx_commit module=registry status=aborted connection={} pending={}",
                    name, entry.aborted
                );
                Ok(CommitOutcome::Aborted)
            }
            0 => {
                warn!("event=tx_commit module=registry status=noop connection={name} depth=0");
                Ok(CommitOutcome::NoOp)
            }
            1 => {
                entry.depth = 0;
                if let Err(err) = entry.conn.execute_batch("COMMIT;") {
                    entry.depth = 1;
                    warn!(
                        "event=tx_commit module=registry status=error connection={name} error={err}"
                    );
                    return Err(err.into());
                }
                entry.stats.commits += 1;
                debug!("event=tx_commit module=registry status=ok connection={name} depth=0");
                Ok(CommitOutcome::Committed)
            }
            _ => {
                entry.depth -= 1;
                debug!(
                    "event=tx_commit module=registry status=deferred connection={} depth={}",
                    name, entry.depth
                );
                Ok(CommitOutcome::Deferred(entry.depth))
            }
        }
    }

    /// Forces depth to 0 and rolls back physically if a transaction was open.
    ///
    /// Enclosing levels are left pending; at depth 0 a rollback closes one of them.
    pub fn rollback(&mut self, name: &str) -> DbResult<RollbackOutcome> {
        let Some(entry) = self.entries.get_mut(name) else {
            return Ok(RollbackOutcome::NoOp);
        };

        let previous_depth = entry.depth;
        if previous_depth == 0 {
            entry.aborted = entry.aborted.saturating_sub(1);
            return Ok(RollbackOutcome::NoOp);
        }
        entry.depth = 0;
        entry.aborted = previous_depth - 1;

        // SQLite aborts the transaction by itself on some failures (busy, I/O).
        if entry.conn.is_autocommit() {
            entry.stats.rollbacks += 1;
            warn!(
                "event=tx_rollback module=registry status=ok connection={name} depth={previous_depth} detail=already_aborted"
            );
            return Ok(RollbackOutcome::RolledBack);
        }

        entry.conn.execute_batch("ROLLBACK;")?;
        entry.stats.rollbacks += 1;
        warn!(
            "event=tx_rollback module=registry status=ok connection={name} depth={previous_depth}"
        );
        Ok(RollbackOutcome::RolledBack)
    }

    /// Releases every handle and clears the registry.
    pub fn teardown(&mut self) {
        let released = self.entries.len();
        for (name, entry) in self.entries.drain() {
            if entry.depth > 0 {
                warn!(
                    "event=teardown module=registry status=abandoned_tx connection={} depth={}",
                    name, entry.depth
                );
                if !entry.conn.is_autocommit() {
                    if let Err(err) = entry.conn.execute_batch("ROLLBACK;") {
                        warn!(
                            "event=teardown module=registry status=error connection={name} error={err}"
                        );
                    }
                }
            }
        }
        info!("event=teardown module=registry status=ok released={released}");
    }

    fn entry(&mut self, name: &str) -> DbResult<&mut ConnectionEntry> {
        if !self.entries.contains_key(name) {
            let raw = self.resolve_connection_string(name)?;
            let dsn = Dsn::parse(&raw);
            let conn = open_connection(name, &dsn, self.settings)?;
            self.opened += 1;
            self.entries.insert(
                name.to_string(),
                ConnectionEntry {
                    conn,
                    dialect: dsn.dialect,
                    depth: 0,
                    aborted: 0,
                    stats: TransactionStats::default(),
                },
            );
        }

        self.entries
            .get_mut(name)
            .ok_or_else(|| DbError::MissingConnectionString(name.to_string()))
    }

    fn resolve_connection_string(&self, name: &str) -> DbResult<String> {
        let missing = || DbError::MissingConnectionString(name.to_string());
        let raw = self.connection_strings.get(name).ok_or_else(missing)?;
        if !is_alias(raw) {
            return Ok(raw.clone());
        }

        // One level of indirection: `"default": "board"` points at `"board"`.
        self.connection_strings
            .get(raw.trim())
            .filter(|target| !is_alias(target))
            .cloned()
            .ok_or_else(missing)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(ConnectSettings::default())
    }
}
