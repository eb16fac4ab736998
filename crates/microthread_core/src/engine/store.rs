//! Persistence operations over one named connection.
//!
//! # Responsibility
//! - Execute builder statements and translate driver failures into
//!   zero/empty results plus `ErrorLog` records.
//! - Wrap batched work in the nested transaction protocol.
//!
//! # Invariants
//! - Batched operations are all-or-nothing.
//! - `delete` is always capped; `edit` always targets one id.

use super::error_log::ErrorLog;
use super::EngineResult;
use crate::db::{CommitOutcome, ConnectionRegistry, Dialect};
use crate::model::{now_millis, Persistable};
use crate::query::{
    delete_statement, filter_identifier, in_clause, insert_statement, update_statement, Fields,
    Statement,
};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

/// Borrowed view of an engine bound to one connection name.
pub struct Store<'e> {
    registry: &'e mut ConnectionRegistry,
    errors: &'e mut ErrorLog,
    name: String,
}

impl<'e> Store<'e> {
    pub(crate) fn new(
        registry: &'e mut ConnectionRegistry,
        errors: &'e mut ErrorLog,
        name: &str,
    ) -> Self {
        Self {
            registry,
            errors,
            name: name.to_string(),
        }
    }

    /// Shorter-lived view over the same connection, for nested repositories.
    pub fn reborrow(&mut self) -> Store<'_> {
        Store {
            registry: &mut *self.registry,
            errors: &mut *self.errors,
            name: self.name.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialect(&mut self) -> EngineResult<Dialect> {
        Ok(self.registry.acquire(&self.name)?)
    }

    pub fn errors(&self) -> &ErrorLog {
        self.errors
    }

    /// Records an input rejection without touching the database.
    pub(crate) fn reject(&mut self, context: &str, message: impl Into<String>) {
        self.errors.constraint(context, message);
    }

    /// Runs `work` on the live handle; driver errors become `Ok(None)`.
    ///
    /// Refused while an inner rollback has left enclosing levels pending.
    pub(crate) fn run<T>(
        &mut self,
        context: &str,
        work: impl FnOnce(&Connection, Dialect) -> rusqlite::Result<T>,
    ) -> EngineResult<Option<T>> {
        if self.registry.is_aborted(&self.name) {
            self.reject(context, "transaction was aborted by an inner rollback");
            return Ok(None);
        }
        let (conn, dialect) = self.registry.connection(&self.name)?;
        match work(conn, dialect) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.errors.driver(context, &err);
                Ok(None)
            }
        }
    }

    /// Runs `work` between a logical begin and commit.
    ///
    /// `Ok(None)` from `work`, or a failed commit, rolls back the whole outer
    /// transaction. A level whose transaction an inner rollback already aborted
    /// yields `Ok(None)` as well.
    pub fn transaction<T>(
        &mut self,
        context: &str,
        work: impl FnOnce(&mut Store<'_>) -> EngineResult<Option<T>>,
    ) -> EngineResult<Option<T>> {
        self.registry.acquire(&self.name)?;
        if let Err(err) = self.registry.begin_transaction(&self.name) {
            self.errors.driver(context, &err);
            return Ok(None);
        }

        match work(self) {
            Ok(Some(value)) => match self.registry.commit(&self.name) {
                Ok(CommitOutcome::Committed | CommitOutcome::Deferred(_)) => Ok(Some(value)),
                Ok(CommitOutcome::Aborted | CommitOutcome::NoOp) => {
                    self.reject(context, "transaction was aborted by an inner rollback");
                    Ok(None)
                }
                Err(err) => {
                    self.errors.driver(context, &err);
                    self.abort(context);
                    Ok(None)
                }
            },
            Ok(None) => {
                self.abort(context);
                Ok(None)
            }
            Err(err) => {
                self.abort(context);
                Err(err)
            }
        }
    }

    fn abort(&mut self, context: &str) {
        if let Err(err) = self.registry.rollback(&self.name) {
            self.errors.driver(context, &err);
        }
    }

    /// Rows of `statement` mapped by `map_row`; empty on driver failure.
    pub fn find<T>(
        &mut self,
        statement: &Statement,
        mut map_row: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> EngineResult<Vec<T>> {
        let rows = self.run("find", |conn, _| {
            let mut stmt = conn.prepare_cached(statement.sql())?;
            let rows = stmt.query_map(statement.bindings().as_slice(), |row| map_row(row))?;
            rows.collect::<rusqlite::Result<Vec<T>>>()
        })?;
        Ok(rows.unwrap_or_default())
    }

    pub fn find_one<T>(
        &mut self,
        statement: &Statement,
        mut map_row: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> EngineResult<Option<T>> {
        let row = self.run("find_one", |conn, _| {
            let mut stmt = conn.prepare_cached(statement.sql())?;
            let mut rows = stmt.query(statement.bindings().as_slice())?;
            let Some(row) = rows.next()? else {
                return Ok(None);
            };
            map_row(row).map(Some)
        })?;
        Ok(row.flatten())
    }

    /// Inserts one row and returns its id, or `0` on failure.
    ///
    /// A pre-supplied integer `id` is returned as is.
    pub fn put(&mut self, table: &str, fields: &Fields) -> EngineResult<i64> {
        if fields.is_empty() {
            self.reject(&format!("put:{table}"), "no columns to insert");
            return Ok(0);
        }
        let statement = insert_statement(table, fields);
        let supplied = match fields.get("id") {
            Some(Value::Integer(id)) if *id > 0 => Some(*id),
            _ => None,
        };

        let id = self.run(&format!("put:{table}"), |conn, dialect| {
            let mut stmt = conn.prepare_cached(statement.sql())?;
            stmt.execute(statement.bindings().as_slice())?;
            match supplied {
                Some(id) => Ok(id),
                None => last_insert_id(conn, dialect),
            }
        })?;
        Ok(id.unwrap_or(0))
    }

    /// Inserts one row without reading back a key.
    pub fn put_no_key(&mut self, table: &str, fields: &Fields) -> EngineResult<bool> {
        if fields.is_empty() {
            self.reject(&format!("put:{table}"), "no columns to insert");
            return Ok(false);
        }
        let statement = insert_statement(table, fields);
        let inserted = self.run(&format!("put:{table}"), |conn, _| {
            conn.prepare_cached(statement.sql())?
                .execute(statement.bindings().as_slice())
        })?;
        Ok(inserted.is_some())
    }

    /// Inserts every row in one transaction; empty when any insert fails.
    pub fn put_all(&mut self, table: &str, rows: &[Fields]) -> EngineResult<Vec<i64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids = self.transaction(&format!("put_all:{table}"), |store| {
            let mut ids = Vec::with_capacity(rows.len());
            for row in rows {
                let id = store.put(table, row)?;
                if id == 0 {
                    return Ok(None);
                }
                ids.push(id);
            }
            Ok(Some(ids))
        })?;
        Ok(ids.unwrap_or_default())
    }

    /// Updates the row named by `fields["id"]`; returns affected rows.
    pub fn edit(&mut self, table: &str, fields: &Fields) -> EngineResult<usize> {
        let context = format!("edit:{table}");
        let mut assignments = fields.clone();
        let id = match assignments.remove("id") {
            Some(Value::Integer(id)) if id > 0 => id,
            _ => {
                self.reject(&context, "edit requires a positive id");
                return Ok(0);
            }
        };
        if assignments.is_empty() {
            self.reject(&context, "no columns to update");
            return Ok(0);
        }

        let table_name = filter_identifier(table);
        let condition = format!("{table_name}.id = :id");
        let mut statement = update_statement(table, &assignments, Some(&condition));
        statement.push_param("id", id);
        self.execute_as(&context, &statement)
    }

    /// Capped delete of rows matching every criteria column.
    ///
    /// Caps at one row unless `limit` is a valid 1..=999 number.
    pub fn delete(
        &mut self,
        table: &str,
        criteria: &Fields,
        limit: Option<&str>,
    ) -> EngineResult<usize> {
        let context = format!("delete:{table}");
        if criteria.is_empty() {
            self.reject(&context, "delete requires criteria");
            return Ok(0);
        }
        let dialect = self.dialect()?;
        let statement = delete_statement(dialect, table, criteria, limit);
        self.execute_as(&context, &statement)
    }

    /// Deletes rows by id; affects at most `ids.len()` rows.
    pub fn delete_by_id(&mut self, table: &str, ids: &[i64]) -> EngineResult<usize> {
        let context = format!("delete:{table}");
        let mut unique: Vec<i64> = ids.iter().copied().filter(|id| *id > 0).collect();
        unique.sort_unstable();
        unique.dedup();
        if unique.is_empty() {
            self.reject(&context, "delete requires at least one positive id");
            return Ok(0);
        }

        let values = unique.into_iter().map(Value::Integer).collect::<Vec<_>>();
        let (placeholders, params) = in_clause("v", &values);
        let table = filter_identifier(table);
        let mut statement = Statement::new(format!(
            "DELETE FROM {table} WHERE id IN ( {placeholders} );"
        ));
        statement.extend_params(params);
        self.execute_as(&context, &statement)
    }

    /// Executes one statement; returns affected rows (`0` on failure).
    pub fn execute(&mut self, statement: &Statement) -> EngineResult<usize> {
        self.execute_as("execute", statement)
    }

    fn execute_as(&mut self, context: &str, statement: &Statement) -> EngineResult<usize> {
        Ok(self.try_execute(context, statement)?.unwrap_or(0))
    }

    /// Like `execute`, but tells a driver failure (`None`) apart from zero rows.
    pub(crate) fn try_execute(
        &mut self,
        context: &str,
        statement: &Statement,
    ) -> EngineResult<Option<usize>> {
        self.run(context, |conn, _| {
            conn.prepare_cached(statement.sql())?
                .execute(statement.bindings().as_slice())
        })
    }

    /// One statement, many bindings, one transaction.
    pub fn execute_all(&mut self, sql: &str, param_sets: &[Fields]) -> EngineResult<Vec<usize>> {
        if param_sets.is_empty() {
            return Ok(Vec::new());
        }
        let counts = self.transaction("execute_all", |store| {
            store.run("execute_all", |conn, _| {
                let mut stmt = conn.prepare_cached(sql)?;
                let mut counts = Vec::with_capacity(param_sets.len());
                for fields in param_sets {
                    let bound = Statement::with_fields(sql, fields);
                    counts.push(stmt.execute(bound.bindings().as_slice())?);
                }
                Ok(counts)
            })
        })?;
        Ok(counts.unwrap_or_default())
    }

    /// Heterogeneous statements, one transaction, all-or-nothing.
    pub fn execute_multiple(&mut self, statements: &[Statement]) -> EngineResult<Vec<usize>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }
        let counts = self.transaction("execute_multiple", |store| {
            store.run("execute_multiple", |conn, _| {
                let mut counts = Vec::with_capacity(statements.len());
                for statement in statements {
                    let affected = conn
                        .prepare_cached(statement.sql())?
                        .execute(statement.bindings().as_slice())?;
                    counts.push(affected);
                }
                Ok(counts)
            })
        })?;
        Ok(counts.unwrap_or_default())
    }

    /// Edits `entity` when it has an id, otherwise inserts it and records the
    /// new id. Returns the id, or `0` on failure.
    pub fn save<P: Persistable>(&mut self, entity: &mut P) -> EngineResult<i64> {
        let now = now_millis();
        let mut fields = entity.to_fields();
        fields.set("updated_at", now);

        if let Some(id) = entity.entry().id.filter(|id| *id > 0) {
            fields.set("id", id);
            if self.edit(P::TABLE, &fields)? == 0 {
                return Ok(0);
            }
            entity.entry_mut().updated_at = now;
            return Ok(id);
        }

        fields.set("created_at", now);
        let id = self.put(P::TABLE, &fields)?;
        if id > 0 {
            let entry = entity.entry_mut();
            entry.id = Some(id);
            entry.created_at = now;
            entry.updated_at = now;
        }
        Ok(id)
    }
}

fn last_insert_id(conn: &Connection, dialect: Dialect) -> rusqlite::Result<i64> {
    if dialect.uses_sequence_for_last_id() {
        return conn.query_row("SELECT lastval();", [], |row| row.get(0));
    }
    Ok(conn.last_insert_rowid())
}
