//! Statement builder for the fixed select/insert/update/delete shapes.
//!
//! # Responsibility
//! - Render statement text with `:column` placeholders from a field descriptor.
//! - Render dialect-specific aggregate columns and capped deletes.
//!
//! # Invariants
//! - Identifiers pass through `filter_identifier` before reaching SQL text.
//! - Values are only ever bound, never concatenated into SQL text.

use super::filter::check_limit;
use crate::db::Dialect;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{ToSql, Value};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z_.]").expect("valid identifier regex"));

/// Strips everything except ASCII letters, `_` and `.` from an identifier.
pub fn filter_identifier(raw: &str) -> String {
    IDENTIFIER_RE.replace_all(raw.trim(), "").into_owned()
}

/// Column name for `Fields`: filtered, with any `table.` qualifier dropped.
fn column_name(raw: &str) -> String {
    let column = filter_identifier(raw);
    match column.rsplit_once('.') {
        Some((_, name)) => name.to_string(),
        None => column,
    }
}

/// Ordered column -> value descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Value)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Fields::set`].
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a column value, replacing an earlier value for the same column.
    ///
    /// `posts.raw` is stored as `raw`. Columns that filter down to an empty
    /// identifier are ignored.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        let column = column_name(column);
        if column.is_empty() {
            return;
        }
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        let column = column_name(column);
        self.entries
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let column = column_name(column);
        let index = self.entries.iter().position(|(name, _)| *name == column)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// SQL text plus its placeholder bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<(String, Value)>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Binds `value` to `:name` (the leading `:` is optional).
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.push_param(name, value);
        self
    }

    pub fn push_param(&mut self, name: &str, value: impl Into<Value>) {
        let name = placeholder(name);
        let value = value.into();
        match self.params.iter_mut().find(|(current, _)| *current == name) {
            Some(entry) => entry.1 = value,
            None => self.params.push((name, value)),
        }
    }

    pub fn extend_params(&mut self, params: impl IntoIterator<Item = (String, Value)>) {
        for (name, value) in params {
            self.push_param(&name, value);
        }
    }

    /// Binds every column of `fields` to its `:column` placeholder.
    pub fn with_fields(sql: impl Into<String>, fields: &Fields) -> Self {
        let mut statement = Self::new(sql);
        for (column, value) in fields.iter() {
            statement.push_param(column, value.clone());
        }
        statement
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        let name = placeholder(name);
        self.params
            .iter()
            .find(|(current, _)| *current == name)
            .map(|(_, value)| value)
    }

    /// Borrowed `(name, value)` pairs in the shape rusqlite binds by name.
    pub(crate) fn bindings(&self) -> Vec<(&str, &dyn ToSql)> {
        self.params
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect()
    }
}

fn placeholder(name: &str) -> String {
    let name = name
        .trim()
        .trim_start_matches(':')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>();
    format!(":{name}")
}

/// Statement shape for [`set_params`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Select,
    Insert,
    Update,
    Delete,
}

/// Renders the column list of `fields` for one statement shape.
///
/// - select: `a, b`
/// - insert: `:a, :b`
/// - update: `a = :a, b = :b`
/// - delete: `a = :a AND b = :b`
pub fn set_params(fields: &Fields, mode: Mode) -> String {
    let columns = fields.columns();
    match mode {
        Mode::Select => columns.collect::<Vec<_>>().join(", "),
        Mode::Insert => columns
            .map(|column| format!(":{column}"))
            .collect::<Vec<_>>()
            .join(", "),
        Mode::Update => columns
            .map(|column| format!("{column} = :{column}"))
            .collect::<Vec<_>>()
            .join(", "),
        Mode::Delete => columns
            .map(|column| format!("{column} = :{column}"))
            .collect::<Vec<_>>()
            .join(" AND "),
    }
}

/// `INSERT INTO table ( a, b ) VALUES ( :a, :b );`
pub fn insert_statement(table: &str, fields: &Fields) -> Statement {
    let table = filter_identifier(table);
    let columns = set_params(fields, Mode::Select);
    let values = set_params(fields, Mode::Insert);
    Statement::with_fields(
        format!("INSERT INTO {table} ( {columns} ) VALUES ( {values} );"),
        fields,
    )
}

/// `UPDATE table SET a = :a WHERE condition;`
///
/// `condition` is engine-authored SQL; its placeholders are bound by the caller.
pub fn update_statement(table: &str, fields: &Fields, condition: Option<&str>) -> Statement {
    let table = filter_identifier(table);
    let assignments = set_params(fields, Mode::Update);
    let mut sql = format!("UPDATE {table} SET {assignments}");
    if let Some(condition) = condition.filter(|value| !value.trim().is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(condition);
    }
    sql.push(';');
    Statement::with_fields(sql, fields)
}

/// Capped `DELETE` matching every criteria column.
///
/// A missing or malformed `limit` caps the statement at one row.
pub fn delete_statement(
    dialect: Dialect,
    table: &str,
    criteria: &Fields,
    limit: Option<&str>,
) -> Statement {
    let table = filter_identifier(table);
    let conditions = set_params(criteria, Mode::Delete);
    let limit = limit
        .filter(|value| check_limit(value))
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(1);

    let sql = match dialect.delete_row_locator() {
        Some(locator) => format!(
            "DELETE FROM {table} WHERE {locator} IN ( SELECT {locator} FROM {table} WHERE ( {conditions} ) LIMIT {limit} );"
        ),
        None => format!("DELETE FROM {table} WHERE ( {conditions} ) LIMIT {limit};"),
    };
    Statement::with_fields(sql, criteria)
}

/// Placeholder list for `IN ( ... )` plus the bindings it needs.
///
/// `in_clause("v", [a, b])` renders `:v0, :v1`.
pub fn in_clause(prefix: &str, values: &[Value]) -> (String, Vec<(String, Value)>) {
    let prefix = filter_identifier(prefix);
    let mut placeholders = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len());
    for (index, value) in values.iter().enumerate() {
        placeholders.push(format!(":{prefix}{index}"));
        params.push((format!(":{prefix}{index}"), value.clone()));
    }
    (placeholders.join(", "), params)
}

/// Composite column aggregating `columns` of `table` as `c1,c2|c1,c2`.
pub fn aggregate_field(dialect: Dialect, table: &str, output: &str, columns: &[&str]) -> String {
    let table = filter_identifier(table);
    let output = filter_identifier(output);
    let qualified = columns
        .iter()
        .map(|column| format!("{table}.{}", filter_identifier(column)))
        .collect::<Vec<_>>();

    match dialect {
        Dialect::Sqlite => format!(
            "GROUP_CONCAT({}, '|') AS {output}",
            qualified.join("||','||")
        ),
        Dialect::Postgres => format!(
            "ARRAY_TO_STRING(ARRAY_AGG(CONCAT({})), '|') AS {output}",
            qualified.join(",',',")
        ),
        Dialect::MySql | Dialect::Other => format!(
            "GROUP_CONCAT(CONCAT({}) SEPARATOR '|') AS {output}",
            qualified.join(",',',")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        aggregate_field, delete_statement, filter_identifier, in_clause, insert_statement,
        set_params, update_statement, Fields, Mode, Statement,
    };
    use crate::db::Dialect;
    use rusqlite::types::Value;

    fn post_fields() -> Fields {
        Fields::new()
            .with("title", "Hello".to_string())
            .with("status", 0)
    }

    #[test]
    fn identifier_filter_strips_everything_but_letters_underscore_and_dot() {
        assert_eq!(filter_identifier("posts.id; DROP TABLE x--"), "posts.idDROPTABLEx");
        assert_eq!(filter_identifier(" parent_id "), "parent_id");
        assert_eq!(filter_identifier("123"), "");
    }

    #[test]
    fn fields_replace_duplicates_and_ignore_empty_identifiers() {
        let mut fields = post_fields();
        fields.set("title", "Changed".to_string());
        fields.set("42", 1);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("title"), Some(&Value::Text("Changed".to_string())));
    }

    #[test]
    fn qualified_columns_render_matching_placeholders() {
        let fields = Fields::new()
            .with("posts.raw", "x".to_string())
            .with("status", 0);
        assert_eq!(fields.columns().collect::<Vec<_>>(), vec!["raw", "status"]);
        assert!(fields.contains("posts.raw"));

        let statement = insert_statement("posts", &fields);
        assert_eq!(
            statement.sql(),
            "INSERT INTO posts ( raw, status ) VALUES ( :raw, :status );"
        );
        assert_eq!(statement.param("raw"), Some(&Value::Text("x".to_string())));

        let statement = update_statement("posts", &fields, Some("posts.id = :id"));
        assert_eq!(
            statement.sql(),
            "UPDATE posts SET raw = :raw, status = :status WHERE posts.id = :id;"
        );
    }

    #[test]
    fn set_params_renders_each_mode() {
        let fields = post_fields();
        assert_eq!(set_params(&fields, Mode::Select), "title, status");
        assert_eq!(set_params(&fields, Mode::Insert), ":title, :status");
        assert_eq!(
            set_params(&fields, Mode::Update),
            "title = :title, status = :status"
        );
        assert_eq!(
            set_params(&fields, Mode::Delete),
            "title = :title AND status = :status"
        );
    }

    #[test]
    fn insert_binds_values_as_placeholders() {
        let statement = insert_statement("posts", &post_fields());
        assert_eq!(
            statement.sql(),
            "INSERT INTO posts ( title, status ) VALUES ( :title, :status );"
        );
        assert_eq!(
            statement.param("title"),
            Some(&Value::Text("Hello".to_string()))
        );
        assert!(!statement.sql().contains("Hello"));
    }

    #[test]
    fn update_appends_condition() {
        let statement = update_statement("posts", &post_fields(), Some("posts.id = :id"));
        assert_eq!(
            statement.sql(),
            "UPDATE posts SET title = :title, status = :status WHERE posts.id = :id;"
        );
    }

    #[test]
    fn delete_caps_rows_per_dialect() {
        let criteria = Fields::new().with("id", 3);
        let mysql = delete_statement(Dialect::MySql, "posts", &criteria, None);
        assert_eq!(mysql.sql(), "DELETE FROM posts WHERE ( id = :id ) LIMIT 1;");

        let sqlite = delete_statement(Dialect::Sqlite, "posts", &criteria, Some("25"));
        assert_eq!(
            sqlite.sql(),
            "DELETE FROM posts WHERE rowid IN ( SELECT rowid FROM posts WHERE ( id = :id ) LIMIT 25 );"
        );

        let postgres = delete_statement(Dialect::Postgres, "posts", &criteria, Some("0"));
        assert!(postgres.sql().contains("ctid IN"));
        assert!(postgres.sql().ends_with("LIMIT 1 );"));
    }

    #[test]
    fn in_clause_numbers_placeholders() {
        let (placeholders, params) =
            in_clause("v", &[Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        assert_eq!(placeholders, ":v0, :v1, :v2");
        assert_eq!(params.len(), 3);
        assert_eq!(params[2], (":v2".to_string(), Value::Integer(3)));
    }

    #[test]
    fn aggregate_field_renders_each_dialect() {
        assert_eq!(
            aggregate_field(Dialect::Sqlite, "taxonomy", "taxonomy_data", &["label", "term"]),
            "GROUP_CONCAT(taxonomy.label||','||taxonomy.term, '|') AS taxonomy_data"
        );
        assert_eq!(
            aggregate_field(Dialect::Postgres, "taxonomy", "taxonomy_data", &["label", "term"]),
            "ARRAY_TO_STRING(ARRAY_AGG(CONCAT(taxonomy.label,',',taxonomy.term)), '|') AS taxonomy_data"
        );
        assert_eq!(
            aggregate_field(Dialect::MySql, "taxonomy", "taxonomy_data", &["label", "term"]),
            "GROUP_CONCAT(CONCAT(taxonomy.label,',',taxonomy.term) SEPARATOR '|') AS taxonomy_data"
        );
        assert_eq!(
            aggregate_field(Dialect::Other, "taxonomy", "taxonomy_data", &["label", "term"]),
            aggregate_field(Dialect::MySql, "taxonomy", "taxonomy_data", &["label", "term"])
        );
    }

    #[test]
    fn statement_bind_normalizes_placeholder_names() {
        let statement = Statement::new("SELECT 1 WHERE :id = :id")
            .bind("id", 1)
            .bind(":id", 2);
        assert_eq!(statement.params().len(), 1);
        assert_eq!(statement.param(":id"), Some(&Value::Integer(2)));
    }
}
