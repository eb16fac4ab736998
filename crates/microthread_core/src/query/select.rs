//! Incremental `SELECT` composer.
//!
//! Fragments passed to `column`, `join` and `condition` are engine-authored
//! SQL; caller data only enters through `bind`.

use super::builder::{filter_identifier, Statement};
use rusqlite::types::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    columns: Vec<String>,
    from: String,
    joins: Vec<String>,
    conditions: Vec<String>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u32>,
    offset: Option<u32>,
    params: Vec<(String, Value)>,
}

impl SelectQuery {
    pub fn from(table: &str) -> Self {
        Self {
            from: filter_identifier(table),
            ..Self::default()
        }
    }

    /// Adds `table.column AS column` for each identifier.
    pub fn fields(mut self, table: &str, columns: &[&str]) -> Self {
        let table = filter_identifier(table);
        for column in columns {
            let column = filter_identifier(column);
            if column.is_empty() {
                continue;
            }
            self.columns.push(format!("{table}.{column} AS {column}"));
        }
        self
    }

    pub fn column(mut self, expression: impl Into<String>) -> Self {
        self.columns.push(expression.into());
        self
    }

    pub fn join(mut self, clause: impl Into<String>) -> Self {
        self.joins.push(clause.into());
        self
    }

    /// Adds one `AND`-joined predicate.
    pub fn condition(mut self, predicate: impl Into<String>) -> Self {
        self.conditions.push(predicate.into());
        self
    }

    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.push((name.to_string(), value.into()));
        self
    }

    pub fn bind_all(mut self, params: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn group_by(mut self, expression: impl Into<String>) -> Self {
        self.group_by.push(expression.into());
        self
    }

    pub fn order_by(mut self, expression: impl Into<String>) -> Self {
        self.order_by.push(expression.into());
        self
    }

    /// Bound as `:limit`.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Bound as `:offset`; only rendered together with a limit.
    pub fn offset(mut self, offset: Option<u32>) -> Self {
        self.offset = offset;
        self
    }

    pub fn build(self) -> Statement {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {}", self.from);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        let mut statement_params = self.params;
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT :limit");
            statement_params.push((":limit".to_string(), Value::Integer(i64::from(limit))));
            if let Some(offset) = self.offset {
                sql.push_str(" OFFSET :offset");
                statement_params.push((":offset".to_string(), Value::Integer(i64::from(offset))));
            }
        }
        sql.push(';');

        let mut statement = Statement::new(sql);
        statement.extend_params(statement_params);
        statement
    }
}

#[cfg(test)]
mod tests {
    use super::SelectQuery;
    use rusqlite::types::Value;

    #[test]
    fn composes_clauses_in_order() {
        let statement = SelectQuery::from("posts")
            .fields("posts", &["id", "summary"])
            .join("JOIN posts_family ON posts_family.child_id = posts.id")
            .condition("posts.status > -1")
            .condition("posts.id = :id")
            .bind("id", 4)
            .group_by("posts.id")
            .order_by("posts.id DESC")
            .limit(10)
            .offset(Some(20))
            .build();

        assert_eq!(
            statement.sql(),
            "SELECT posts.id AS id, posts.summary AS summary FROM posts \
             JOIN posts_family ON posts_family.child_id = posts.id \
             WHERE posts.status > -1 AND posts.id = :id GROUP BY posts.id \
             ORDER BY posts.id DESC LIMIT :limit OFFSET :offset;"
        );
        assert_eq!(statement.param("id"), Some(&Value::Integer(4)));
        assert_eq!(statement.param("offset"), Some(&Value::Integer(20)));
    }

    #[test]
    fn offset_requires_limit() {
        let statement = SelectQuery::from("users").offset(Some(5)).build();
        assert_eq!(statement.sql(), "SELECT * FROM users;");
        assert!(statement.params().is_empty());
    }
}
