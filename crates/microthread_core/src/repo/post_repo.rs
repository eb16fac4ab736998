//! Post listing, deletion and author history.
//!
//! # Responsibility
//! - Compose post queries from a `Filter`: aggregates, family join, search,
//!   visibility and paging.
//! - Hard or soft delete posts.
//!
//! # Invariants
//! - Hidden posts (`status = -1`) never appear in listings.
//! - Listings are ordered newest first (`posts.id DESC`).

use super::family_repo::apply_family_join;
use super::meta_repo::{decode_meta_column, meta_join};
use super::taxonomy_repo::taxonomy_join;
use crate::db::Dialect;
use crate::engine::{EngineResult, Store};
use crate::model::post::decode_authors;
use crate::model::{now_millis, Post, STATUS_HIDDEN};
use crate::query::aggregate::dedup_values;
use crate::query::{
    aggregate_field, like_pattern, parse_aggregate, Fields, Filter, SelectQuery, Statement,
};
use rusqlite::Row;

pub const POST_TABLE: &str = "posts";
pub const POST_USER_TABLE: &str = "posts_users";

const POST_COLUMNS: &[&str] = &[
    "id",
    "raw",
    "body",
    "plain",
    "summary",
    "status",
    "created_at",
    "updated_at",
];

pub struct PostRepository<'e> {
    store: Store<'e>,
}

impl<'e> PostRepository<'e> {
    pub fn new(store: Store<'e>) -> Self {
        Self { store }
    }

    pub fn find(&mut self, filter: &Filter) -> EngineResult<Vec<Post>> {
        let dialect = self.store.dialect()?;
        let statement = post_query(dialect, filter);
        let flags = (
            !filter.taxonomy.is_empty(),
            !filter.meta.is_empty(),
            filter.user,
        );
        self.store.find(&statement, |row| post_from_row(row, flags))
    }

    /// One visible post with the aggregates requested by `filter`.
    pub fn get(&mut self, id: i64, filter: &Filter) -> EngineResult<Option<Post>> {
        let filter = Filter {
            id: Some(id),
            page: 1,
            limit: 1,
            offset: None,
            ..filter.clone()
        };
        Ok(self.find(&filter)?.into_iter().next())
    }

    /// Hard delete (capped to one row) or soft delete (`status = -1`).
    pub fn delete(&mut self, id: i64, permanent: bool) -> EngineResult<usize> {
        if permanent {
            return self
                .store
                .delete(POST_TABLE, &Fields::new().with("id", id), None);
        }
        let fields = Fields::new()
            .with("id", id)
            .with("status", STATUS_HIDDEN)
            .with("updated_at", now_millis());
        self.store.edit(POST_TABLE, &fields)
    }

    /// Appends one edit-history row for `post_id`.
    pub fn record_author(&mut self, post_id: i64, user_id: i64, raw: &str) -> EngineResult<bool> {
        let fields = Fields::new()
            .with("post_id", post_id)
            .with("user_id", user_id)
            .with("raw", raw.to_string())
            .with("created_at", now_millis());
        self.store.put_no_key(POST_USER_TABLE, &fields)
    }

    /// Ids of users who edited `post_id`, oldest edit first.
    pub fn author_ids(&mut self, post_id: i64) -> EngineResult<Vec<i64>> {
        let statement = Statement::new(
            "SELECT user_id FROM posts_users WHERE post_id = :post_id ORDER BY rowid ASC;",
        )
        .bind("post_id", post_id);
        self.store.find(&statement, |row| row.get(0))
    }
}

/// Renders the listing statement for `filter`.
pub fn post_query(dialect: Dialect, filter: &Filter) -> Statement {
    let mut query = SelectQuery::from(POST_TABLE)
        .fields(POST_TABLE, POST_COLUMNS)
        .column("posts_family.parent_id AS parent_id");

    query = taxonomy_join(query, dialect, &filter.taxonomy);
    query = meta_join(query, dialect, &filter.meta);
    if filter.user {
        query = query
            .column(aggregate_field(
                dialect,
                "users",
                "user_data",
                &["id", "username", "status"],
            ))
            .join("LEFT JOIN posts_users ON posts.id = posts_users.post_id")
            .join("LEFT JOIN users ON posts_users.user_id = users.id");
    }

    query = apply_family_join(query, filter);
    if !filter.search.is_empty() {
        query = query
            .condition("posts.plain LIKE :search ESCAPE '!'")
            .bind("search", like_pattern(&filter.search));
    }
    query = query.condition("posts.status > -1");

    if !filter.taxonomy.is_empty() || !filter.meta.is_empty() || filter.user {
        query = query
            .group_by("posts.id")
            .group_by("posts_family.parent_id");
    }

    query
        .order_by("posts.id DESC")
        .limit(filter.limit)
        .offset(filter.offset)
        .build()
}

fn post_from_row(
    row: &Row<'_>,
    (taxonomy, meta, users): (bool, bool, bool),
) -> rusqlite::Result<Post> {
    let mut post = Post {
        raw: row.get("raw")?,
        body: row.get("body")?,
        plain: row.get("plain")?,
        summary: row.get("summary")?,
        ..Post::default()
    };
    post.entry.id = Some(row.get("id")?);
    post.entry.parent_id = row.get("parent_id")?;
    post.entry.status = row.get("status")?;
    post.entry.created_at = row.get("created_at")?;
    post.entry.updated_at = row.get("updated_at")?;

    if taxonomy {
        let raw: Option<String> = row.get("taxonomy_data")?;
        let mut map = raw.map(|raw| parse_aggregate(&raw)).unwrap_or_default();
        dedup_values(&mut map);
        post.taxonomy = map;
    }
    if meta {
        post.meta = decode_meta_column(row.get("meta_data")?);
    }
    if users {
        let raw: Option<String> = row.get("user_data")?;
        post.authors = raw
            .map(|raw| decode_authors(&parse_aggregate(&raw)))
            .unwrap_or_default();
    }
    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::post_query;
    use crate::db::Dialect;
    use crate::query::Filter;
    use rusqlite::types::Value;

    #[test]
    fn plain_listing_has_no_group_by() {
        let statement = post_query(Dialect::Sqlite, &Filter::default().paged(1, 20));
        let sql = statement.sql();
        assert!(sql.contains("posts_family.parent_id AS parent_id FROM posts JOIN posts_family"));
        assert!(sql.contains("WHERE posts.status > -1 ORDER BY posts.id DESC LIMIT :limit;"));
        assert!(!sql.contains("GROUP BY"));
    }

    #[test]
    fn aggregates_add_group_by_and_bound_search() {
        let filter = Filter::by_parent(3, true)
            .paged(2, 10)
            .with_taxonomy("tag")
            .with_meta("title")
            .with_users()
            .with_search("rust");
        let statement = post_query(Dialect::MySql, &filter);
        let sql = statement.sql();
        assert!(sql.contains("GROUP_CONCAT(CONCAT(taxonomy.label,',',taxonomy.term) SEPARATOR '|')"));
        assert!(sql.contains("AS meta_data"));
        assert!(sql.contains("AS user_data"));
        assert!(sql.contains("GROUP BY posts.id, posts_family.parent_id"));
        assert!(sql.contains("LIMIT :limit OFFSET :offset"));
        assert!(sql.contains("posts.plain LIKE :search ESCAPE '!'"));
        assert_eq!(
            statement.param("search"),
            Some(&Value::Text("%rust%".to_string()))
        );
    }
}
