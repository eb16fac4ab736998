//! Parent/child adjacency between posts.
//!
//! # Responsibility
//! - Write `posts_family` edges and read them back.
//! - Pick the family join for post listings.
//!
//! # Invariants
//! - A top-level post is its own root (`parent_id == child_id`).

use crate::engine::{EngineResult, Store};
use crate::query::{Fields, Filter, SelectQuery, Statement};

pub const FAMILY_TABLE: &str = "posts_family";

pub struct FamilyRepository<'e> {
    store: Store<'e>,
}

impl<'e> FamilyRepository<'e> {
    pub fn new(store: Store<'e>) -> Self {
        Self { store }
    }

    /// Inserts one `(parent, child)` edge; `None` makes `id` its own root.
    pub fn put_family(&mut self, id: i64, parent_id: Option<i64>) -> EngineResult<bool> {
        if id <= 0 {
            self.store.reject("put_family", "child id must be positive");
            return Ok(false);
        }
        let parent_id = parent_id.filter(|parent| *parent > 0).unwrap_or(id);
        let edge = Fields::new()
            .with("parent_id", parent_id)
            .with("child_id", id);
        self.store.put_no_key(FAMILY_TABLE, &edge)
    }

    pub fn parent_of(&mut self, id: i64) -> EngineResult<Option<i64>> {
        let statement = Statement::new(
            "SELECT parent_id FROM posts_family WHERE child_id = :id ORDER BY parent_id LIMIT 1;",
        )
        .bind("id", id);
        self.store.find_one(&statement, |row| row.get(0))
    }

    /// Child ids of `parent`, oldest first; `exclusive` drops the root itself.
    pub fn children_of(&mut self, parent: i64, exclusive: bool) -> EngineResult<Vec<i64>> {
        let mut query = SelectQuery::from(FAMILY_TABLE)
            .column("posts_family.child_id")
            .condition("posts_family.parent_id = :parent")
            .bind("parent", parent)
            .order_by("posts_family.child_id ASC");
        if exclusive {
            query = query.condition("posts_family.child_id <> posts_family.parent_id");
        }
        self.store.find(&query.build(), |row| row.get(0))
    }
}

/// Adds the `posts_family` join selected by `filter` to a `posts` query.
///
/// By id wins over by parent; without either every post is joined to its edge.
pub fn apply_family_join(query: SelectQuery, filter: &Filter) -> SelectQuery {
    if let Some(id) = filter.id {
        return query
            .join("JOIN posts_family ON posts_family.child_id = posts.id")
            .condition("posts.id = :id")
            .bind("id", id);
    }

    if let Some(parent) = filter.parent {
        let mut join = "JOIN posts_family ON posts_family.parent_id = :parent \
                        AND posts.id = posts_family.child_id"
            .to_string();
        if filter.exclusive {
            join.push_str(" AND posts_family.child_id <> posts_family.parent_id");
        }
        return query.join(join).bind("parent", parent);
    }

    query.join("JOIN posts_family ON posts_family.child_id = posts.id")
}

#[cfg(test)]
mod tests {
    use super::apply_family_join;
    use crate::query::{Filter, SelectQuery};

    fn render(filter: &Filter) -> String {
        apply_family_join(SelectQuery::from("posts").column("posts.id"), filter)
            .build()
            .sql()
            .to_string()
    }

    #[test]
    fn joins_by_id_first() {
        let mut filter = Filter::by_id(4);
        filter.parent = Some(9);
        assert_eq!(
            render(&filter),
            "SELECT posts.id FROM posts JOIN posts_family ON posts_family.child_id = posts.id \
             WHERE posts.id = :id;"
        );
    }

    #[test]
    fn exclusive_parent_join_skips_root() {
        let sql = render(&Filter::by_parent(9, true));
        assert!(sql.contains("posts_family.parent_id = :parent AND posts.id = posts_family.child_id"));
        assert!(sql.contains("posts_family.child_id <> posts_family.parent_id"));

        let sql = render(&Filter::by_parent(9, false));
        assert!(!sql.contains("<>"));
    }

    #[test]
    fn unfiltered_join_matches_every_child() {
        assert_eq!(
            render(&Filter::default()),
            "SELECT posts.id FROM posts JOIN posts_family ON posts_family.child_id = posts.id;"
        );
    }
}
