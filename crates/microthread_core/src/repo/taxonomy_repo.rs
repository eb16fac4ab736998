//! Taxonomy terms and their assignment to posts.
//!
//! # Responsibility
//! - Diff requested terms against stored ones and insert only new terms.
//! - Replace a post's term links for one label atomically.
//!
//! # Invariants
//! - `(label, term)` is stored once; repeated assignment never duplicates rows.
//! - Term links for a label are replaced as a whole inside one transaction.

use crate::db::Dialect;
use crate::engine::{EngineResult, Store};
use crate::model::{now_millis, TaxonomyTerm};
use crate::query::{
    aggregate_field, filter_identifier, in_clause, AggregateMap, Fields, SelectQuery, Statement,
};
use rusqlite::types::Value;
use rusqlite::Row;

pub const TAXONOMY_TABLE: &str = "taxonomy";
pub const POST_TAXONOMY_TABLE: &str = "posts_taxonomy";

const TERM_COLUMNS: &[&str] = &[
    "id",
    "label",
    "term",
    "slug",
    "status",
    "created_at",
    "updated_at",
];

pub struct TaxonomyRepository<'e> {
    store: Store<'e>,
}

impl<'e> TaxonomyRepository<'e> {
    pub fn new(store: Store<'e>) -> Self {
        Self { store }
    }

    /// Stored terms under `label` whose `term` is in `terms`.
    pub fn existing(&mut self, label: &str, terms: &[String]) -> EngineResult<Vec<TaxonomyTerm>> {
        existing_in(&mut self.store, &filter_identifier(label), terms)
    }

    /// Makes `terms` the complete set of `label` terms on `post_id`.
    ///
    /// Returns term ids, newly created first. Empty on failure.
    pub fn assign(&mut self, post_id: i64, label: &str, terms: &[String]) -> EngineResult<Vec<i64>> {
        Ok(assign_in(&mut self.store, post_id, label, terms)?.unwrap_or_default())
    }

    /// Assigns every label of `taxonomy` in one transaction.
    pub fn apply(&mut self, post_id: i64, taxonomy: &AggregateMap) -> EngineResult<bool> {
        Ok(apply_in(&mut self.store, post_id, taxonomy)?.is_some())
    }

    /// Terms of `label` currently linked to `post_id`, alphabetical.
    pub fn terms_for(&mut self, post_id: i64, label: &str) -> EngineResult<Vec<String>> {
        let statement = SelectQuery::from(TAXONOMY_TABLE)
            .column("taxonomy.term")
            .join("JOIN posts_taxonomy ON posts_taxonomy.taxonomy_id = taxonomy.id")
            .condition("posts_taxonomy.post_id = :post_id")
            .condition("taxonomy.label = :label")
            .bind("post_id", post_id)
            .bind("label", filter_identifier(label))
            .order_by("taxonomy.term ASC")
            .build();
        self.store.find(&statement, |row| row.get(0))
    }

    /// Every stored term under `label`, alphabetical.
    pub fn list_terms(&mut self, label: &str) -> EngineResult<Vec<TaxonomyTerm>> {
        let statement = SelectQuery::from(TAXONOMY_TABLE)
            .fields(TAXONOMY_TABLE, TERM_COLUMNS)
            .condition("taxonomy.label = :label")
            .condition("taxonomy.status > -1")
            .bind("label", filter_identifier(label))
            .order_by("taxonomy.term ASC")
            .build();
        self.store.find(&statement, term_from_row)
    }
}

/// Trims terms, drops `|`, empties and duplicates.
pub fn normalize_terms(terms: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        let term = term.replace('|', "");
        let term = term.trim();
        if term.is_empty() || normalized.iter().any(|known| known == term) {
            continue;
        }
        normalized.push(term.to_string());
    }
    normalized
}

pub(crate) fn apply_in(
    store: &mut Store<'_>,
    post_id: i64,
    taxonomy: &AggregateMap,
) -> EngineResult<Option<()>> {
    store.transaction("apply:taxonomy", |store| {
        for (label, terms) in taxonomy {
            if assign_in(store, post_id, label, terms)?.is_none() {
                return Ok(None);
            }
        }
        Ok(Some(()))
    })
}

fn assign_in(
    store: &mut Store<'_>,
    post_id: i64,
    label: &str,
    terms: &[String],
) -> EngineResult<Option<Vec<i64>>> {
    let label = filter_identifier(label);
    if label.is_empty() {
        store.reject("assign:taxonomy", "label is empty after filtering");
        return Ok(None);
    }
    if post_id <= 0 {
        store.reject("assign:taxonomy", "post id must be positive");
        return Ok(None);
    }
    let terms = normalize_terms(terms);

    store.transaction("assign:taxonomy", |store| {
        let existing = existing_in(store, &label, &terms)?;
        let fresh = terms
            .iter()
            .filter(|term| !existing.iter().any(|known| &known.term == *term))
            .collect::<Vec<_>>();

        let mut ids = Vec::with_capacity(terms.len());
        if !fresh.is_empty() {
            let now = now_millis();
            let rows = fresh
                .iter()
                .map(|term| {
                    let term = TaxonomyTerm::new(&label, term);
                    Fields::new()
                        .with("label", term.label)
                        .with("term", term.term)
                        .with("slug", term.slug)
                        .with("created_at", now)
                        .with("updated_at", now)
                })
                .collect::<Vec<_>>();
            let inserted = store.put_all(TAXONOMY_TABLE, &rows)?;
            if inserted.len() != rows.len() {
                return Ok(None);
            }
            ids.extend(inserted);
        }
        ids.extend(existing.iter().filter_map(|term| term.entry.id));

        let scrub = Statement::new(
            "DELETE FROM posts_taxonomy WHERE post_id = :post_id AND taxonomy_id IN \
             ( SELECT id FROM taxonomy WHERE label = :label );",
        )
        .bind("post_id", post_id)
        .bind("label", label.clone());
        if store.try_execute("scrub:taxonomy", &scrub)?.is_none() {
            return Ok(None);
        }

        let links = ids
            .iter()
            .map(|id| {
                Fields::new()
                    .with("post_id", post_id)
                    .with("taxonomy_id", *id)
            })
            .collect::<Vec<_>>();
        if store.put_all(POST_TAXONOMY_TABLE, &links)?.len() != links.len() {
            return Ok(None);
        }
        Ok(Some(ids))
    })
}

fn existing_in(
    store: &mut Store<'_>,
    label: &str,
    terms: &[String],
) -> EngineResult<Vec<TaxonomyTerm>> {
    if terms.is_empty() || label.is_empty() {
        return Ok(Vec::new());
    }
    let values = terms
        .iter()
        .map(|term| Value::Text(term.clone()))
        .collect::<Vec<_>>();
    let (placeholders, params) = in_clause("term", &values);
    let statement = SelectQuery::from(TAXONOMY_TABLE)
        .fields(TAXONOMY_TABLE, TERM_COLUMNS)
        .condition("taxonomy.label = :label")
        .condition(format!("taxonomy.term IN ( {placeholders} )"))
        .bind("label", label.to_string())
        .bind_all(params)
        .build();
    store.find(&statement, term_from_row)
}

fn term_from_row(row: &Row<'_>) -> rusqlite::Result<TaxonomyTerm> {
    let mut term = TaxonomyTerm {
        label: row.get("label")?,
        term: row.get("term")?,
        slug: row.get("slug")?,
        ..TaxonomyTerm::default()
    };
    term.entry.id = Some(row.get("id")?);
    term.entry.status = row.get("status")?;
    term.entry.created_at = row.get("created_at")?;
    term.entry.updated_at = row.get("updated_at")?;
    Ok(term)
}

/// Adds the `label,term` aggregate and its joins for `labels` to a post query.
pub fn taxonomy_join(query: SelectQuery, dialect: Dialect, labels: &[String]) -> SelectQuery {
    if labels.is_empty() {
        return query;
    }
    let values = labels
        .iter()
        .map(|label| Value::Text(label.clone()))
        .collect::<Vec<_>>();
    let (placeholders, params) = in_clause("taxonomy_label", &values);
    query
        .column(aggregate_field(
            dialect,
            TAXONOMY_TABLE,
            "taxonomy_data",
            &["label", "term"],
        ))
        .join("LEFT JOIN posts_taxonomy ON posts.id = posts_taxonomy.post_id")
        .join(format!(
            "LEFT JOIN taxonomy ON taxonomy.id = posts_taxonomy.taxonomy_id \
             AND taxonomy.label IN ( {placeholders} )"
        ))
        .bind_all(params)
}

#[cfg(test)]
mod tests {
    use super::{normalize_terms, taxonomy_join};
    use crate::db::Dialect;
    use crate::query::SelectQuery;

    #[test]
    fn normalize_trims_strips_separators_and_dedups() {
        let terms = ["  music ", "art", "music", "", " | ", "a|b"]
            .iter()
            .map(|term| term.to_string())
            .collect::<Vec<_>>();
        assert_eq!(normalize_terms(&terms), vec!["music", "art", "ab"]);
    }

    #[test]
    fn join_binds_labels() {
        let statement = taxonomy_join(
            SelectQuery::from("posts").column("posts.id"),
            Dialect::Sqlite,
            &["tag".to_string(), "category".to_string()],
        )
        .build();
        assert!(statement
            .sql()
            .contains("GROUP_CONCAT(taxonomy.label||','||taxonomy.term, '|') AS taxonomy_data"));
        assert!(statement
            .sql()
            .contains("taxonomy.label IN ( :taxonomy_label0, :taxonomy_label1 )"));
        assert_eq!(statement.params().len(), 2);
    }
}
