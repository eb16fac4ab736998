//! Post metadata rows (`meta` linked through `posts_meta`).

use crate::db::Dialect;
use crate::engine::{EngineResult, Store};
use crate::model::meta::decode_meta;
use crate::model::MetaMap;
use crate::query::{
    aggregate_field, filter_identifier, in_clause, parse_aggregate, AggregateMap, Fields,
    SelectQuery, Statement,
};
use rusqlite::types::Value;

pub const META_TABLE: &str = "meta";
pub const POST_META_TABLE: &str = "posts_meta";

pub struct MetaRepository<'e> {
    store: Store<'e>,
}

impl<'e> MetaRepository<'e> {
    pub fn new(store: Store<'e>) -> Self {
        Self { store }
    }

    /// Replaces all metadata of `post_id` with `meta`.
    pub fn apply(&mut self, post_id: i64, meta: &MetaMap) -> EngineResult<bool> {
        Ok(apply_in(&mut self.store, post_id, meta)?.is_some())
    }

    pub fn for_post(&mut self, post_id: i64) -> EngineResult<MetaMap> {
        let statement = SelectQuery::from(META_TABLE)
            .column("meta.label")
            .column("meta.parse_as")
            .column("meta.content")
            .join("JOIN posts_meta ON posts_meta.meta_id = meta.id")
            .condition("posts_meta.post_id = :post_id")
            .bind("post_id", post_id)
            .order_by("meta.id ASC")
            .build();
        let rows = self.store.find(&statement, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut aggregate = AggregateMap::new();
        for (label, parse_as, content) in rows {
            aggregate
                .entry(label)
                .or_default()
                .push(format!("{parse_as},{content}"));
        }
        Ok(decode_meta(&aggregate))
    }
}

pub(crate) fn apply_in(
    store: &mut Store<'_>,
    post_id: i64,
    meta: &MetaMap,
) -> EngineResult<Option<()>> {
    if post_id <= 0 {
        store.reject("apply:meta", "post id must be positive");
        return Ok(None);
    }

    store.transaction("apply:meta", |store| {
        let scrub = Statement::new(
            "DELETE FROM meta WHERE id IN ( SELECT meta_id FROM posts_meta WHERE post_id = :post_id );",
        )
        .bind("post_id", post_id);
        if store.try_execute("scrub:meta", &scrub)?.is_none() {
            return Ok(None);
        }

        let rows = meta
            .iter()
            .filter_map(|(label, value)| {
                let label = filter_identifier(label);
                (!label.is_empty()).then(|| {
                    Fields::new()
                        .with("label", label)
                        .with("parse_as", value.parse_as().to_string())
                        .with("content", value.content())
                })
            })
            .collect::<Vec<_>>();
        let ids = store.put_all(META_TABLE, &rows)?;
        if ids.len() != rows.len() {
            return Ok(None);
        }

        let links = ids
            .iter()
            .map(|id| Fields::new().with("post_id", post_id).with("meta_id", *id))
            .collect::<Vec<_>>();
        if store.put_all(POST_META_TABLE, &links)?.len() != links.len() {
            return Ok(None);
        }
        Ok(Some(()))
    })
}

/// Adds the `label,parse_as,content` aggregate and its joins for `labels`.
pub fn meta_join(query: SelectQuery, dialect: Dialect, labels: &[String]) -> SelectQuery {
    if labels.is_empty() {
        return query;
    }
    let values = labels
        .iter()
        .map(|label| Value::Text(label.clone()))
        .collect::<Vec<_>>();
    let (placeholders, params) = in_clause("meta_label", &values);
    query
        .column(aggregate_field(
            dialect,
            META_TABLE,
            "meta_data",
            &["label", "parse_as", "content"],
        ))
        .join("LEFT JOIN posts_meta ON posts.id = posts_meta.post_id")
        .join(format!(
            "LEFT JOIN meta ON meta.id = posts_meta.meta_id AND meta.label IN ( {placeholders} )"
        ))
        .bind_all(params)
}

/// Decodes a `meta_data` aggregate column.
pub(crate) fn decode_meta_column(raw: Option<String>) -> MetaMap {
    raw.map(|raw| decode_meta(&parse_aggregate(&raw)))
        .unwrap_or_default()
}
