//! Typed post metadata.
//!
//! Stored as `(label, parse_as, content)` rows; `parse_as` selects the variant.

use crate::query::AggregateMap;
use std::collections::BTreeMap;

pub type MetaMap = BTreeMap<String, MetaValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue {
    Bool(bool),
    Text(String),
    /// Opaque hash supplied by the caller.
    Password(String),
}

impl MetaValue {
    pub fn parse_as(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Text(_) => "text",
            Self::Password(_) => "password",
        }
    }

    /// Stored `content` column.
    ///
    /// `|` separates aggregate rows, so it is written as `/`.
    pub fn content(&self) -> String {
        match self {
            Self::Bool(true) => "1".to_string(),
            Self::Bool(false) => "0".to_string(),
            Self::Text(text) | Self::Password(text) => text.replace('|', "/"),
        }
    }

    pub fn decode(parse_as: &str, content: &str) -> Self {
        match parse_as {
            "bool" => Self::Bool(matches!(content, "1" | "true")),
            "password" => Self::Password(content.to_string()),
            _ => Self::Text(content.to_string()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_password_hash(&self) -> Option<&str> {
        match self {
            Self::Password(hash) => Some(hash),
            _ => None,
        }
    }
}

/// Decodes a `label -> ["parse_as,content", ...]` aggregate.
///
/// The last row per label wins.
pub fn decode_meta(map: &AggregateMap) -> MetaMap {
    let mut meta = MetaMap::new();
    for (label, rows) in map {
        let Some(row) = rows.last() else {
            continue;
        };
        let (parse_as, content) = row.split_once(',').unwrap_or(("text", row.as_str()));
        meta.insert(label.clone(), MetaValue::decode(parse_as, content));
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::{decode_meta, MetaValue};
    use crate::query::parse_aggregate;

    #[test]
    fn decodes_each_variant() {
        let meta = decode_meta(&parse_aggregate(
            "title,text,Hello, world|blogpost,bool,1|password,password,$2y$hash",
        ));
        assert_eq!(meta["title"], MetaValue::Text("Hello, world".to_string()));
        assert_eq!(meta["blogpost"].as_bool(), Some(true));
        assert_eq!(meta["password"].as_password_hash(), Some("$2y$hash"));
    }

    #[test]
    fn content_never_contains_row_separator() {
        let value = MetaValue::Text("a|b".to_string());
        assert_eq!(value.content(), "a/b");
        assert_eq!(MetaValue::Bool(false).content(), "0");
    }
}
