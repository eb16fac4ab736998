//! Codec for composite aggregate columns (`label,term|label,term`).

use std::collections::BTreeMap;

/// Decoded aggregate: key -> ordered values.
pub type AggregateMap = BTreeMap<String, Vec<String>>;

const PAIR_SEPARATOR: char = ',';
const ROW_SEPARATOR: char = '|';

/// Decodes an aggregate string produced by `aggregate_field`.
///
/// Segments split on the first `,`; a segment without `,` yields its key with
/// no values. Empty segments and empty keys are skipped.
pub fn parse_aggregate(raw: &str) -> AggregateMap {
    let mut map = AggregateMap::new();
    for segment in raw.split(ROW_SEPARATOR) {
        if segment.is_empty() {
            continue;
        }
        let (key, value) = match segment.split_once(PAIR_SEPARATOR) {
            Some((key, value)) => (key, Some(value)),
            None => (segment, None),
        };
        if key.is_empty() {
            continue;
        }
        let values = map.entry(key.to_string()).or_default();
        if let Some(value) = value {
            values.push(value.to_string());
        }
    }
    map
}

/// Encodes a map the way the database aggregate renders it.
///
/// Keys with no values are written as a bare key.
pub fn render_aggregate(map: &AggregateMap) -> String {
    let mut segments = Vec::new();
    for (key, values) in map {
        if values.is_empty() {
            segments.push(key.clone());
            continue;
        }
        for value in values {
            segments.push(format!("{key}{PAIR_SEPARATOR}{value}"));
        }
    }
    segments.join(&ROW_SEPARATOR.to_string())
}

/// Drops repeated values per key, keeping first-seen order.
///
/// Joined aggregates multiply rows, so the same pair can appear more than once.
pub(crate) fn dedup_values(map: &mut AggregateMap) {
    for values in map.values_mut() {
        let mut seen = Vec::with_capacity(values.len());
        values.retain(|value| {
            if seen.contains(value) {
                false
            } else {
                seen.push(value.clone());
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{dedup_values, parse_aggregate, render_aggregate, AggregateMap};

    #[test]
    fn parses_labels_into_ordered_terms() {
        let map = parse_aggregate("tag,music|tag,art|category,news");
        assert_eq!(map["tag"], vec!["music".to_string(), "art".to_string()]);
        assert_eq!(map["category"], vec!["news".to_string()]);
    }

    #[test]
    fn splits_on_first_comma_only() {
        let map = parse_aggregate("title,Hello, world");
        assert_eq!(map["title"], vec!["Hello, world".to_string()]);
    }

    #[test]
    fn keeps_bare_keys_and_skips_empty_segments() {
        let map = parse_aggregate("||flag|,orphan|tag,a");
        assert_eq!(map.len(), 2);
        assert!(map["flag"].is_empty());
        assert_eq!(map["tag"], vec!["a".to_string()]);
    }

    #[test]
    fn empty_input_is_empty_map() {
        assert!(parse_aggregate("").is_empty());
    }

    #[test]
    fn render_is_inverse_of_parse() {
        let mut map = AggregateMap::new();
        map.insert(
            "tag".to_string(),
            vec!["music".to_string(), "a,b".to_string()],
        );
        map.insert("empty".to_string(), Vec::new());
        map.insert("category".to_string(), vec!["news".to_string()]);

        let rendered = render_aggregate(&map);
        assert_eq!(parse_aggregate(&rendered), map);
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let mut map = parse_aggregate("tag,b|tag,a|tag,b|tag,a");
        dedup_values(&mut map);
        assert_eq!(map["tag"], vec!["b".to_string(), "a".to_string()]);
    }
}
