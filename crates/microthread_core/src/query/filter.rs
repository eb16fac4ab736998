//! Filter and pagination normalizer.
//!
//! # Responsibility
//! - Turn untrusted listing input into a bounded `Filter`.
//!
//! # Invariants
//! - `normalize` is total: malformed input falls back to defaults, never errors.
//! - `1 <= page <= PAGE_LIMIT` and `1 <= limit <= 999`.
//! - `offset` is present only when positive.

use super::builder::filter_identifier;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};

/// Hard upper bound for page numbers.
pub const PAGE_LIMIT: u32 = 500;

static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[1-9][0-9]*$").expect("valid id regex"));
static LIMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9][0-9]{0,2}$").expect("valid limit regex"));
static SEARCH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s\-_.]").expect("valid search regex"));

/// Listing input as received from a caller.
///
/// Numeric fields accept either JSON numbers or strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawFilter {
    #[serde(deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub parent: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub page: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub limit: Option<String>,
    pub search: Option<String>,
    pub exclusive: bool,
    /// Comma-separated taxonomy labels to aggregate.
    pub taxonomy: Option<String>,
    /// Comma-separated meta labels to aggregate.
    pub meta: Option<String>,
    pub user: bool,
}

/// Normalized listing intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub id: Option<i64>,
    pub parent: Option<i64>,
    pub page: u32,
    pub limit: u32,
    pub offset: Option<u32>,
    pub search: String,
    /// Excludes the parent itself from a parent listing.
    pub exclusive: bool,
    pub taxonomy: Vec<String>,
    pub meta: Vec<String>,
    pub user: bool,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            id: None,
            parent: None,
            page: 1,
            limit: 1,
            offset: None,
            search: String::new(),
            exclusive: false,
            taxonomy: Vec::new(),
            meta: Vec::new(),
            user: false,
        }
    }
}

impl Filter {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: (id > 0).then_some(id),
            ..Self::default()
        }
    }

    pub fn by_parent(parent: i64, exclusive: bool) -> Self {
        Self {
            parent: (parent > 0).then_some(parent),
            exclusive,
            ..Self::default()
        }
    }

    /// Sets page and limit, clamping them the same way `normalize` does.
    pub fn paged(mut self, page: u32, limit: u32) -> Self {
        self.limit = if (1..=999).contains(&limit) { limit } else { 1 };
        self.page = if (1..=PAGE_LIMIT).contains(&page) { page } else { 1 };
        self.offset = page_offset(self.page, self.limit);
        self
    }

    pub fn with_taxonomy(mut self, labels: &str) -> Self {
        self.taxonomy = filter_labels(labels);
        self
    }

    pub fn with_meta(mut self, labels: &str) -> Self {
        self.meta = filter_labels(labels);
        self
    }

    pub fn with_users(mut self) -> Self {
        self.user = true;
        self
    }

    pub fn with_search(mut self, search: &str) -> Self {
        self.search = filter_search(search);
        self
    }
}

/// Normalizes raw listing input.
pub fn normalize(raw: &RawFilter) -> Filter {
    let limit = parse_bounded(raw.limit.as_deref());
    let page = match parse_bounded(raw.page.as_deref()) {
        page if page > PAGE_LIMIT => 1,
        page => page,
    };

    Filter {
        id: raw.id.as_deref().and_then(parse_id),
        parent: raw.parent.as_deref().and_then(parse_id),
        page,
        limit,
        offset: page_offset(page, limit),
        search: raw.search.as_deref().map(filter_search).unwrap_or_default(),
        exclusive: raw.exclusive,
        taxonomy: raw.taxonomy.as_deref().map(filter_labels).unwrap_or_default(),
        meta: raw.meta.as_deref().map(filter_labels).unwrap_or_default(),
        user: raw.user,
    }
}

/// Returns whether `raw` is a positive decimal id without leading zeros.
pub fn is_id(raw: &str) -> bool {
    ID_RE.is_match(raw.trim())
}

/// Parses a positive id; `None` when malformed or out of range.
pub fn parse_id(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if !is_id(raw) {
        return None;
    }
    raw.parse().ok()
}

/// Accepts 1 to 3 digit positive numbers (1..=999).
pub fn check_limit(raw: &str) -> bool {
    LIMIT_RE.is_match(raw.trim())
}

/// `(page - 1) * limit`, or `None` when that is not positive.
///
/// Pages beyond `PAGE_LIMIT` yield no offset.
pub fn page_offset(page: u32, limit: u32) -> Option<u32> {
    if page == 0 || page > PAGE_LIMIT {
        return None;
    }
    let offset = (page - 1).saturating_mul(limit);
    (offset > 0).then_some(offset)
}

/// Keeps letters, digits, whitespace, `-`, `_` and `.`.
pub fn filter_search(raw: &str) -> String {
    SEARCH_RE.replace_all(raw.trim(), "").into_owned()
}

/// Escape character paired with [`like_pattern`].
pub const LIKE_ESCAPE: char = '!';

/// Wraps `search` in `%` for a `LIKE ... ESCAPE '!'` match, escaping
/// `!`, `%` and `_` so they match literally.
pub fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in search.chars() {
        if matches!(ch, LIKE_ESCAPE | '%' | '_') {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Splits a comma-separated label list and identifier-filters each item.
pub fn filter_labels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(filter_identifier)
        .filter(|label| !label.is_empty())
        .collect()
}

fn parse_bounded(raw: Option<&str>) -> u32 {
    raw.filter(|value| check_limit(value))
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(1)
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Integer(i64),
        Unsigned(u64),
        Float(f64),
    }

    let value = Option::<Loose>::deserialize(deserializer)?;
    Ok(value.map(|value| match value {
        Loose::Text(text) => text,
        Loose::Integer(number) => number.to_string(),
        Loose::Unsigned(number) => number.to_string(),
        Loose::Float(number) => number.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::{
        check_limit, filter_labels, filter_search, is_id, like_pattern, normalize, page_offset,
        Filter, RawFilter, PAGE_LIMIT,
    };

    fn raw(page: &str, limit: &str) -> RawFilter {
        RawFilter {
            page: Some(page.to_string()),
            limit: Some(limit.to_string()),
            ..RawFilter::default()
        }
    }

    #[test]
    fn offset_is_page_minus_one_times_limit() {
        for page in 1..=PAGE_LIMIT {
            for limit in [1, 7, 20, 999] {
                let expected = (page - 1) * limit;
                assert_eq!(page_offset(page, limit).unwrap_or(0), expected);
            }
        }
        assert_eq!(page_offset(1, 20), None);
        assert_eq!(page_offset(PAGE_LIMIT + 1, 20), None);
    }

    #[test]
    fn normalize_defaults_missing_and_malformed_values() {
        let filter = normalize(&RawFilter::default());
        assert_eq!(filter, Filter::default());

        let filter = normalize(&raw("abc", "1000"));
        assert_eq!((filter.page, filter.limit, filter.offset), (1, 1, None));

        let filter = normalize(&raw("0", "-5"));
        assert_eq!((filter.page, filter.limit), (1, 1));
    }

    #[test]
    fn pages_past_the_hard_limit_fall_back_to_first_page() {
        let filter = normalize(&raw("501", "20"));
        assert_eq!(filter.page, 1);
        assert_eq!(filter.offset, None);

        let filter = normalize(&raw("500", "20"));
        assert_eq!(filter.page, 500);
        assert_eq!(filter.offset, Some(499 * 20));
    }

    #[test]
    fn ids_must_be_positive_decimals() {
        assert!(is_id("42"));
        assert!(!is_id("0"));
        assert!(!is_id("042"));
        assert!(!is_id("-1"));
        assert!(!is_id("4a"));

        let filter = normalize(&RawFilter {
            id: Some("99999999999999999999".to_string()),
            parent: Some("7".to_string()),
            ..RawFilter::default()
        });
        assert_eq!(filter.id, None);
        assert_eq!(filter.parent, Some(7));
    }

    #[test]
    fn limit_accepts_one_to_three_digits() {
        assert!(check_limit("1"));
        assert!(check_limit("999"));
        assert!(!check_limit("1000"));
        assert!(!check_limit("0"));
        assert!(!check_limit(""));
    }

    #[test]
    fn search_and_labels_are_sanitized() {
        assert_eq!(filter_search("  café <b>rock</b>; 'n' roll-2.0 "), "café brockb n roll-2.0");
        assert_eq!(
            filter_labels("tag, category ,,for'um,123"),
            vec!["tag".to_string(), "category".to_string(), "forum".to_string()]
        );
    }

    #[test]
    fn raw_filter_deserializes_numbers_and_strings() {
        let raw: RawFilter = serde_json::from_value(serde_json::json!({
            "id": 12,
            "page": "3",
            "limit": 20,
            "taxonomy": "tag,category",
            "exclusive": true
        }))
        .expect("raw filter");
        let filter = normalize(&raw);
        assert_eq!(filter.id, Some(12));
        assert_eq!(filter.offset, Some(40));
        assert_eq!(filter.taxonomy, vec!["tag".to_string(), "category".to_string()]);
        assert!(filter.exclusive);
    }

    #[test]
    fn builder_helpers_clamp_paging() {
        let filter = Filter::by_parent(5, true).paged(2, 10);
        assert_eq!(filter.parent, Some(5));
        assert_eq!(filter.offset, Some(10));

        let filter = Filter::by_id(0).paged(900, 0);
        assert_eq!(filter.id, None);
        assert_eq!((filter.page, filter.limit), (1, 1));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("a_b"), "%a!_b%");
        assert_eq!(like_pattern("50%"), "%50!%%");
        assert_eq!(like_pattern("hey!"), "%hey!!%");
    }
}
