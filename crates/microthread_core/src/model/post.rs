//! Post entity: raw input plus derived body, plain text and summary.

use super::entry::{EntryFields, Persistable};
use super::meta::{MetaMap, MetaValue};
use crate::query::{AggregateMap, Fields};

const TITLE: &str = "title";

/// Author row decoded from the `users` aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostAuthor {
    pub id: i64,
    pub username: String,
    pub status: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Post {
    pub entry: EntryFields,
    /// Unformatted user input.
    pub raw: String,
    /// Sanitized markup derived from `raw`.
    pub body: String,
    pub plain: String,
    pub summary: String,
    /// Label -> terms (tags, categories, forums).
    pub taxonomy: AggregateMap,
    pub meta: MetaMap,
    /// Edit history; the last author is recorded on save.
    pub authors: Vec<PostAuthor>,
}

impl Post {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            ..Self::default()
        }
    }

    pub fn reply_to(parent_id: i64, raw: impl Into<String>) -> Self {
        let mut post = Self::new(raw);
        post.entry.parent_id = Some(parent_id);
        post
    }

    pub fn id(&self) -> Option<i64> {
        self.entry.id
    }

    pub fn parent_id(&self) -> Option<i64> {
        self.entry.parent_id
    }

    /// Whether this post answers another one instead of starting a thread.
    pub fn is_reply(&self) -> bool {
        self.entry
            .parent_id
            .is_some_and(|parent| Some(parent) != self.entry.id)
    }

    pub fn with_terms<I, S>(mut self, label: &str, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.taxonomy
            .entry(label.to_string())
            .or_default()
            .extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn terms(&self, label: &str) -> &[String] {
        self.taxonomy
            .get(label)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn set_meta(&mut self, label: &str, value: MetaValue) {
        self.meta.insert(label.to_string(), value);
    }

    pub fn title(&self) -> Option<&str> {
        self.meta.get(TITLE).and_then(MetaValue::as_text)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.set_meta(TITLE, MetaValue::Text(title.into()));
    }

    /// Boolean meta flag; absent flags read as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.meta
            .get(name)
            .and_then(MetaValue::as_bool)
            .unwrap_or(false)
    }

    pub fn set_flag(&mut self, name: &str, value: bool) {
        self.set_meta(name, MetaValue::Bool(value));
    }

    pub fn password_hash(&self) -> Option<&str> {
        self.meta.get("password").and_then(MetaValue::as_password_hash)
    }

    pub fn set_password_hash(&mut self, hash: impl Into<String>) {
        self.set_meta("password", MetaValue::Password(hash.into()));
    }

    pub fn last_author(&self) -> Option<&PostAuthor> {
        self.authors.last()
    }
}

impl Persistable for Post {
    const TABLE: &'static str = "posts";

    fn entry(&self) -> &EntryFields {
        &self.entry
    }

    fn entry_mut(&mut self) -> &mut EntryFields {
        &mut self.entry
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("raw", self.raw.clone())
            .with("body", self.body.clone())
            .with("plain", self.plain.clone())
            .with("summary", self.summary.clone())
            .with("status", self.entry.status)
    }
}

/// Decodes an `id -> ["username,status"]` aggregate, ordered by id.
pub(crate) fn decode_authors(map: &AggregateMap) -> Vec<PostAuthor> {
    let mut authors = Vec::new();
    for (id, rows) in map {
        let Ok(id) = id.parse::<i64>() else {
            continue;
        };
        let Some(row) = rows.last() else {
            continue;
        };
        let (username, status) = match row.rsplit_once(',') {
            Some((username, status)) => (username, status.parse().unwrap_or(0)),
            None => (row.as_str(), 0),
        };
        authors.push(PostAuthor {
            id,
            username: username.to_string(),
            status,
        });
    }
    authors.sort_by_key(|author| author.id);
    authors
}

#[cfg(test)]
mod tests {
    use super::{decode_authors, Post};
    use crate::model::Persistable;
    use crate::query::parse_aggregate;

    #[test]
    fn fields_cover_content_columns_only() {
        let post = Post::new("hello");
        let fields = post.to_fields();
        let columns = fields.columns().collect::<Vec<_>>();
        assert_eq!(columns, vec!["raw", "body", "plain", "summary", "status"]);
    }

    #[test]
    fn meta_accessors_round_trip() {
        let mut post = Post::new("hello");
        post.set_title("First");
        post.set_flag("allowGuestView", true);
        assert_eq!(post.title(), Some("First"));
        assert!(post.flag("allowGuestView"));
        assert!(!post.flag("allowUserComments"));
    }

    #[test]
    fn replies_point_at_their_parent() {
        assert!(Post::reply_to(3, "re").is_reply());
        assert!(!Post::new("top").is_reply());
    }

    #[test]
    fn authors_decode_from_aggregate() {
        let authors = decode_authors(&parse_aggregate("2,bob,1|1,alice,-1|x,bad,1"));
        assert_eq!(authors.len(), 2);
        assert_eq!(authors[0].username, "alice");
        assert_eq!(authors[0].status, -1);
        assert_eq!(authors[1].id, 2);
    }
}
