//! Classification term (tag, category, forum) under a label.

use super::entry::{EntryFields, Persistable};
use crate::query::{filter_identifier, Fields};
use crate::text::slugify;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyTerm {
    pub entry: EntryFields,
    /// Identifier-filtered label, e.g. `tag`.
    pub label: String,
    pub term: String,
    /// URL-friendly form of `term`.
    pub slug: String,
}

impl TaxonomyTerm {
    pub fn new(label: &str, term: &str) -> Self {
        Self {
            entry: EntryFields::default(),
            label: filter_identifier(label),
            term: term.to_string(),
            slug: slugify(term),
        }
    }
}

impl Persistable for TaxonomyTerm {
    const TABLE: &'static str = "taxonomy";

    fn entry(&self) -> &EntryFields {
        &self.entry
    }

    fn entry_mut(&mut self) -> &mut EntryFields {
        &mut self.entry
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("label", self.label.clone())
            .with("term", self.term.clone())
            .with("slug", self.slug.clone())
            .with("status", self.entry.status)
    }
}
