//! Identity, timestamps and status shared by persisted entities.

use crate::query::Fields;
use std::time::{SystemTime, UNIX_EPOCH};

/// Status of hidden / soft-deleted entries.
pub const STATUS_HIDDEN: i64 = -1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFields {
    /// `None` until the entry is stored.
    pub id: Option<i64>,
    pub parent_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub status: i64,
}

impl EntryFields {
    pub fn is_hidden(&self) -> bool {
        self.status == STATUS_HIDDEN
    }

    pub fn is_stored(&self) -> bool {
        self.id.is_some_and(|id| id > 0)
    }
}

/// Entity stored as one row of `TABLE`, keyed by an integer `id`.
pub trait Persistable {
    const TABLE: &'static str;

    fn entry(&self) -> &EntryFields;

    fn entry_mut(&mut self) -> &mut EntryFields;

    /// Column values to write, excluding `id` and timestamps.
    fn to_fields(&self) -> Fields;
}

/// Current wall clock in epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
