//! Content entities persisted by the engine.
//!
//! # Responsibility
//! - Define posts, taxonomy terms, users and sessions.
//! - Share identity/timestamp/status through embedded `EntryFields`.
//!
//! # Invariants
//! - `status == -1` marks an entry hidden (soft-deleted).
//! - Timestamps are epoch milliseconds.

pub mod entry;
pub mod meta;
pub mod post;
pub mod session;
pub mod taxonomy;
pub mod user;

pub use entry::{now_millis, EntryFields, Persistable, STATUS_HIDDEN};
pub use meta::{MetaMap, MetaValue};
pub use post::{Post, PostAuthor};
pub use session::Session;
pub use taxonomy::TaxonomyTerm;
pub use user::{User, USER_STATUS_BANNED, USER_STATUS_NORMAL};
