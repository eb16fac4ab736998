//! Repositories for content entities, built on `Store` operations.
//!
//! # Responsibility
//! - Own the SQL shapes of each entity table and its junction tables.
//! - Keep multi-row writes inside the nested transaction protocol.
//!
//! # Invariants
//! - Repositories never open their own connections; they borrow a `Store`.

pub mod family_repo;
pub mod meta_repo;
pub mod post_repo;
pub mod session_repo;
pub mod taxonomy_repo;
pub mod user_repo;

pub use family_repo::{apply_family_join, FamilyRepository};
pub use meta_repo::MetaRepository;
pub use post_repo::PostRepository;
pub use session_repo::{decrypted, SessionRepository};
pub use taxonomy_repo::TaxonomyRepository;
pub use user_repo::{UserRepository, UserSaveStatus};
