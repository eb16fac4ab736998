//! Use-case services orchestrating repositories.

pub mod post_service;

pub use post_service::{PostService, SaveStatus};
