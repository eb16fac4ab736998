//! Post use-cases: save orchestration and thread reads.
//!
//! # Responsibility
//! - Derive body, plain text and summary from raw input.
//! - Write the post, its family edge, author history, taxonomy and meta as
//!   one unit of work.
//!
//! # Invariants
//! - A failed save leaves no partial rows behind.
//! - New top-level posts are their own family root.

use crate::engine::{EngineResult, Store};
use crate::model::Post;
use crate::query::Filter;
use crate::repo::family_repo::FamilyRepository;
use crate::repo::meta_repo;
use crate::repo::post_repo::PostRepository;
use crate::repo::taxonomy_repo;
use crate::text::{extract_hashtags, smart_trim, EscapingSanitizer, Sanitizer};
use log::info;

pub const POST_MAX_SUMMARY_LENGTH: usize = 500;
pub const POSTS_PER_PAGE: u32 = 20;

const THREAD_META: &str = "title,published_at,expires_at,blogpost,forumpost,\
                           allowVisitorComments,allowUserComments,allowGuestView,password";
const REPLY_META: &str = "title,blogcomment";
const INDEX_META: &str = "title,blogpost,forumpost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Complete,
    StorageError,
}

pub struct PostService<'e, S: Sanitizer = EscapingSanitizer> {
    store: Store<'e>,
    sanitizer: S,
}

impl<'e> PostService<'e, EscapingSanitizer> {
    pub fn with_default_sanitizer(store: Store<'e>) -> Self {
        Self::new(store, EscapingSanitizer)
    }
}

impl<'e, S: Sanitizer> PostService<'e, S> {
    pub fn new(store: Store<'e>, sanitizer: S) -> Self {
        Self { store, sanitizer }
    }

    /// Creates or edits `post` with its relations in one transaction.
    pub fn save(&mut self, post: &mut Post) -> EngineResult<SaveStatus> {
        post.body = self.sanitizer.filter(&post.raw);
        post.plain = self.sanitizer.plain_text(&post.raw);
        post.summary = smart_trim(&post.plain, POST_MAX_SUMMARY_LENGTH);

        let is_new = !post.entry.is_stored();
        let previous_parent = post.entry.parent_id;
        let saved = self.store.transaction("save:posts", |store| {
            let id = store.save(post)?;
            if id == 0 {
                return Ok(None);
            }
            if is_new {
                let parent = post.entry.parent_id.filter(|parent| *parent > 0).unwrap_or(id);
                post.entry.parent_id = Some(parent);
                if !FamilyRepository::new(store.reborrow()).put_family(id, Some(parent))? {
                    return Ok(None);
                }
            }
            if let Some(author) = post.last_author() {
                let recorded = PostRepository::new(store.reborrow())
                    .record_author(id, author.id, &post.raw)?;
                if !recorded {
                    return Ok(None);
                }
            }
            if !post.taxonomy.is_empty()
                && taxonomy_repo::apply_in(store, id, &post.taxonomy)?.is_none()
            {
                return Ok(None);
            }
            if !post.meta.is_empty() && meta_repo::apply_in(store, id, &post.meta)?.is_none() {
                return Ok(None);
            }
            Ok(Some(id))
        })?;

        match saved {
            Some(id) => {
                info!("event=post_save module=post_service status=ok post_id={id} new={is_new}");
                Ok(SaveStatus::Complete)
            }
            None => {
                if is_new {
                    post.entry.id = None;
                    post.entry.parent_id = previous_parent;
                }
                Ok(SaveStatus::StorageError)
            }
        }
    }

    /// Flags the post as a blog entry (or a comment on one) and saves it.
    pub fn save_blog_post(&mut self, post: &mut Post) -> EngineResult<SaveStatus> {
        if post.is_reply() {
            post.set_flag("blogcomment", true);
        } else {
            post.set_flag("blogpost", true);
        }
        self.save(post)
    }

    /// Collects `#hashtags` from the raw text as `tag` terms and saves.
    pub fn save_forum_post(&mut self, post: &mut Post) -> EngineResult<SaveStatus> {
        let tags = extract_hashtags(&post.raw);
        if !tags.is_empty() {
            let known = post.taxonomy.entry("tag".to_string()).or_default();
            for tag in tags {
                if !known.contains(&tag) {
                    known.push(tag);
                }
            }
        }
        post.set_flag("forumpost", true);
        self.save(post)
    }

    /// One post with its metadata, tags and authors.
    pub fn thread(&mut self, id: i64) -> EngineResult<Option<Post>> {
        let filter = Filter::by_id(id)
            .with_meta(THREAD_META)
            .with_taxonomy("tag")
            .with_users();
        PostRepository::new(self.store.reborrow()).get(id, &filter)
    }

    /// Replies under `parent`, excluding the parent itself.
    pub fn replies(&mut self, parent: i64, page: u32) -> EngineResult<Vec<Post>> {
        let filter = Filter::by_parent(parent, true)
            .paged(page, POSTS_PER_PAGE)
            .with_meta(REPLY_META)
            .with_users();
        PostRepository::new(self.store.reborrow()).find(&filter)
    }

    /// Newest visible posts.
    pub fn index(&mut self, page: u32) -> EngineResult<Vec<Post>> {
        let filter = Filter::default()
            .paged(page, POSTS_PER_PAGE)
            .with_meta(INDEX_META)
            .with_taxonomy("tag");
        PostRepository::new(self.store.reborrow()).find(&filter)
    }

    pub fn delete(&mut self, id: i64, permanent: bool) -> EngineResult<usize> {
        PostRepository::new(self.store.reborrow()).delete(id, permanent)
    }
}
