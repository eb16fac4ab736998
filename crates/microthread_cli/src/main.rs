//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise `microthread_core` end to end against an in-memory board.
//! - Keep output deterministic for quick local sanity checks.

use log::warn;
use microthread_core::model::PostAuthor;
use microthread_core::{
    Engine, EngineResult, EscapingSanitizer, Post, PostService, SaveStatus, User, UserRepository,
    UserSaveStatus,
};

fn main() {
    println!("microthread_core ping={}", microthread_core::ping());
    println!("microthread_core version={}", microthread_core::core_version());

    if let Err(err) = run() {
        eprintln!("microthread smoke failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> EngineResult<()> {
    let mut engine = Engine::in_memory()?;

    let mut user = User::new("guest");
    let status = UserRepository::new(engine.store()).save(&mut user, &EscapingSanitizer)?;
    if status != UserSaveStatus::Complete {
        warn!("event=smoke module=cli status=error step=user_save result={status:?}");
    }
    let author = PostAuthor {
        id: user.entry.id.unwrap_or_default(),
        username: user.username.clone(),
        status: user.entry.status,
    };

    let mut service = PostService::with_default_sanitizer(engine.store());
    let mut thread = Post::new("Hello board #welcome #intro");
    thread.set_title("First thread");
    thread.authors.push(author.clone());
    let saved = service.save_forum_post(&mut thread)?;
    println!("thread save={saved:?} id={:?}", thread.id());

    if saved == SaveStatus::Complete {
        let parent = thread.id().unwrap_or_default();
        let mut reply = Post::reply_to(parent, "First reply");
        reply.authors.push(author);
        println!("reply save={:?} id={:?}", service.save_forum_post(&mut reply)?, reply.id());

        if let Some(post) = service.thread(parent)? {
            println!(
                "thread title={} tags={:?} authors={}",
                post.title().unwrap_or_default(),
                post.terms("tag"),
                post.authors.len()
            );
        }
        for post in service.replies(parent, 1)? {
            println!("reply id={:?} summary={}", post.id(), post.summary);
        }
    }

    let errors = engine.take_errors();
    println!("errors={}", errors.len());
    Ok(())
}
