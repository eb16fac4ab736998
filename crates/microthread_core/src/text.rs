//! Text helpers for user-submitted content.
//!
//! # Responsibility
//! - Define the `Sanitizer` seam used when deriving post bodies and bios.
//! - Trim summaries on word boundaries and derive URL slugs.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.\s]+|[.\s]+").expect("valid word regex"));
static HASHTAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)#([\p{L}\p{N}]{1,30})").expect("valid hashtag regex")
});

const MAX_HASHTAGS: usize = 5;

/// Turns raw user markup into something safe to store and render.
pub trait Sanitizer {
    /// Display markup for `raw`.
    fn filter(&self, raw: &str) -> String;

    /// Markup-free text for search and summaries.
    fn plain_text(&self, raw: &str) -> String;
}

/// Escapes all markup; line breaks become `<br />`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscapingSanitizer;

impl Sanitizer for EscapingSanitizer {
    fn filter(&self, raw: &str) -> String {
        let mut escaped = String::with_capacity(raw.len());
        for ch in raw.trim().replace("\r\n", "\n").chars() {
            match ch {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#39;"),
                '\n' => escaped.push_str("<br />"),
                other => escaped.push(other),
            }
        }
        escaped
    }

    fn plain_text(&self, raw: &str) -> String {
        let stripped = TAG_RE.replace_all(raw, " ");
        WHITESPACE_RE
            .replace_all(stripped.trim(), " ")
            .into_owned()
    }
}

/// Cuts `value` to at most `max` characters without splitting words.
///
/// Falls back to a hard cut when the first word alone is longer than `max`.
pub fn smart_trim(value: &str, max: usize) -> String {
    let value = value.trim();
    if value.chars().count() <= max {
        return value.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for token in WORD_RE.find_iter(value) {
        let len = token.as_str().chars().count();
        if used + len > max {
            break;
        }
        out.push_str(token.as_str());
        used += len;
    }

    let trimmed = out.trim_end_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        return value.chars().take(max).collect();
    }
    trimmed.to_string()
}

/// Lowercase, alphanumeric runs joined by `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Up to five distinct `#hashtag` terms in order of appearance.
pub fn extract_hashtags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for captures in HASHTAG_RE.captures_iter(raw) {
        let tag = captures[1].to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
        if tags.len() == MAX_HASHTAGS {
            break;
        }
    }
    tags
}
