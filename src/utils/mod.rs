//! Utility functions and helpers.

pub mod http;

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

static SAFE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Normalize an opaque archive reference into a filesystem-safe key.
///
/// References usually end in a stable id segment (`/cached/3f9a1c/`); that
/// segment is used as-is. Anything else is keyed by a SHA-256 prefix.
pub fn normalize_archive_id(reference: &str) -> String {
    let trimmed = reference.trim();
    let path = trimmed
        .split(['?', '#'])
        .next()
        .unwrap_or(trimmed)
        .trim_end_matches('/');

    if let Some(segment) = path.rsplit('/').next() {
        if SAFE_SEGMENT.is_match(segment) {
            return segment.to_string();
        }
    }

    let digest = Sha256::digest(trimmed.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clip text to at most `max_chars` characters.
pub fn clip_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
