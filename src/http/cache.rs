//! HTTP cache validators
//!
//! Provides `ETag` generation and conditional request handling.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

fn content_hash(content: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Generate a strong `ETag`, e.g. `"abc123def"`
pub fn generate_etag(content: &[u8]) -> String {
    format!("\"{:x}\"", content_hash(content))
}

/// Generate a weak `ETag` from the body length and content hash
///
/// Format: `W/"<len hex>-<hash hex>"`
pub fn generate_weak_etag(content: &[u8]) -> String {
    format!("W/\"{:x}-{:x}\"", content.len(), content_hash(content))
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Comparison is weak: a `W/` prefix on either side is ignored.
/// Supports lists (`"a", "b"`) and the `*` wildcard.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    let ours = etag.trim_start_matches("W/");
    if_none_match.is_some_and(|client_etag| {
        client_etag.split(',').any(|e| {
            let e = e.trim();
            e == "*" || e.trim_start_matches("W/") == ours
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_etag() {
        let etag = generate_etag(b"hello world");
        assert!(etag.starts_with('"'));
        assert!(etag.ends_with('"'));
        assert!(etag.len() > 2);
    }

    #[test]
    fn test_weak_etag_shape() {
        let etag = generate_weak_etag(b"hello");
        assert!(etag.starts_with("W/\"5-"));
        assert!(etag.ends_with('"'));
        assert_eq!(etag, generate_weak_etag(b"hello"));
        assert_ne!(etag, generate_weak_etag(b"hellp"));
    }

    #[test]
    fn test_check_etag_match() {
        let etag = "\"abc123\"";
        assert!(check_etag_match(Some("\"abc123\""), etag));
        assert!(check_etag_match(Some("\"xyz\", \"abc123\""), etag));
        assert!(check_etag_match(Some("W/\"abc123\""), etag));
        assert!(check_etag_match(Some("*"), etag));
        assert!(!check_etag_match(Some("\"different\""), etag));
        assert!(!check_etag_match(None, etag));
    }
}
