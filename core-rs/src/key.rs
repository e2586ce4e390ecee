//! Key normalization, joining, and the depth/prefix filters used by
//! `listKeys`.
//!
//! A key is a colon-separated ordered sequence of non-empty segments
//! (`users:42:profile`). Slashes are coerced to colons on the way in, and a
//! trailing colon marks a *base key* denoting a subtree root.

use crate::error::{Result, StoreError};

/// Normalizes a raw caller-supplied key.
///
/// - Coerces `/` to `:`.
/// - Strips any `?`-suffixed query portion.
/// - Trims leading/trailing separators and collapses runs of them.
/// - Rejects traversal: a `..` segment, or `..` as the final segment.
///
/// Idempotent: `normalize(normalize(k)) == normalize(k)`.
pub fn normalize(raw: &str) -> Result<String> {
    let without_query = match raw.find('?') {
        Some(idx) => &raw[..idx],
        None => raw,
    };

    let coerced: String = without_query
        .chars()
        .map(|c| if c == '/' || c == '\\' { ':' } else { c })
        .collect();

    let segments: Vec<&str> = coerced.split(':').filter(|s| !s.is_empty()).collect();

    // Only a segment that IS ".." is a traversal attempt; "te..st..js" is a
    // legitimate filename and must survive normalization untouched.
    if segments.iter().any(|seg| *seg == "..") {
        return Err(StoreError::InvalidKey(raw.to_string()));
    }

    Ok(segments.join(":"))
}

/// Joins a base and a relative key with a single colon, skipping empty parts.
pub fn join(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches(':');
    let rel = rel.trim_start_matches(':');
    match (base.is_empty(), rel.is_empty()) {
        (true, true) => String::new(),
        (true, false) => rel.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}:{rel}"),
    }
}

/// Returns the segment depth of a key (`""` is depth 0, `"a"` is depth 1,
/// `"a:b"` is depth 2, ...).
pub fn depth(key: &str) -> usize {
    if key.is_empty() {
        0
    } else {
        key.split(':').count()
    }
}

/// True if `key` lies at or under `base` and, when `max_depth` is set, does
/// not exceed `base`'s depth plus `max_depth`.
pub fn matches_base(key: &str, base: &str, max_depth: Option<usize>) -> bool {
    if !starts_with_base(key, base) {
        return false;
    }
    if let Some(max) = max_depth {
        let base_depth = depth(base.trim_end_matches(':'));
        if depth(key) > base_depth + max {
            return false;
        }
    }
    true
}

/// True if `key` is `base` itself or lies under it (`base` must be a
/// colon-terminated or empty prefix of `key`'s segments).
pub fn starts_with_base(key: &str, base: &str) -> bool {
    let base = base.trim_end_matches(':');
    if base.is_empty() {
        return true;
    }
    key == base || key.starts_with(&format!("{base}:"))
}

/// True if `key` is a reserved metadata key (ends in `$`) and must be
/// excluded from enumeration.
pub fn is_reserved(key: &str) -> bool {
    key.ends_with('$')
}
