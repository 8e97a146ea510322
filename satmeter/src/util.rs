//! Small shared helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
#[must_use]
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Truncate a string to at most `max_chars` characters, respecting char boundaries.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
