//! Utility functions for `waygate`.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Safe for multi-byte UTF-8 content (emoji, CJK, accented characters) because it
/// walks character boundaries instead of byte indices. Used to keep message bodies
/// short in log lines.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}
