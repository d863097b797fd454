//! Small helpers shared by the backend client and the sync engine.

/// Longest error text kept in queue records and API error messages
pub const MAX_ERROR_CHARS: usize = 180;

/// Trimmed text, or `None` when nothing but whitespace is left
pub fn non_blank(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

/// Single-line error text: whitespace runs collapse to one space and the
/// result is cut at `MAX_ERROR_CHARS` characters.
pub fn compact_error(value: &str) -> String {
    let mut compact = String::new();
    for word in value.split_whitespace() {
        if !compact.is_empty() {
            compact.push(' ');
        }
        compact.push_str(word);
    }
    compact.chars().take(MAX_ERROR_CHARS).collect()
}

/// Current Unix time in milliseconds
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
