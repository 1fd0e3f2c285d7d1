//! Text helpers.

/// Appended to content cut at the character budget.
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Cut `text` to at most `max_chars` characters, appending the marker if cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}{}", &text[..end], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Lowercase a name and collapse internal whitespace.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
