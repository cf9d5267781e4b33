//! Selection text cleanup
//!
//! Text selected on a page arrives with layout whitespace (line breaks,
//! tabs, runs of spaces). It is flattened before being spoken or sent out.

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize_selection(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize, then cut to at most `max_chars` chars, the trailing `…`
/// included, on a word boundary when possible.
pub fn truncate_selection(text: &str, max_chars: usize) -> String {
    let normalized = normalize_selection(text);
    if normalized.chars().count() <= max_chars {
        return normalized;
    }
    if max_chars == 0 {
        return String::new();
    }

    let cut: String = normalized.chars().take(max_chars - 1).collect();
    match cut.rfind(' ') {
        Some(space) if space > 0 => format!("{}…", &cut[..space]),
        _ => format!("{cut}…"),
    }
}
