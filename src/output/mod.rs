// Output: scatter table for the viewer and the terminal topic report.

pub mod scatter;
pub mod terminal;

/// Default hover-text length in the scatter plot.
pub const DEFAULT_MAX_HOVER_CHARS: usize = 350;

/// Hover text for a document: the first `max_chars` characters plus "..."
/// when the text is longer, the text itself otherwise. Counts chars, not
/// bytes.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
