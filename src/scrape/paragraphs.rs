// Paragraph text extraction from raw HTML.
//
// Only `<p>` elements are considered. Each paragraph's text nodes are joined,
// whitespace runs collapse to a single space, and paragraphs that end up
// empty are dropped. Document order is preserved.

use scraper::{Html, Selector};

/// Extract the non-empty text of every `<p>` element, in document order.
pub fn extract_paragraphs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("p").expect("static selector is valid");

    document
        .select(&selector)
        .map(|element| normalize_whitespace(&element.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Collapse whitespace runs (including newlines and tabs) to single spaces
/// and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
