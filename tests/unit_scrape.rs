// Unit tests for paragraph extraction and the content gate.
//
// Pure HTML-in, paragraphs-out checks; no network access.

use pagetopics::pipeline::page::{has_enough_content, MIN_DOCUMENTS};
use pagetopics::scrape::client::PageClient;
use pagetopics::scrape::paragraphs::{extract_paragraphs, normalize_whitespace};

// ============================================================
// extract_paragraphs
// ============================================================

#[test]
fn paragraphs_in_document_order() {
    let html = r#"
        <html>
          <head><title>Ignored title</title></head>
          <body>
            <h1>Heading is not a paragraph</h1>
            <p>Cats are mammals.</p>
            <ul><li>List items are skipped</li></ul>
            <article><p>Dogs are mammals too.</p></article>
            <p></p>
          </body>
        </html>"#;

    let paragraphs = extract_paragraphs(html);

    assert_eq!(paragraphs, vec!["Cats are mammals.", "Dogs are mammals too."]);
}

#[test]
fn multiline_paragraph_collapses_to_one_line() {
    let html = "<p>\n    A paragraph\n    broken over\n\n    several lines.\n</p>";
    assert_eq!(extract_paragraphs(html), vec!["A paragraph broken over several lines."]);
}

#[test]
fn page_without_paragraphs_yields_nothing() {
    let html = "<html><body><div>Only divs</div><span>and spans</span></body></html>";
    assert!(extract_paragraphs(html).is_empty());
}

#[test]
fn malformed_html_still_parses() {
    let html = "<p>unclosed first<p>second <em>with markup";
    let paragraphs = extract_paragraphs(html);
    assert_eq!(paragraphs, vec!["unclosed first", "second with markup"]);
}

#[test]
fn non_ascii_text_is_preserved() {
    let html = "<p>Café crème — naïve façade 🐈</p>";
    assert_eq!(extract_paragraphs(html), vec!["Café crème — naïve façade 🐈"]);
}

#[test]
fn normalize_whitespace_handles_unicode_spaces() {
    assert_eq!(normalize_whitespace("a\u{00a0}\u{2003}b"), "a b");
}

// ============================================================
// Content gate
// ============================================================

#[test]
fn empty_paragraph_does_not_count() {
    let documents: Vec<String> = ["Cats are mammals.", "Dogs are mammals too.", ""]
        .iter()
        .map(|s| s.to_string())
        .collect();

    assert!(has_enough_content(&documents));
    assert_eq!(
        documents.iter().filter(|d| !d.trim().is_empty()).count(),
        MIN_DOCUMENTS
    );
}

#[test]
fn single_paragraph_is_not_enough() {
    let documents = extract_paragraphs("<p>Just one paragraph here.</p><p>  </p>");
    assert_eq!(documents.len(), 1);
    assert!(!has_enough_content(&documents));
}

// ============================================================
// PageClient
// ============================================================

#[tokio::test]
async fn invalid_url_fails_before_any_request() {
    let client = PageClient::new().unwrap();
    let err = client.fetch_paragraphs("not a url").await.unwrap_err();
    assert!(err.to_string().contains("Invalid URL"), "got: {err}");
}
