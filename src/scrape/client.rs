// HTTP client for the single page fetch.
//
// A thin reqwest wrapper: one GET, body as text. No retry, no timeout;
// any transport failure ends the run.

use anyhow::{Context, Result};
use reqwest::Url;
use tracing::{debug, info, warn};

use super::paragraphs::extract_paragraphs;

const USER_AGENT: &str = concat!("pagetopics/", env!("CARGO_PKG_VERSION"));

/// Fetches a page and hands back its paragraph texts.
pub struct PageClient {
    client: reqwest::Client,
}

impl PageClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// GET the page and return the response body as text.
    ///
    /// A non-success status is logged but not treated as an error: whatever
    /// body came back is still handed to the parser.
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url).with_context(|| format!("Invalid URL: {url}"))?;

        debug!(url = %parsed, "GET page");

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .with_context(|| format!("Failed to fetch {parsed}"))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, url = %parsed, "Page returned a non-success status");
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {parsed}"))
    }

    /// Fetch the page and extract its non-empty paragraph texts.
    pub async fn fetch_paragraphs(&self, url: &str) -> Result<Vec<String>> {
        let html = self.fetch_html(url).await?;
        let paragraphs = extract_paragraphs(&html);

        info!(
            bytes = html.len(),
            paragraphs = paragraphs.len(),
            "Extracted paragraph text"
        );

        Ok(paragraphs)
    }
}
