//! Generic reader strategy: a third-party "URL to clean text" service.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::{FetchMethod, FetchResult, FetchStrategy, DEFAULT_FETCH_TIMEOUT};
use crate::text;

const DEFAULT_READER_BASE: &str = "https://r.jina.ai/";

/// Markdown punctuation stripped before counting words.
static MARKDOWN_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#*_`>\[\]()!|~-]").unwrap_or_else(|_| unreachable!()));

/// Fetches any URL through a reader service that converts pages to markdown.
///
/// An optional credential raises the service's rate limits; without one the
/// anonymous tier is used.
pub struct ReaderStrategy {
    client: reqwest::Client,
    base_url: String,
    credential: Option<String>,
}

impl ReaderStrategy {
    /// Creates a reader strategy against the default service endpoint.
    #[must_use]
    pub fn new(credential: Option<String>) -> Self {
        Self::with_base_url(DEFAULT_READER_BASE, credential)
    }

    /// Creates a reader strategy against a specific endpoint (used in tests).
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>, credential: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            credential,
        }
    }

    async fn request(&self, url: &str) -> Result<String, String> {
        let endpoint = format!("{}{url}", self.base_url);
        let mut request = self
            .client
            .get(&endpoint)
            .header(reqwest::header::ACCEPT, "text/plain");
        if let Some(token) = &self.credential {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(describe_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("reader service returned {status}"));
        }
        response.text().await.map_err(describe_reqwest_error)
    }
}

fn describe_reqwest_error(err: reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out after {}s", DEFAULT_FETCH_TIMEOUT.as_secs())
    } else {
        err.to_string()
    }
}

/// Extracts a title from the reader service's markdown output: either a
/// `Title:` header line or the first top-level heading.
fn extract_title(markdown: &str) -> Option<String> {
    for line in markdown.lines().take(20) {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Title:") {
            let title = rest.trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
        if let Some(rest) = line.strip_prefix("# ") {
            let title = rest.trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
    }
    None
}

/// Word count over markdown with its punctuation stripped.
fn markdown_word_count(markdown: &str) -> usize {
    MARKDOWN_PUNCT
        .replace_all(markdown, " ")
        .split_whitespace()
        .count()
}

#[async_trait]
impl FetchStrategy for ReaderStrategy {
    fn name(&self) -> &'static str {
        "reader"
    }

    async fn fetch(&self, url: &str) -> FetchResult {
        match self.request(url).await {
            Ok(markdown) => {
                let title = extract_title(&markdown);
                let content = text::clean(&markdown, None);
                if content.trim().is_empty() {
                    return FetchResult::failed(url, FetchMethod::Reader, "empty page content");
                }
                let word_count = markdown_word_count(&content);
                let mut result = FetchResult::ok(url, FetchMethod::Reader, title, content);
                result.word_count = Some(word_count);
                result
            }
            Err(error) => {
                tracing::warn!(url, %error, "reader fetch failed");
                FetchResult::failed(url, FetchMethod::Reader, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title_from_header_line() {
        let md = "Title: A Great Post\nURL Source: https://x\n\nbody";
        assert_eq!(extract_title(md), Some("A Great Post".to_string()));
    }

    #[test]
    fn test_extract_title_from_heading() {
        let md = "some preamble\n# Heading Title\nbody text";
        assert_eq!(extract_title(md), Some("Heading Title".to_string()));
    }

    #[test]
    fn test_extract_title_absent() {
        assert_eq!(extract_title("just body text\nwith no headings"), None);
    }

    #[test]
    fn test_markdown_word_count_strips_punctuation() {
        let md = "## Heading\n\n**bold** and *italic* text [link](url)";
        // heading, bold, and, italic, text, link, url
        assert_eq!(markdown_word_count(md), 7);
    }
}
