//! Structured-API strategy for platforms that expose post content as JSON.
//!
//! Tistory-style blogs serve each numbered post through a lightweight JSON
//! endpoint alongside the HTML page. Hitting the endpoint skips rendering
//! entirely, but the returned content is HTML fragments, so the strategy
//! strips tags and decodes entities before the usual cleaning pass.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use super::{FetchMethod, FetchResult, FetchStrategy, DEFAULT_FETCH_TIMEOUT};
use crate::text::{self, PlatformHint};

const API_HOST_SUFFIX: &str = ".tistory.com";

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<[^>]+>").unwrap_or_else(|_| unreachable!()));
static BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(p|div|li|h[1-6]|blockquote|tr)>|<br\s*/?>")
        .unwrap_or_else(|_| unreachable!())
});
static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]{1,6}|\d{1,7});").unwrap_or_else(|_| unreachable!()));

/// Post payload returned by the platform's JSON endpoint.
#[derive(Debug, Deserialize)]
struct ApiPost {
    title: Option<String>,
    content: String,
}

/// Fetches numbered posts through the platform's JSON endpoint.
pub struct ApiStrategy {
    client: reqwest::Client,
    base_override: Option<String>,
}

impl Default for ApiStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiStrategy {
    /// Creates an API strategy against each blog's own endpoint.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_override: None,
        }
    }

    /// Redirects all API calls to a fixed base URL (used in tests).
    #[must_use]
    pub fn with_base_url(base: impl Into<String>) -> Self {
        let mut strategy = Self::new();
        strategy.base_override = Some(base.into());
        strategy
    }

    /// Whether a URL is a numbered post on a supported platform.
    #[must_use]
    pub fn matches(url: &str) -> bool {
        parse_post(url).is_some()
    }

    fn endpoint(&self, host: &str, entry: &str) -> String {
        match &self.base_override {
            Some(base) => format!("{base}/api/post/{entry}"),
            None => format!("https://{host}/api/post/{entry}"),
        }
    }

    async fn request(&self, host: &str, entry: &str) -> Result<ApiPost, String> {
        let response = self
            .client
            .get(self.endpoint(host, entry))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("content API returned {status}"));
        }
        response
            .json::<ApiPost>()
            .await
            .map_err(|e| format!("malformed API response: {e}"))
    }
}

/// Splits a URL into (host, numeric entry id) when it is a numbered post.
fn parse_post(url: &str) -> Option<(String, String)> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if !host.ends_with(API_HOST_SUFFIX) || host == API_HOST_SUFFIX.trim_start_matches('.') {
        return None;
    }
    let mut segments = parsed.path().trim_matches('/').split('/');
    let entry = segments.next()?;
    if segments.next().is_some() || entry.is_empty() {
        return None;
    }
    if !entry.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((host.to_string(), entry.to_string()))
}

/// Replaces block-level tags with newlines and drops every other tag.
#[must_use]
pub fn strip_tags(html: &str) -> String {
    let with_breaks = BLOCK_END.replace_all(html, "\n");
    TAG.replace_all(&with_breaks, "").into_owned()
}

/// Decodes the common named entities plus numeric `&#NNN;` / `&#xHH;` forms.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    let decoded = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let body = &caps[1];
        let value = if let Some(hex) = body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            body.parse::<u32>().ok()
        };
        value
            .and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), |c| c.to_string())
    });

    decoded
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[async_trait]
impl FetchStrategy for ApiStrategy {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn fetch(&self, url: &str) -> FetchResult {
        let Some((host, entry)) = parse_post(url) else {
            return FetchResult::failed(url, FetchMethod::PlatformApi, "not a numbered post URL");
        };

        match self.request(&host, &entry).await {
            Ok(post) => {
                let content = text::clean(
                    &decode_entities(&strip_tags(&post.content)),
                    Some(PlatformHint::Tistory),
                );
                if content.trim().is_empty() {
                    return FetchResult::failed(url, FetchMethod::PlatformApi, "empty post content");
                }
                FetchResult::ok(url, FetchMethod::PlatformApi, post.title, content)
            }
            Err(error) => {
                tracing::warn!(url, %error, "content API fetch failed");
                FetchResult::failed(url, FetchMethod::PlatformApi, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_matches_numbered_posts_only() {
        assert!(ApiStrategy::matches("https://someone.tistory.com/42"));
        assert!(ApiStrategy::matches("https://someone.tistory.com/42/"));
        assert!(!ApiStrategy::matches("https://someone.tistory.com/entry/slug-title"));
        assert!(!ApiStrategy::matches("https://tistory.com/42"));
        assert!(!ApiStrategy::matches("https://example.com/42"));
    }

    #[test]
    fn test_strip_tags_keeps_block_boundaries() {
        let html = "<p>first paragraph</p><p>second <b>bold</b> paragraph</p>";
        assert_eq!(strip_tags(html), "first paragraph\nsecond bold paragraph\n");
    }

    #[test]
    fn test_strip_tags_handles_br_and_attributes() {
        let html = r#"line one<br/>line two<div class="x">line three</div>"#;
        assert_eq!(strip_tags(html), "line one\nline two\nline three\n");
    }

    #[test]
    fn test_decode_named_entities() {
        assert_eq!(
            decode_entities("a&nbsp;&lt;b&gt;&nbsp;&amp;&nbsp;&quot;c&quot;"),
            "a <b> & \"c\""
        );
    }

    #[test]
    fn test_decode_numeric_entities() {
        assert_eq!(decode_entities("&#44032;&#x b;"), "가&#x b;");
        assert_eq!(decode_entities("caf&#233; &#x2014; ok"), "café — ok");
    }

    #[test]
    fn test_decode_amp_last_avoids_double_decoding() {
        // "&amp;lt;" is a literal "&lt;" in the source, not a "<".
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }
}
