//! Source fetchers: interchangeable strategies for turning a URL into clean
//! article text.
//!
//! Strategies share one contract: [`FetchStrategy::fetch`] never fails at the
//! type level: every outcome, including timeouts and unreachable hosts, is
//! reported through [`FetchResult`] so callers can chain fallbacks without
//! exception-driven control flow. Strategy selection is URL-pattern-driven
//! and happens once per URL in [`FetchDispatcher::select`].

mod api;
mod platform;
mod reader;

pub use api::{decode_entities, strip_tags, ApiStrategy};
pub use platform::{BrowserRenderer, PlatformStrategy, PostKey, RenderError, UnavailableRenderer};
pub use reader::ReaderStrategy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default timeout for page fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Fixed fanout for batch fetching.
pub const BATCH_CONCURRENCY: usize = 5;
/// Pause between batch groups, to stay under upstream rate limits.
pub const BATCH_PAUSE: Duration = Duration::from_millis(1000);

/// Which path produced a fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMethod {
    /// The generic URL-to-text reader service.
    Reader,
    /// Headless browser rendering of a platform-specific page.
    BrowserRender,
    /// Reader service used as a fallback after browser rendering failed.
    ReaderFallback,
    /// A platform's structured content API.
    PlatformApi,
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader => write!(f, "reader"),
            Self::BrowserRender => write!(f, "browser_render"),
            Self::ReaderFallback => write!(f, "reader_fallback"),
            Self::PlatformApi => write!(f, "platform_api"),
        }
    }
}

/// The outcome of a single fetch. Consumed immediately by the pipeline stage
/// that requested it; never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    /// Whether usable content was extracted.
    pub success: bool,
    /// Page or article title, when one could be identified.
    pub title: Option<String>,
    /// Cleaned article text.
    pub content: Option<String>,
    /// Whitespace word count of the cleaned text.
    pub word_count: Option<usize>,
    /// The URL that was requested.
    pub url: String,
    /// Which strategy/path produced this result.
    pub method: FetchMethod,
    /// Human-readable failure description.
    pub error: Option<String>,
}

impl FetchResult {
    /// Creates a successful result.
    #[must_use]
    pub fn ok(
        url: impl Into<String>,
        method: FetchMethod,
        title: Option<String>,
        content: String,
    ) -> Self {
        let word_count = content.split_whitespace().count();
        Self {
            success: true,
            title,
            content: Some(content),
            word_count: Some(word_count),
            url: url.into(),
            method,
            error: None,
        }
    }

    /// Creates a failed result with a human-readable error.
    #[must_use]
    pub fn failed(url: impl Into<String>, method: FetchMethod, error: impl Into<String>) -> Self {
        Self {
            success: false,
            title: None,
            content: None,
            word_count: None,
            url: url.into(),
            method,
            error: Some(error.into()),
        }
    }

    /// Re-tags the result with a different method, preserving everything else.
    #[must_use]
    pub fn with_method(mut self, method: FetchMethod) -> Self {
        self.method = method;
        self
    }
}

/// One interchangeable method for turning a URL into clean text.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// A short identifier for logging.
    fn name(&self) -> &'static str;

    /// Fetches a URL. All failures are reported in the result, never raised.
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// Routes each URL to the strategy that matches its shape.
pub struct FetchDispatcher {
    reader: Arc<ReaderStrategy>,
    platform: Arc<PlatformStrategy>,
    api: Arc<ApiStrategy>,
}

impl FetchDispatcher {
    /// Creates a dispatcher over the three built-in strategies.
    #[must_use]
    pub fn new(
        reader: Arc<ReaderStrategy>,
        platform: Arc<PlatformStrategy>,
        api: Arc<ApiStrategy>,
    ) -> Self {
        Self {
            reader,
            platform,
            api,
        }
    }

    /// Creates a dispatcher with default strategies and no browser renderer.
    #[must_use]
    pub fn with_defaults() -> Self {
        let reader = Arc::new(ReaderStrategy::new(None));
        let platform = Arc::new(PlatformStrategy::new(
            Arc::new(UnavailableRenderer),
            reader.clone(),
        ));
        let api = Arc::new(ApiStrategy::new());
        Self::new(reader, platform, api)
    }

    /// Selects the strategy for a URL. Happens once per URL before dispatch.
    #[must_use]
    pub fn select(&self, url: &str) -> &dyn FetchStrategy {
        if PostKey::parse(url).is_some() {
            return self.platform.as_ref();
        }
        if ApiStrategy::matches(url) {
            return self.api.as_ref();
        }
        self.reader.as_ref()
    }

    /// Fetches a single URL via the selected strategy.
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let strategy = self.select(url);
        tracing::debug!(url, strategy = strategy.name(), "dispatching fetch");
        strategy.fetch(url).await
    }

    /// Fetches a list of URLs in fixed-size concurrency groups.
    ///
    /// Groups of [`BATCH_CONCURRENCY`] run concurrently; a short pause
    /// separates groups so upstream rate limits are not tripped. Results are
    /// returned in input order.
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<FetchResult> {
        let mut results = Vec::with_capacity(urls.len());
        for (index, group) in urls.chunks(BATCH_CONCURRENCY).enumerate() {
            if index > 0 {
                tokio::time::sleep(BATCH_PAUSE).await;
            }
            let batch = futures::future::join_all(group.iter().map(|url| self.fetch(url)));
            results.extend(batch.await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_result_ok_counts_words() {
        let result = FetchResult::ok(
            "https://example.com",
            FetchMethod::Reader,
            Some("Title".to_string()),
            "one two three".to_string(),
        );
        assert!(result.success);
        assert_eq!(result.word_count, Some(3));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_fetch_result_failed() {
        let result = FetchResult::failed("https://example.com", FetchMethod::Reader, "timeout");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("timeout"));
        assert!(result.content.is_none());
    }

    #[test]
    fn test_method_display() {
        assert_eq!(FetchMethod::Reader.to_string(), "reader");
        assert_eq!(FetchMethod::ReaderFallback.to_string(), "reader_fallback");
    }

    #[test]
    fn test_dispatcher_selects_by_url_shape() {
        let dispatcher = FetchDispatcher::with_defaults();
        assert_eq!(
            dispatcher.select("https://blog.naver.com/writer/223344556677").name(),
            "platform"
        );
        assert_eq!(
            dispatcher.select("https://someone.tistory.com/42").name(),
            "api"
        );
        assert_eq!(
            dispatcher.select("https://example.com/post").name(),
            "reader"
        );
    }
}
