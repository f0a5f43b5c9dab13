//! Platform-specific strategy for frame-based blog platforms with
//! anti-scraping barriers.
//!
//! The platform serves articles inside a `mainFrame` iframe and blocks plain
//! HTTP scraping, so this strategy renders pages with a headless browser and
//! extracts the article from known editor containers. When rendering fails or
//! no browser is available it falls back to the generic reader strategy; both
//! paths are cleaned identically, so callers can only tell them apart by the
//! result's `method` tag.

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::{Arc, LazyLock};
use thiserror::Error;

use super::{FetchMethod, FetchResult, FetchStrategy};
use crate::text::{self, PlatformHint};

/// Selectors holding the article body, newest editor version first.
const BODY_SELECTORS: &[&str] = &[".se-main-container", "#postViewArea", ".se_component_wrap"];
/// Selectors holding the article title.
const TITLE_SELECTORS: &[&str] = &[".se-title-text", ".se_title", ".pcol1", "title"];

static SCRIPT_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|button)[^>]*>.*?</(script|style|button)>")
        .unwrap_or_else(|_| unreachable!())
});

/// A rendering failure from the headless browser boundary.
#[derive(Debug, Clone, Error)]
#[error("browser render failed: {0}")]
pub struct RenderError(pub String);

/// Boundary to an automated headless browser.
///
/// Returns the fully rendered HTML of a page. Implementations are expected to
/// bound rendering with their own timeout and report stalls as errors.
#[async_trait]
pub trait BrowserRenderer: Send + Sync {
    /// Renders a page and returns its HTML.
    async fn render(&self, url: &str) -> Result<String, RenderError>;
}

/// A renderer for deployments without a browser; always fails, which routes
/// every platform fetch through the reader fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRenderer;

#[async_trait]
impl BrowserRenderer for UnavailableRenderer {
    async fn render(&self, _url: &str) -> Result<String, RenderError> {
        Err(RenderError("browser rendering is not available".to_string()))
    }
}

/// Canonical identity of a platform post.
///
/// At least three URL shapes normalize to the same key:
/// `blog.naver.com/{blog_id}/{log_no}`, the mobile `m.blog.naver.com`
/// variant, and the query form `PostView.naver?blogId=&logNo=`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostKey {
    /// The blog (collection) identifier.
    pub blog_id: String,
    /// The numeric post (item) identifier.
    pub log_no: String,
}

impl PostKey {
    /// Parses a URL into its canonical post key, if it is a platform URL.
    #[must_use]
    pub fn parse(url: &str) -> Option<Self> {
        let parsed = reqwest::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        if host != "blog.naver.com" && host != "m.blog.naver.com" {
            return None;
        }

        let path = parsed.path().trim_matches('/');
        if path.starts_with("PostView.naver") || path.starts_with("PostView.nhn") {
            let mut blog_id = None;
            let mut log_no = None;
            for (key, value) in parsed.query_pairs() {
                match key.as_ref() {
                    "blogId" => blog_id = Some(value.into_owned()),
                    "logNo" => log_no = Some(value.into_owned()),
                    _ => {}
                }
            }
            return Some(Self {
                blog_id: blog_id?,
                log_no: log_no?,
            });
        }

        let mut segments = path.split('/');
        let blog_id = segments.next()?.to_string();
        let log_no = segments.next()?.to_string();
        if segments.next().is_some() || blog_id.is_empty() {
            return None;
        }
        if !log_no.chars().all(|c| c.is_ascii_digit()) || log_no.is_empty() {
            return None;
        }
        Some(Self { blog_id, log_no })
    }

    /// The desktop post-view URL for this key.
    #[must_use]
    pub fn post_view_url(&self) -> String {
        format!(
            "https://blog.naver.com/PostView.naver?blogId={}&logNo={}",
            self.blog_id, self.log_no
        )
    }
}

/// Fetches platform posts via browser rendering with a reader fallback.
pub struct PlatformStrategy {
    renderer: Arc<dyn BrowserRenderer>,
    reader: Arc<dyn FetchStrategy>,
}

impl PlatformStrategy {
    /// Creates a platform strategy.
    #[must_use]
    pub fn new(renderer: Arc<dyn BrowserRenderer>, reader: Arc<dyn FetchStrategy>) -> Self {
        Self { renderer, reader }
    }

    async fn fetch_rendered(&self, key: &PostKey) -> Result<(Option<String>, String), RenderError> {
        let html = self.renderer.render(&key.post_view_url()).await?;
        if let Some(extracted) = extract_article(&html) {
            return Ok(extracted);
        }

        // Older pages only carry the article inside the mainFrame document.
        if let Some(frame_url) = main_frame_url(&html) {
            let frame_html = self.renderer.render(&frame_url).await?;
            if let Some(extracted) = extract_article(&frame_html) {
                return Ok(extracted);
            }
        }

        Err(RenderError("no article container found in rendered page".to_string()))
    }

    async fn fallback(&self, url: &str, render_error: &RenderError) -> FetchResult {
        tracing::debug!(url, error = %render_error, "falling back to reader strategy");
        let mut result = self.reader.fetch(url).await.with_method(FetchMethod::ReaderFallback);
        // Both paths are cleaned identically.
        if let Some(content) = result.content.take() {
            let cleaned = text::clean(&content, Some(PlatformHint::Naver));
            result.word_count = Some(cleaned.split_whitespace().count());
            result.content = Some(cleaned);
        }
        result
    }
}

#[async_trait]
impl FetchStrategy for PlatformStrategy {
    fn name(&self) -> &'static str {
        "platform"
    }

    async fn fetch(&self, url: &str) -> FetchResult {
        let Some(key) = PostKey::parse(url) else {
            return FetchResult::failed(
                url,
                FetchMethod::BrowserRender,
                "not a recognized platform URL",
            );
        };

        match self.fetch_rendered(&key).await {
            Ok((title, body)) => {
                let cleaned = text::extract_main_content(&text::clean(&body, Some(PlatformHint::Naver)));
                if cleaned.trim().is_empty() {
                    let err = RenderError("rendered page produced no content".to_string());
                    return self.fallback(url, &err).await;
                }
                FetchResult::ok(url, FetchMethod::BrowserRender, title, cleaned)
            }
            Err(render_error) => self.fallback(url, &render_error).await,
        }
    }
}

/// Extracts (title, body text) from rendered HTML using known containers.
fn extract_article(html: &str) -> Option<(Option<String>, String)> {
    let stripped = SCRIPT_STYLE.replace_all(html, "");
    let document = Html::parse_document(&stripped);

    let body = BODY_SELECTORS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        let element = document.select(&selector).next()?;
        let body = element.text().collect::<Vec<_>>().join("\n");
        if body.trim().is_empty() {
            None
        } else {
            Some(body)
        }
    })?;

    let title = TITLE_SELECTORS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        let element = document.select(&selector).next()?;
        let title = element.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            None
        } else {
            Some(title)
        }
    });

    Some((title, body))
}

/// Finds the `mainFrame` iframe target in a rendered outer page.
fn main_frame_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("iframe#mainFrame, frame#mainFrame").ok()?;
    let src = document.select(&selector).next()?.value().attr("src")?;
    if src.starts_with("http") {
        Some(src.to_string())
    } else {
        Some(format!("https://blog.naver.com{src}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(blog_id: &str, log_no: &str) -> PostKey {
        PostKey {
            blog_id: blog_id.to_string(),
            log_no: log_no.to_string(),
        }
    }

    #[test]
    fn test_post_key_three_url_forms_normalize_identically() {
        let expected = key("traveler", "223344556677");
        let forms = [
            "https://blog.naver.com/traveler/223344556677",
            "https://m.blog.naver.com/traveler/223344556677",
            "https://blog.naver.com/PostView.naver?blogId=traveler&logNo=223344556677",
        ];
        for form in forms {
            assert_eq!(PostKey::parse(form), Some(expected.clone()), "{form}");
        }
    }

    #[test]
    fn test_post_key_legacy_query_form() {
        let parsed = PostKey::parse(
            "https://blog.naver.com/PostView.nhn?blogId=writer&logNo=123&redirect=Dlog",
        );
        assert_eq!(parsed, Some(key("writer", "123")));
    }

    #[test]
    fn test_post_key_rejects_foreign_urls() {
        assert_eq!(PostKey::parse("https://example.com/a/123"), None);
        assert_eq!(PostKey::parse("https://blog.naver.com/onlyblogid"), None);
        assert_eq!(PostKey::parse("https://blog.naver.com/x/notdigits"), None);
        assert_eq!(PostKey::parse("not a url"), None);
    }

    #[test]
    fn test_extract_article_from_smart_editor_container() {
        let html = r#"<html><head><title>Outer</title></head><body>
            <div class="se-title-text">여행기 제목</div>
            <script>var tracking = 1;</script>
            <div class="se-main-container">
                <p>본문 첫 단락입니다 여기에 충분히 긴 내용이 들어갑니다</p>
                <p>본문 둘째 단락입니다 역시 충분히 긴 내용이 들어갑니다</p>
            </div></body></html>"#;
        let (title, body) = extract_article(html).expect("article");
        assert_eq!(title.as_deref(), Some("여행기 제목"));
        assert!(body.contains("첫 단락"));
        assert!(!body.contains("tracking"));
    }

    #[test]
    fn test_extract_article_none_without_containers() {
        assert!(extract_article("<html><body><div>nothing here</div></body></html>").is_none());
    }

    #[test]
    fn test_main_frame_url_resolves_relative_src() {
        let html = r#"<html><body><iframe id="mainFrame" src="/PostView.naver?blogId=a&logNo=1"></iframe></body></html>"#;
        assert_eq!(
            main_frame_url(html),
            Some("https://blog.naver.com/PostView.naver?blogId=a&logNo=1".to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_reader_when_browser_unavailable() {
        struct StubReader;
        #[async_trait]
        impl FetchStrategy for StubReader {
            fn name(&self) -> &'static str {
                "stub"
            }
            async fn fetch(&self, url: &str) -> FetchResult {
                FetchResult::ok(
                    url,
                    FetchMethod::Reader,
                    Some("Stub Title".to_string()),
                    "recovered article content from the reader path".to_string(),
                )
            }
        }

        let strategy = PlatformStrategy::new(Arc::new(UnavailableRenderer), Arc::new(StubReader));
        let result = strategy.fetch("https://blog.naver.com/traveler/223344556677").await;
        assert!(result.success);
        assert_eq!(result.method, FetchMethod::ReaderFallback);
        assert_eq!(result.title.as_deref(), Some("Stub Title"));
    }

    #[tokio::test]
    async fn test_fetch_uses_rendered_html_when_available() {
        struct StubRenderer;
        #[async_trait]
        impl BrowserRenderer for StubRenderer {
            async fn render(&self, _url: &str) -> Result<String, RenderError> {
                Ok(r#"<html><body>
                    <div class="se-title-text">Rendered Title</div>
                    <div class="se-main-container">
                        <p>rendered body paragraph with plenty of words inside it</p>
                    </div></body></html>"#
                    .to_string())
            }
        }
        struct PanicReader;
        #[async_trait]
        impl FetchStrategy for PanicReader {
            fn name(&self) -> &'static str {
                "panic"
            }
            async fn fetch(&self, url: &str) -> FetchResult {
                FetchResult::failed(url, FetchMethod::Reader, "should not be called")
            }
        }

        let strategy = PlatformStrategy::new(Arc::new(StubRenderer), Arc::new(PanicReader));
        let result = strategy.fetch("https://blog.naver.com/traveler/223344556677").await;
        assert!(result.success);
        assert_eq!(result.method, FetchMethod::BrowserRender);
        assert_eq!(result.title.as_deref(), Some("Rendered Title"));
    }
}
