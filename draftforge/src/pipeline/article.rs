//! The finished article artifact and its derived metadata.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Maximum excerpt length in characters.
const EXCERPT_LIMIT: usize = 200;
/// Hashtag lists are padded up to this count from a generic pool.
pub const HASHTAG_TARGET: usize = 30;

/// Generic hashtags used to pad short editor-provided lists.
const GENERIC_HASHTAGS: &[&str] = &[
    "#블로그",
    "#정보",
    "#팁",
    "#가이드",
    "#트렌드",
    "#인사이트",
    "#콘텐츠",
    "#지식공유",
    "#유용한정보",
    "#꿀팁",
    "#추천",
    "#리뷰",
    "#소개",
    "#분석",
    "#전문가",
    "#실전",
    "#노하우",
    "#핵심정리",
];

/// One question/answer pair for the article's FAQ block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    /// The question.
    pub question: String,
    /// A short answer.
    pub answer: String,
}

/// Derived metadata attached to a finished article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    /// Request locale.
    pub locale: String,
    /// Caller-supplied tags.
    pub tags: Vec<String>,
    /// Extra SEO keywords discovered during analysis.
    pub seo_keywords: Vec<String>,
    /// Meta description for the page head.
    pub meta_description: String,
    /// FAQ pairs.
    pub faq: Vec<FaqEntry>,
    /// Estimated reading time in minutes.
    pub reading_time_minutes: u32,
    /// SEO heuristic score, 0-100 (higher is better).
    pub seo_score: u8,
    /// SEO findings.
    pub seo_issues: Vec<String>,
    /// Naturalness heuristic score, 0-100 (lower is better).
    pub naturalness_score: u8,
    /// Naturalness findings.
    pub naturalness_issues: Vec<String>,
    /// Editorial notes recorded during the editing pass, such as structural
    /// heading replacements.
    #[serde(default)]
    pub quality_notes: Vec<String>,
    /// Set when the revision loop exhausted its iterations without passing.
    pub quality_warning: bool,
    /// How many writer/editor iterations were used.
    pub iterations_used: u32,
}

/// The finished content artifact persisted on job completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Final title.
    pub title: String,
    /// URL slug, unique per store.
    pub slug: String,
    /// Markdown body.
    pub content: String,
    /// Short plain-text excerpt.
    pub excerpt: String,
    /// Hashtags, padded to [`HASHTAG_TARGET`].
    pub hashtags: Vec<String>,
    /// Derived metadata.
    pub metadata: ArticleMetadata,
}

/// Derives a slug from a title or editor suggestion.
///
/// Lowercases, keeps `[a-z0-9]` and Hangul syllables, collapses everything
/// else to single hyphens, and appends a unix-timestamp suffix. The suffix is
/// a collision-avoidance policy, not a uniqueness guarantee; stores still
/// check for duplicates before persisting.
#[must_use]
pub fn slugify(base: &str) -> String {
    let mut slug = String::new();
    let mut pending_hyphen = false;
    for c in base.to_lowercase().chars() {
        let keep = c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '\u{ac00}'..='\u{d7a3}');
        if keep {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("post");
    }
    format!("{slug}-{}", Utc::now().timestamp())
}

/// Derives an excerpt from the body: first 300 characters with heading marks
/// removed, truncated to 197 + `...` when over the limit.
#[must_use]
pub fn derive_excerpt(content: &str) -> String {
    let head: String = content.chars().take(300).filter(|c| *c != '#').collect();
    let head = head.trim();
    if head.chars().count() > EXCERPT_LIMIT {
        let cut: String = head.chars().take(EXCERPT_LIMIT - 3).collect();
        format!("{}...", cut.trim_end())
    } else {
        head.to_string()
    }
}

/// Pads a hashtag list to [`HASHTAG_TARGET`] entries from the generic pool,
/// skipping duplicates, then truncates to the target.
#[must_use]
pub fn pad_hashtags(mut hashtags: Vec<String>) -> Vec<String> {
    for tag in GENERIC_HASHTAGS {
        if hashtags.len() >= HASHTAG_TARGET {
            break;
        }
        if !hashtags.iter().any(|t| t == tag) {
            hashtags.push((*tag).to_string());
        }
    }
    hashtags.truncate(HASHTAG_TARGET);
    hashtags
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strip_suffix(slug: &str) -> &str {
        slug.rsplit_once('-').map_or(slug, |(base, _)| base)
    }

    #[test]
    fn test_slugify_ascii() {
        let slug = slugify("Why Rust Keeps Winning!");
        assert_eq!(strip_suffix(&slug), "why-rust-keeps-winning");
    }

    #[test]
    fn test_slugify_keeps_hangul() {
        let slug = slugify("제주도 여행 코스 TOP 5");
        assert_eq!(strip_suffix(&slug), "제주도-여행-코스-top-5");
    }

    #[test]
    fn test_slugify_empty_falls_back() {
        let slug = slugify("!!!");
        assert!(slug.starts_with("post-"));
    }

    #[test]
    fn test_slugify_appends_numeric_suffix() {
        let slug = slugify("title");
        let (_, suffix) = slug.rsplit_once('-').unwrap();
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_excerpt_short_body_unchanged() {
        assert_eq!(derive_excerpt("# Title\nshort body"), "Title\nshort body");
    }

    #[test]
    fn test_excerpt_truncates_with_ellipsis() {
        let content = "가".repeat(400);
        let excerpt = derive_excerpt(&content);
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), 200);
    }

    #[test]
    fn test_pad_hashtags_fills_and_dedupes() {
        let padded = pad_hashtags(vec!["#블로그".to_string(), "#여행".to_string()]);
        assert_eq!(padded.len(), 19);
        assert_eq!(padded.iter().filter(|t| *t == "#블로그").count(), 1);
    }

    #[test]
    fn test_pad_hashtags_truncates_long_lists() {
        let long: Vec<String> = (0..40).map(|i| format!("#tag{i}")).collect();
        assert_eq!(pad_hashtags(long).len(), HASHTAG_TARGET);
    }
}
