//! Quality heuristics: naturalness scoring, SEO scoring, reading time.
//!
//! Every check here is advisory. Scores feed article metadata and the
//! writer/editor revision loop; a bad score never fails a job.

use regex::Regex;
use std::sync::LazyLock;

/// Naturalness scores at or above this fail the check.
pub const NATURALNESS_THRESHOLD: u8 = 50;

static MARKDOWN_MARKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#+\s|\*\*|\*|`{1,3}").unwrap_or_else(|_| unreachable!()));
static SENTENCE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?。]\s*").unwrap_or_else(|_| unreachable!()));

/// Stock phrases machine-written text leans on.
const STOCK_PHRASES: &[&str] = &[
    "중요합니다",
    "필수적입니다",
    "핵심입니다",
    "이러한",
    "따라서",
    "결론적으로",
    "요약하자면",
    "이를 통해",
    "알아보겠습니다",
    "살펴보겠습니다",
    "마무리하며",
    "정리하자면",
    "it is important to note",
    "in conclusion",
    "in summary",
    "delve into",
];

/// Passive-voice markers (Korean verbal endings).
const PASSIVE_MARKERS: &[&str] = &["되었", "됩니다", "되며", "되어", "된다", "받았", "받습니다"];

const TRANSITION_WORDS: &[&str] = &[
    "또한",
    "그러나",
    "하지만",
    "따라서",
    "그리고",
    "더불어",
    "뿐만 아니라",
    "결과적으로",
    "마찬가지로",
    "반면에",
    "게다가",
    "furthermore",
    "moreover",
    "additionally",
];

const GENERIC_PHRASES: &[&str] = &[
    "많은 사람들이",
    "일반적으로",
    "대부분의 경우",
    "흔히",
    "보통",
    "대체로",
    "전반적으로",
    "many people",
    "in general",
];

/// A heuristic quality report with a 0–100 score and human-readable issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityReport {
    /// Aggregate score. Meaning depends on the check that produced it.
    pub score: u8,
    /// Human-readable findings.
    pub issues: Vec<String>,
}

impl QualityReport {
    fn clean() -> Self {
        Self {
            score: 0,
            issues: Vec::new(),
        }
    }
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.match_indices(needle).count()
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_score(value: f64) -> u8 {
    value.clamp(0.0, 100.0) as u8
}

/// Scores how machine-written a text reads, 0 (natural) to 100.
///
/// Five signals, averaged: stock-phrase counts, sentence-start diversity,
/// sentence-length uniformity (coefficient of variation), transition-word
/// density, and generic-phrase counts. Texts under 100 characters or with
/// fewer than five sentences pass trivially.
#[must_use]
pub fn naturalness_report(content: &str) -> QualityReport {
    if content.chars().count() < 100 {
        return QualityReport::clean();
    }

    let text = MARKDOWN_MARKS.replace_all(content, "");
    let sentences: Vec<&str> = SENTENCE_SPLIT
        .split(&text)
        .map(str::trim)
        .filter(|s| s.chars().count() > 10)
        .collect();
    if sentences.len() < 5 {
        return QualityReport::clean();
    }

    let mut issues = Vec::new();
    let mut scores: Vec<f64> = Vec::new();

    let phrase_count = STOCK_PHRASES
        .iter()
        .filter(|p| content.contains(**p))
        .count();
    let phrase_score = (phrase_count * 8).min(100) as f64;
    scores.push(phrase_score);
    if phrase_score > 40.0 {
        issues.push(format!("overuses stock phrasing ({phrase_count} phrases)"));
    }

    let starts: Vec<String> = sentences
        .iter()
        .map(|s| s.chars().take(10).collect::<String>())
        .collect();
    let unique = {
        let mut sorted = starts.clone();
        sorted.sort();
        sorted.dedup();
        sorted.len()
    };
    #[allow(clippy::cast_precision_loss)]
    let diversity = unique as f64 / starts.len() as f64;
    scores.push((1.0 - diversity) * 100.0);
    if diversity < 0.6 {
        issues.push(format!(
            "repetitive sentence openings (diversity {:.0}%)",
            diversity * 100.0
        ));
    }

    let passive_count: usize = PASSIVE_MARKERS
        .iter()
        .map(|m| count_occurrences(content, m))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let passive_ratio = passive_count as f64 / sentences.len() as f64;
    scores.push((passive_ratio * 50.0).min(100.0));
    if passive_ratio > 0.5 {
        issues.push(format!("heavy passive voice ({passive_ratio:.1} per sentence)"));
    }

    let lengths: Vec<f64> = sentences
        .iter()
        .map(|s| {
            #[allow(clippy::cast_precision_loss)]
            let len = s.chars().count() as f64;
            len
        })
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
    if lengths.len() > 3 && mean > 0.0 {
        #[allow(clippy::cast_precision_loss)]
        let variance = lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lengths.len() as f64;
        let cv = variance.sqrt() / mean;
        scores.push((1.0 - cv.min(1.0)) * 60.0);
        if cv < 0.3 {
            issues.push(format!("uniform sentence lengths (cv {cv:.2})"));
        }
    }

    let transition_count: usize = TRANSITION_WORDS
        .iter()
        .map(|t| count_occurrences(content, t))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let transition_ratio = transition_count as f64 / sentences.len() as f64;
    scores.push((transition_ratio * 40.0).min(100.0));
    if transition_ratio > 0.7 {
        issues.push(format!(
            "transition words on most sentences ({transition_ratio:.1} per sentence)"
        ));
    }

    let generic_count: usize = GENERIC_PHRASES
        .iter()
        .map(|g| count_occurrences(content, g))
        .sum();
    scores.push(((generic_count * 15).min(100)) as f64);
    if generic_count > 3 {
        issues.push(format!("generic hedging phrases ({generic_count})"));
    }

    #[allow(clippy::cast_precision_loss)]
    let average = scores.iter().sum::<f64>() / scores.len() as f64;
    QualityReport {
        score: clamp_score(average),
        issues,
    }
}

/// Whether a naturalness score passes the revision threshold.
#[must_use]
pub const fn naturalness_passes(score: u8) -> bool {
    score < NATURALNESS_THRESHOLD
}

/// Scores basic SEO signals of a finished article, 0–100 (higher is better).
#[must_use]
pub fn seo_report(content: &str, keywords: &[String], title: &str, meta_description: &str) -> QualityReport {
    let mut scores: Vec<f64> = Vec::new();
    let mut issues = Vec::new();

    let content_lower = content.to_lowercase();
    let mut total_keyword_hits = 0usize;
    for keyword in keywords {
        let count = count_occurrences(&content_lower, &keyword.to_lowercase());
        total_keyword_hits += count;
        if count < 3 {
            issues.push(format!("keyword '{keyword}' appears only {count} times"));
        }
    }
    let word_count = content.split_whitespace().count();
    #[allow(clippy::cast_precision_loss)]
    let density = if word_count == 0 {
        0.0
    } else {
        total_keyword_hits as f64 / word_count as f64 * 100.0
    };
    scores.push((density * 20.0).min(100.0));

    let title_lower = title.to_lowercase();
    let title_hits = keywords
        .iter()
        .filter(|k| title_lower.contains(&k.to_lowercase()))
        .count();
    scores.push(((title_hits * 50).min(100)) as f64);
    if title_hits == 0 && !keywords.is_empty() {
        issues.push("title contains no keyword".to_string());
    }

    let title_len = title.chars().count();
    scores.push(match title_len {
        50..=60 => 100.0,
        40..=70 => 80.0,
        _ => {
            issues.push(format!("title length {title_len} outside 50-60 chars"));
            50.0
        }
    });

    if meta_description.is_empty() {
        issues.push("missing meta description".to_string());
        scores.push(0.0);
    } else {
        let meta_len = meta_description.chars().count();
        scores.push(match meta_len {
            120..=160 => 100.0,
            100..=170 => 80.0,
            _ => {
                issues.push(format!("meta description length {meta_len} outside 120-160 chars"));
                50.0
            }
        });
    }

    let heading_count = count_occurrences(content, "## ") + count_occurrences(content, "### ");
    scores.push(((heading_count * 20).min(100)) as f64);
    if count_occurrences(content, "## ") < 3 {
        issues.push("fewer than 3 subheadings".to_string());
    }

    let content_len = content.chars().count();
    scores.push(match content_len {
        2000.. => 100.0,
        1500..=1999 => 80.0,
        1000..=1499 => 60.0,
        _ => {
            issues.push(format!("content length {content_len} under 1500 chars"));
            40.0
        }
    });

    #[allow(clippy::cast_precision_loss)]
    let average = scores.iter().sum::<f64>() / scores.len() as f64;
    QualityReport {
        score: clamp_score(average),
        issues,
    }
}

/// Estimated reading time in minutes, minimum 1.
///
/// Dense scripts read at roughly 400 characters per minute; space-delimited
/// text at roughly 200 words per minute.
#[must_use]
pub fn reading_time_minutes(content: &str) -> u32 {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let total = compact.chars().count();
    if total == 0 {
        return 1;
    }
    let hangul = compact
        .chars()
        .filter(|c| matches!(c, '\u{ac00}'..='\u{d7a3}'))
        .count();

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let minutes = if hangul as f64 / total as f64 > 0.3 {
        (total as f64 / 400.0).round() as u32
    } else {
        (content.split_whitespace().count() as f64 / 200.0).round() as u32
    };
    minutes.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_passes_trivially() {
        let report = naturalness_report("too short to judge");
        assert_eq!(report.score, 0);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_repetitive_text_scores_high() {
        let sentence =
            "이것은 중요합니다 그리고 또한 필수적입니다 따라서 결론적으로 요약하자면 핵심입니다 이를 통해 됩니다 이러한 알아보겠습니다. ";
        let content = sentence.repeat(10);
        let report = naturalness_report(&content);
        assert!(report.score >= NATURALNESS_THRESHOLD, "score {}", report.score);
        assert!(!report.issues.is_empty());
    }

    #[test]
    fn test_varied_text_scores_low() {
        let content = "\
아침 일찍 제주 공항에 도착했다. 공기부터 달랐다. \
렌터카를 빌려 동쪽 해안도로를 천천히 달렸는데, 창문 너머 바다 색이 계속 바뀌었다. \
점심은 작은 국숫집에서 해결했다. 주인 할머니가 직접 뽑은 면이라고 했다. \
오후에는 오름 하나를 올랐다. 숨이 찼지만 정상에서 본 풍경은 그만한 값을 했다. \
저녁 무렵 숙소로 돌아와 일기를 썼다. 내일은 서쪽으로 가 볼 생각이다. \
여행이란 결국 계획보다 우연이 만드는 것 아닐까.";
        let report = naturalness_report(content);
        assert!(naturalness_passes(report.score), "score {}", report.score);
    }

    #[test]
    fn test_score_bounded() {
        let worst = "중요합니다 필수적입니다 핵심입니다 따라서 결론적으로 요약하자면 이를 통해 알아보겠습니다. ".repeat(30);
        let report = naturalness_report(&worst);
        assert!(report.score <= 100);
    }

    #[test]
    fn test_seo_report_flags_missing_signals() {
        let report = seo_report("short body", &["rust".to_string()], "tiny", "");
        assert!(report.issues.iter().any(|i| i.contains("meta description")));
        assert!(report.issues.iter().any(|i| i.contains("keyword 'rust'")));
        assert!(report.score <= 100);
    }

    #[test]
    fn test_seo_report_rewards_structure() {
        let body = format!(
            "rust is great. rust is fast. rust is safe.\n## Section one\n## Section two\n## Section three\n{}",
            "padding content for length ".repeat(100)
        );
        let title = "Why rust keeps winning over systems programmers in 2026";
        let meta = "A practical look at why rust adoption keeps growing, covering tooling, safety, performance, and the ecosystem around it today.";
        let report = seo_report(&body, &["rust".to_string()], title, meta);
        assert!(report.score > 50, "score {}", report.score);
    }

    #[test]
    fn test_reading_time_minimum_one() {
        assert_eq!(reading_time_minutes(""), 1);
        assert_eq!(reading_time_minutes("short"), 1);
    }

    #[test]
    fn test_reading_time_dense_script() {
        // 1200 Hangul chars at 400 chars/min is 3 minutes.
        let content = "가".repeat(1200);
        assert_eq!(reading_time_minutes(&content), 3);
    }

    #[test]
    fn test_reading_time_sparse_script() {
        // 600 words at 200 words/min is 3 minutes.
        let content = "word ".repeat(600);
        assert_eq!(reading_time_minutes(&content), 3);
    }
}
