//! Noise removal for scraped page text.

use regex::Regex;
use std::sync::LazyLock;

/// Which blog platform the raw text was scraped from.
///
/// A hint enables platform-specific noise passes on top of the generic ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformHint {
    /// Naver blog pages (frame-based editor chrome).
    Naver,
    /// Tistory blog pages.
    Tistory,
}

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").unwrap_or_else(|_| unreachable!()));
static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00a0}]{2,}").unwrap_or_else(|_| unreachable!()));

/// A line that is only a date, e.g. `2024. 3. 12.` or `2024-03-12`.
static DATE_ONLY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}[.\-/]\s?\d{1,2}[.\-/]\s?\d{1,2}\.?(\s?\d{1,2}:\d{2})?$")
        .unwrap_or_else(|_| unreachable!())
});

/// Breadcrumb trails like `Home > Category > Post`.
static BREADCRUMB_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^>\n]{1,30}(\s?>\s?[^>\n]{1,30}){1,5}$").unwrap_or_else(|_| unreachable!()));

/// Interaction-button labels on Naver blog pages.
const NAVER_NOISE: &[&str] = &[
    "공감",
    "댓글",
    "공유하기",
    "URL 복사",
    "URL복사",
    "이웃추가",
    "서로이웃",
    "신고하기",
    "블로그 홈",
    "프로필",
];

const TISTORY_NOISE: &[&str] = &["구독하기", "카테고리", "방명록", "티스토리툴바"];

/// Ad and sponsorship disclaimers, removed regardless of platform.
static SPONSOR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(제공\s?받아|원고료|협찬|광고\s?포함|sponsored|advertisement|paid partnership|affiliate link)",
    )
    .unwrap_or_else(|_| unreachable!())
});

/// Social-share button labels.
const SHARE_NOISE: &[&str] = &[
    "Share on Facebook",
    "Share on Twitter",
    "카카오스토리",
    "페이스북",
    "트위터",
    "밴드",
    "네이버 블로그 공유",
];

/// Generic navigation terms that only ever appear as chrome.
const NAV_NOISE: &[&str] = &[
    "Home",
    "Menu",
    "Login",
    "Sign up",
    "Subscribe",
    "로그인",
    "회원가입",
    "메뉴",
    "전체보기",
    "이전글",
    "다음글",
];

/// Removes platform noise from raw scraped text.
///
/// The passes run in a fixed order: newline/whitespace collapsing, then
/// platform-specific noise removal when a hint is given, then
/// platform-agnostic passes, then per-line trimming with blank-run collapse.
/// The result is stable under repeated application.
#[must_use]
pub fn clean(text: &str, hint: Option<PlatformHint>) -> String {
    if text.is_empty() {
        return String::new();
    }

    let collapsed = EXCESS_NEWLINES.replace_all(text, "\n\n");
    let collapsed = HORIZONTAL_WS.replace_all(&collapsed, " ");

    let mut out: Vec<&str> = Vec::new();
    let mut blank_pending = false;
    for raw in collapsed.lines() {
        let line = raw.trim();
        if line.is_empty() {
            blank_pending = !out.is_empty();
            continue;
        }
        if is_noise(line, hint) {
            continue;
        }
        if blank_pending {
            out.push("");
            blank_pending = false;
        }
        out.push(line);
    }

    out.join("\n")
}

fn is_noise(line: &str, hint: Option<PlatformHint>) -> bool {
    match hint {
        Some(PlatformHint::Naver) => {
            if is_label_line(line, NAVER_NOISE)
                || DATE_ONLY_LINE.is_match(line)
                || is_breadcrumb(line)
            {
                return true;
            }
        }
        Some(PlatformHint::Tistory) => {
            if is_label_line(line, TISTORY_NOISE) || DATE_ONLY_LINE.is_match(line) {
                return true;
            }
        }
        None => {}
    }

    SPONSOR_LINE.is_match(line)
        || is_label_line(line, SHARE_NOISE)
        || NAV_NOISE.iter().any(|term| line.eq_ignore_ascii_case(term))
}

/// A label line is short and starts with (or equals) a known widget label,
/// optionally followed by a count, e.g. `공감 12`.
fn is_label_line(line: &str, labels: &[&str]) -> bool {
    if line.chars().count() > 24 {
        return false;
    }
    labels.iter().any(|label| {
        line == *label
            || (line.starts_with(label)
                && line[label.len()..]
                    .trim()
                    .chars()
                    .all(|c| c.is_ascii_digit() || c == ','))
    })
}

fn is_breadcrumb(line: &str) -> bool {
    line.contains('>') && BREADCRUMB_LINE.is_match(line)
}

/// Returns the densest contiguous block of substantial lines.
///
/// Lines with more than five whitespace-separated tokens are grouped into
/// blocks; short lines break blocks. The block with the greatest total token
/// count wins, ties broken by first occurrence. When no substantial line
/// exists the trimmed input is returned unchanged (best effort).
#[must_use]
pub fn extract_main_content(text: &str) -> String {
    const MIN_TOKENS: usize = 5;

    let mut best: Option<(usize, Vec<&str>)> = None;
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;

    fn flush<'a>(
        current: &mut Vec<&'a str>,
        tokens: &mut usize,
        best: &mut Option<(usize, Vec<&'a str>)>,
    ) {
        if !current.is_empty() {
            let better = best.as_ref().map_or(true, |(t, _)| *tokens > *t);
            if better {
                *best = Some((*tokens, current.clone()));
            }
            current.clear();
            *tokens = 0;
        }
    }

    for line in text.lines() {
        let tokens = line.split_whitespace().count();
        if tokens > MIN_TOKENS {
            current.push(line.trim());
            current_tokens += tokens;
        } else {
            flush(&mut current, &mut current_tokens, &mut best);
        }
    }
    flush(&mut current, &mut current_tokens, &mut best);

    match best {
        Some((_, lines)) => lines.join("\n"),
        None => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_empty() {
        assert_eq!(clean("", None), "");
        assert_eq!(clean("", Some(PlatformHint::Naver)), "");
    }

    #[test]
    fn test_clean_collapses_newlines_and_whitespace() {
        let input = "first paragraph\n\n\n\n\nsecond   paragraph\t\twith tabs";
        let out = clean(input, None);
        assert_eq!(out, "first paragraph\n\nsecond paragraph with tabs");
    }

    #[test]
    fn test_clean_is_idempotent() {
        let input = "공감 12\n\n\n본문 내용이 여기에 길게 이어집니다\n2024. 3. 12.\nHome\nreal content line";
        let once = clean(input, Some(PlatformHint::Naver));
        let twice = clean(&once, Some(PlatformHint::Naver));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_clean_removes_naver_widget_labels() {
        let input = "실제 본문 문장입니다\n공감 3\n댓글 15\nURL 복사\n이웃추가";
        let out = clean(input, Some(PlatformHint::Naver));
        assert_eq!(out, "실제 본문 문장입니다");
    }

    #[test]
    fn test_clean_removes_date_and_breadcrumb_lines() {
        let input = "2024. 3. 12.\n홈 > 여행 > 제주\nthe actual article body text";
        let out = clean(input, Some(PlatformHint::Naver));
        assert_eq!(out, "the actual article body text");
    }

    #[test]
    fn test_clean_removes_sponsor_lines_without_hint() {
        let input = "유용한 정보입니다\n이 포스팅은 원고료를 제공받아 작성되었습니다\nSponsored Content";
        let out = clean(input, None);
        assert_eq!(out, "유용한 정보입니다");
    }

    #[test]
    fn test_clean_keeps_long_lines_containing_label_words() {
        // A sentence that merely mentions a label word must survive.
        let input = "여행지에서 공감이 가는 이야기를 많이 들었습니다 정말 좋았어요";
        let out = clean(input, Some(PlatformHint::Naver));
        assert_eq!(out, input);
    }

    #[test]
    fn test_clean_monotonic_size_reduction() {
        let input = "Home\nMenu\nsome content here\n\n\n\nmore   content";
        let out = clean(input, None);
        assert!(out.len() <= input.len());
    }

    #[test]
    fn test_extract_main_content_picks_densest_block() {
        let text = "nav\nmenu\n\
                    this is the first substantial line of the article body\n\
                    and this is the second substantial line of the article body\n\
                    short\n\
                    one more substantial line but alone this time here\n\
                    footer";
        let out = extract_main_content(text);
        assert!(out.contains("first substantial line"));
        assert!(out.contains("second substantial line"));
        assert!(!out.contains("one more substantial line"));
        assert!(!out.contains("nav"));
    }

    #[test]
    fn test_extract_main_content_tie_breaks_first() {
        let a = "alpha block line with exactly seven tokens in it";
        let b = "bravo block line with exactly seven tokens in it";
        let text = format!("{a}\nx\n{b}");
        assert_eq!(extract_main_content(&text), a);
    }

    #[test]
    fn test_extract_main_content_no_substantial_lines() {
        let text = "short\nlines\nonly";
        assert_eq!(extract_main_content(text), text);
    }
}
