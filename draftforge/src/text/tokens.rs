//! Token estimation and model-safe text chunking.
//!
//! The estimator has no real tokenizer behind it. It detects the dominant
//! script by character ranges and applies a flat token/character ratio. The
//! ratios are tunable constants, not a contract with any provider's actual
//! tokenizer.

/// Fraction of Hangul characters above which the dense ratio applies.
const HANGUL_DOMINANCE: f64 = 0.3;
/// Characters per token for Hangul-dominant text.
const DENSE_CHARS_PER_TOKEN: f64 = 1.5;
/// Characters per token for everything else.
const SPARSE_CHARS_PER_TOKEN: f64 = 4.0;

fn is_hangul(c: char) -> bool {
    matches!(c, '\u{ac00}'..='\u{d7a3}' | '\u{1100}'..='\u{11ff}' | '\u{3130}'..='\u{318f}')
}

/// Estimates the token cost of a text.
///
/// Idempotent and non-negative; the empty string estimates to 0.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    let mut total = 0usize;
    let mut hangul = 0usize;
    for c in text.chars() {
        total += 1;
        if is_hangul(c) {
            hangul += 1;
        }
    }
    if total == 0 {
        return 0;
    }

    #[allow(clippy::cast_precision_loss)]
    let ratio = hangul as f64 / total as f64;
    let per_token = if ratio > HANGUL_DOMINANCE {
        DENSE_CHARS_PER_TOKEN
    } else {
        SPARSE_CHARS_PER_TOKEN
    };

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let estimate = (total as f64 / per_token).ceil() as usize;
    estimate
}

/// Splits a text into chunks that each fit within `max_tokens`.
///
/// Text that already fits is returned unchanged as a single chunk. Otherwise
/// paragraphs (blank-line boundaries) are greedily packed; a paragraph that
/// alone exceeds the budget is split again on sentence boundaries with the
/// same greedy rule. A single sentence over the budget is emitted as its own
/// oversized chunk rather than cut mid-sentence.
#[must_use]
pub fn chunk(text: &str, max_tokens: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    if max_tokens == 0 || estimate_tokens(text) <= max_tokens {
        return vec![text.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for paragraph in split_paragraphs(text) {
        if estimate_tokens(paragraph) > max_tokens {
            flush(&mut chunks, &mut current);
            pack_sentences(paragraph, max_tokens, &mut chunks);
            continue;
        }

        let candidate_len = if current.is_empty() {
            estimate_tokens(paragraph)
        } else {
            estimate_tokens(&format!("{current}\n\n{paragraph}"))
        };
        if candidate_len > max_tokens {
            flush(&mut chunks, &mut current);
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    flush(&mut chunks, &mut current);

    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

fn pack_sentences(paragraph: &str, max_tokens: usize, chunks: &mut Vec<String>) {
    let mut current = String::new();
    for sentence in split_sentences(paragraph) {
        let candidate = if current.is_empty() {
            sentence.to_string()
        } else {
            format!("{current} {sentence}")
        };
        if estimate_tokens(&candidate) > max_tokens && !current.is_empty() {
            flush(chunks, &mut current);
            current.push_str(sentence);
        } else {
            current = candidate;
        }
    }
    flush(chunks, &mut current);
}

fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

/// Splits on sentence-terminating punctuation followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut terminator_seen = false;

    for (idx, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | '。') {
            terminator_seen = true;
        } else if terminator_seen && c.is_whitespace() {
            let sentence = text[start..idx].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = idx;
            terminator_seen = false;
        } else {
            terminator_seen = false;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_empty_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_is_idempotent_and_positive() {
        let text = "The quick brown fox jumps over the lazy dog.";
        let first = estimate_tokens(text);
        assert!(first > 0);
        assert_eq!(first, estimate_tokens(text));
    }

    #[test]
    fn test_estimate_dense_ratio_for_hangul() {
        // 12 Hangul chars: dense ratio gives ceil(12 / 1.5) = 8.
        let korean = "가나다라마바사아자차카타";
        assert_eq!(estimate_tokens(korean), 8);

        // 12 ASCII chars: sparse ratio gives ceil(12 / 4) = 3.
        let english = "abcdefghijkl";
        assert_eq!(estimate_tokens(english), 3);
    }

    #[test]
    fn test_chunk_returns_whole_text_when_it_fits() {
        let text = "short paragraph";
        assert_eq!(chunk(text, 1000), vec![text.to_string()]);
    }

    #[test]
    fn test_chunk_respects_budget() {
        let paragraph = "word word word word word word word word word word.";
        let text = [paragraph; 10].join("\n\n");
        let max = 30;
        let chunks = chunk(&text, max);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(estimate_tokens(c) <= max, "chunk over budget: {c}");
        }
    }

    #[test]
    fn test_chunk_splits_oversized_paragraph_on_sentences() {
        let sentence = "This sentence has exactly eight words in it now.";
        let paragraph = [sentence; 8].join(" ");
        let chunks = chunk(&paragraph, 20);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.ends_with('.') || c.contains(' '));
        }
    }

    #[test]
    fn test_chunk_round_trip_preserves_words() {
        let text = "Alpha beta gamma delta.\n\nEpsilon zeta eta theta.\n\nIota kappa lambda mu.";
        let chunks = chunk(text, 4);
        let rejoined = chunks.join("\n\n");
        let original_words: Vec<&str> = text.split_whitespace().collect();
        let rejoined_words: Vec<&str> = rejoined.split_whitespace().collect();
        assert_eq!(original_words, rejoined_words);
    }

    #[test]
    fn test_chunk_discards_empty_segments() {
        let text = "para one is here with several words inside.\n\n\n\npara two also has a number of words.";
        let chunks = chunk(text, 8);
        assert!(chunks.iter().all(|c| !c.trim().is_empty()));
    }

    #[test]
    fn test_split_sentences() {
        let text = "First sentence. Second one! Third? 마지막 문장입니다。 tail";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 5);
        assert_eq!(sentences[0], "First sentence.");
        assert_eq!(sentences[4], "tail");
    }
}
