//! Heuristic quality scoring for chunks.

use regex::Regex;
use std::sync::LazyLock;

use crate::lexicon;
use crate::types::QualityMetrics;

/// Default `should_keep_chunk` threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Punctuation that does not count as special characters.
const ALLOWED_PUNCTUATION: &str = ".,;:¿?¡!()-\"'«»“”";

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("word pattern is valid"));

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("sentence pattern is valid"));

/// Score a chunk of text. Pure; never discards anything.
pub fn score(text: &str) -> QualityMetrics {
    let char_count = text.chars().count();
    let length_score = length_score(char_count);
    let special_char_ratio = special_char_ratio(text, char_count);
    let has_keywords = lexicon::contains_domain_keyword(&text.to_lowercase());

    if !text.chars().any(char::is_alphabetic) {
        return QualityMetrics {
            quality_score: 0.0,
            length_score,
            special_char_ratio,
            has_keywords,
            readability: 0.0,
        };
    }

    let readability = readability(text);
    let special_penalty = 1.0 - (special_char_ratio - 0.2).max(0.0) * 0.5;
    let keyword_bonus = if has_keywords { 1.2 } else { 1.0 };
    let quality_score = ((0.7 + 0.3 * length_score)
        * special_penalty
        * keyword_bonus
        * (0.7 + 0.3 * readability))
        .clamp(0.0, 1.0);

    QualityMetrics {
        quality_score,
        length_score,
        special_char_ratio,
        has_keywords,
        readability,
    }
}

/// Whether a chunk clears `threshold`.
pub fn should_keep_chunk(metrics: &QualityMetrics, threshold: f64) -> bool {
    metrics.quality_score >= threshold
}

fn length_score(chars: usize) -> f64 {
    match chars {
        0..=49 => 0.2,
        50..=99 => 0.5,
        100..=199 => 0.8,
        200..=1000 => 1.0,
        1001..=2000 => 0.9,
        2001..=3000 => 0.7,
        _ => 0.5,
    }
}

fn special_char_ratio(text: &str, char_count: usize) -> f64 {
    if char_count == 0 {
        return 0.0;
    }
    let special = text
        .chars()
        .filter(|c| !(c.is_alphanumeric() || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(*c)))
        .count();
    special as f64 / char_count as f64
}

fn readability(text: &str) -> f64 {
    let words: Vec<String> = WORD
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    if words.is_empty() {
        return 0.0;
    }

    let mut score: f64 = 1.0;

    let avg_len = words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64;
    if !(3.0..=12.0).contains(&avg_len) {
        score *= 0.7;
    }

    let content = words.iter().filter(|w| !lexicon::is_stopword(w)).count() as f64;
    let content_ratio = content / words.len() as f64;
    if (0.4..=0.7).contains(&content_ratio) {
        score *= 1.1;
    } else if !(0.2..=0.9).contains(&content_ratio) {
        score *= 0.8;
    }

    let sentences = SENTENCE_END
        .split(text)
        .filter(|s| WORD.is_match(s))
        .count()
        .max(1);
    let avg_sentence = words.len() as f64 / sentences as f64;
    if !(5.0..=40.0).contains(&avg_sentence) {
        score *= 0.8;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PASSAGE: &str = "El plan de gobierno propone fortalecer la educación pública en todas \
        las regiones del país. La inversión en infraestructura escolar permitirá mejorar la \
        calidad de la enseñanza. Además, se ampliarán las becas para estudiantes de bajos \
        recursos y se capacitará al personal docente.";

    #[test]
    fn test_empty_scores_zero() {
        let metrics = score("");
        assert_eq!(metrics.quality_score, 0.0);
        assert!(!metrics.has_keywords);
    }

    #[test]
    fn test_punctuation_only_scores_low() {
        for text in ["...,,,;;;", "   ", "123 456 789", "#### ----"] {
            let metrics = score(text);
            assert!(metrics.quality_score <= 0.3, "{:?}", text);
            assert!(!metrics.has_keywords);
        }
    }

    #[test]
    fn test_good_passage_scores_high() {
        let metrics = score(PASSAGE);
        assert!(metrics.has_keywords);
        assert_eq!(metrics.length_score, 1.0);
        assert!(metrics.special_char_ratio < 0.01);
        assert!(metrics.quality_score > 0.8);
        assert!(should_keep_chunk(&metrics, DEFAULT_THRESHOLD));
    }

    #[test]
    fn test_special_chars_penalized() {
        let clean = score("Texto normal sobre la cultura del país y sus tradiciones");
        let noisy = score("Texto ### normal @@@ sobre ~~~ la ||| cultura *** del %%% país");
        assert!(noisy.special_char_ratio > 0.2);
        assert!(noisy.quality_score < clean.quality_score);
    }

    #[test]
    fn test_length_buckets() {
        assert_eq!(length_score(10), 0.2);
        assert_eq!(length_score(75), 0.5);
        assert_eq!(length_score(150), 0.8);
        assert_eq!(length_score(1000), 1.0);
        assert_eq!(length_score(1500), 0.9);
        assert_eq!(length_score(3000), 0.7);
        assert_eq!(length_score(3001), 0.5);
    }

    #[test]
    fn test_threshold() {
        let metrics = score("ok");
        assert!(!should_keep_chunk(&metrics, 0.99));
        assert!(should_keep_chunk(&metrics, 0.0));
    }

    proptest! {
        #[test]
        fn prop_score_in_unit_interval(text in "\\PC{0,400}") {
            let metrics = score(&text);
            prop_assert!((0.0..=1.0).contains(&metrics.quality_score));
            prop_assert!((0.0..=1.0).contains(&metrics.readability));
            prop_assert!((0.0..=1.0).contains(&metrics.special_char_ratio));
        }
    }
}
