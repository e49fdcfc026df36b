//! Subword tokenizer used for every token budget in the pipeline.
//!
//! Wraps the `cl100k_base` BPE vocabulary (the OpenAI embedding-model
//! family). Loading the vocabulary is costly, so one instance is created per
//! process and shared as `Arc<Tokenizer>`.

use std::ops::Range;

use planscope_core::{AppError, AppResult};
use tiktoken_rs::CoreBPE;

/// Shared, read-only tokenizer.
pub struct Tokenizer {
    bpe: CoreBPE,
    name: &'static str,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer").field("name", &self.name).finish()
    }
}

impl Tokenizer {
    /// Load the `cl100k_base` vocabulary.
    pub fn cl100k() -> AppResult<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| AppError::Tokenizer(format!("Failed to load cl100k_base: {}", e)))?;
        tracing::debug!("Loaded cl100k_base tokenizer");
        Ok(Self {
            bpe,
            name: "cl100k_base",
        })
    }

    /// Vocabulary name.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Number of tokens in `text`.
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Byte length of the longest suffix of `text` covered by at most its
    /// last `n` tokens that decodes to valid UTF-8.
    pub fn tail_len(&self, text: &str, n: usize) -> usize {
        if n == 0 || text.is_empty() {
            return 0;
        }
        let tokens = self.bpe.encode_ordinary(text);
        if n >= tokens.len() {
            return text.len();
        }

        for take in (1..=n).rev() {
            let suffix = tokens[tokens.len() - take..].to_vec();
            if let Ok(decoded) = self.bpe.decode(suffix) {
                if text.ends_with(decoded.as_str()) {
                    return decoded.len();
                }
            }
        }
        0
    }

    /// Cut `text` into consecutive byte ranges of about `window` tokens each.
    ///
    /// Cuts that would split a UTF-8 character move back (fewer tokens) or,
    /// failing that, forward up to `ceiling` tokens. Every range is an exact,
    /// non-empty slice of `text`, and together they cover it.
    pub fn windows(&self, text: &str, window: usize, ceiling: usize) -> AppResult<Vec<Range<usize>>> {
        let window = window.max(1);
        let tokens = self.bpe.encode_ordinary(text);
        let mut ranges = Vec::new();
        let mut offset = 0;
        let mut start = 0;

        while start < tokens.len() {
            let target = (start + window).min(tokens.len());
            let forward_limit = (start + ceiling.max(window)).min(tokens.len());
            let candidates = (start + 1..=target)
                .rev()
                .chain(target + 1..=forward_limit);

            let mut advanced = None;
            for end in candidates {
                if let Ok(piece) = self.bpe.decode(tokens[start..end].to_vec()) {
                    if !piece.is_empty() && text[offset..].starts_with(piece.as_str()) {
                        advanced = Some((end, piece.len()));
                        break;
                    }
                }
            }

            let Some((end, len)) = advanced else {
                return Err(AppError::OversizedSegment(format!(
                    "cannot cut {} bytes at a character boundary within {} tokens",
                    text.len() - offset,
                    ceiling
                )));
            };

            ranges.push(offset..offset + len);
            offset += len;
            start = end;
        }

        Ok(ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, LazyLock};

    static TOKENIZER: LazyLock<Arc<Tokenizer>> =
        LazyLock::new(|| Arc::new(Tokenizer::cl100k().unwrap()));

    #[test]
    fn test_count() {
        assert_eq!(TOKENIZER.count(""), 0);
        assert!(TOKENIZER.count("This is a test sentence.") > 0);
    }

    #[test]
    fn test_tail_len_is_suffix() {
        let text = "La participación ciudadana fortalece la democracia costarricense.";
        let len = TOKENIZER.tail_len(text, 3);
        assert!(len > 0 && len < text.len());
        assert!(text.is_char_boundary(text.len() - len));
    }

    #[test]
    fn test_tail_len_whole_text_when_short() {
        assert_eq!(TOKENIZER.tail_len("hola", 50), 4);
        assert_eq!(TOKENIZER.tail_len("hola", 0), 0);
    }

    #[test]
    fn test_windows_cover_text() {
        let text = "ñandú".repeat(200);
        let ranges = TOKENIZER.windows(&text, 7, 20).unwrap();

        assert!(ranges.len() > 1);
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges.last().unwrap().end, text.len());
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for range in &ranges {
            assert!(text.is_char_boundary(range.start));
            assert!(text.is_char_boundary(range.end));
        }
    }

    #[test]
    fn test_windows_empty_text() {
        assert!(TOKENIZER.windows("", 10, 10).unwrap().is_empty());
    }
}
