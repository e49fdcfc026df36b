//! Segmentation of cleaned text at paragraph, sentence and word granularity.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::LazyLock;
use unicode_segmentation::UnicodeSegmentation;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("paragraph pattern is valid"));

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("word pattern is valid"));

/// Segmentation granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitOn {
    #[default]
    Paragraph,
    Sentence,
    Word,
}

impl SplitOn {
    /// The next finer granularity, if any.
    pub fn finer(self) -> Option<SplitOn> {
        match self {
            SplitOn::Paragraph => Some(SplitOn::Sentence),
            SplitOn::Sentence => Some(SplitOn::Word),
            SplitOn::Word => None,
        }
    }
}

impl std::str::FromStr for SplitOn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paragraph" => Ok(SplitOn::Paragraph),
            "sentence" => Ok(SplitOn::Sentence),
            "word" => Ok(SplitOn::Word),
            other => Err(format!("unknown split granularity '{}'", other)),
        }
    }
}

/// Split `text[range]` into trimmed, non-empty byte ranges of `text`.
pub fn segment(text: &str, range: Range<usize>, level: SplitOn) -> Vec<Range<usize>> {
    let base = range.start;
    let slice = &text[range];

    let pieces: Vec<Range<usize>> = match level {
        SplitOn::Paragraph => {
            let mut pieces = Vec::new();
            let mut last = 0;
            for m in PARAGRAPH_BREAK.find_iter(slice) {
                pieces.push(last..m.start());
                last = m.end();
            }
            pieces.push(last..slice.len());
            pieces
        }
        SplitOn::Sentence => slice
            .split_sentence_bound_indices()
            .map(|(start, s)| start..start + s.len())
            .collect(),
        SplitOn::Word => WORD.find_iter(slice).map(|m| m.range()).collect(),
    };

    pieces
        .into_iter()
        .filter_map(|r| trim(slice, r))
        .map(|r| base + r.start..base + r.end)
        .collect()
}

fn trim(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let piece = &text[range.clone()];
    let lead = piece.len() - piece.trim_start().len();
    let trimmed = piece.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = range.start + lead;
    Some(start..start + trimmed.len())
}
