//! Token-budgeted chunking of cleaned text.
//!
//! Text is segmented at the configured granularity and segments are packed
//! greedily into chunks that respect a token budget derived from both the
//! configured maximum and the embedding model's input limit. Consecutive
//! chunks share a tail of `overlap_size` tokens.

mod pages;
mod splitting;

pub use pages::{attribute, page_at};
pub use splitting::{segment, SplitOn};

use planscope_core::AppResult;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

use crate::tokenizer::Tokenizer;
use crate::types::{PageMarker, TextChunk};

/// Chunking options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkOptions {
    /// Target chunk size in tokens
    pub chunk_size: usize,

    /// Hard upper bound in tokens
    pub max_chunk_size: usize,

    /// Tokens shared between consecutive chunks
    pub overlap_size: usize,

    pub split_on: SplitOn,

    /// Input limit of the embedding model
    pub embedding_max_tokens: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            max_chunk_size: 800,
            overlap_size: 50,
            split_on: SplitOn::Paragraph,
            embedding_max_tokens: 8191,
        }
    }
}

/// Token limits resolved from [`ChunkOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub target: usize,
    pub effective_max: usize,
    pub overlap: usize,
    /// Window size for cutting a single oversized word
    pub window: usize,
}

impl Budget {
    pub fn new(options: &ChunkOptions) -> Self {
        let margin = (options.embedding_max_tokens / 10).min(50);
        let effective_max = options
            .max_chunk_size
            .min(options.embedding_max_tokens.saturating_sub(margin))
            .max(1);
        let target = options.chunk_size.clamp(1, effective_max);
        let overlap = options.overlap_size.min(effective_max / 2);
        let window = target.saturating_sub(overlap).max(1);

        Self {
            target,
            effective_max,
            overlap,
            window,
        }
    }
}

/// Open chunk under construction, as a byte range of the text.
#[derive(Debug, Clone, Copy)]
struct Buffer {
    start: usize,
    end: usize,
    tokens: usize,
    /// Holds only the overlap carried from the previous chunk
    seed_only: bool,
}

/// Splits cleaned text into token-bounded chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    tokenizer: Arc<Tokenizer>,
    options: ChunkOptions,
    budget: Budget,
}

impl Chunker {
    pub fn new(tokenizer: Arc<Tokenizer>, options: ChunkOptions) -> Self {
        let budget = Budget::new(&options);
        if budget.target != options.chunk_size || budget.overlap != options.overlap_size {
            tracing::debug!(
                chunk_size = options.chunk_size,
                overlap_size = options.overlap_size,
                target = budget.target,
                overlap = budget.overlap,
                effective_max = budget.effective_max,
                "Clamped chunk options to token budget"
            );
        }
        Self {
            tokenizer,
            options,
            budget,
        }
    }

    pub fn budget(&self) -> Budget {
        self.budget
    }

    /// Chunk `text`, attributing pages from `markers` (ordered by position).
    ///
    /// Every chunk's content is the exact slice `text[start_char..end_char]`.
    pub fn chunk(
        &self,
        text: &str,
        document_id: &str,
        markers: &[PageMarker],
    ) -> AppResult<Vec<TextChunk>> {
        let spans = self.spans(text, 0..text.len(), self.options.split_on)?;
        let ranges = self.pack(text, &spans);
        let ranges = self.enforce_ceiling(text, ranges)?;

        let chunks: Vec<TextChunk> = ranges
            .into_iter()
            .enumerate()
            .map(|(index, range)| {
                let content = &text[range.clone()];
                let (page_number, page_range) = attribute(markers, range.start, range.end);
                TextChunk {
                    chunk_id: TextChunk::make_id(document_id, index),
                    document_id: document_id.to_string(),
                    content: content.to_string(),
                    tokens: self.tokenizer.count(content),
                    chunk_index: index,
                    start_char: range.start,
                    end_char: range.end,
                    page_number,
                    page_range,
                }
            })
            .collect();

        tracing::info!(
            document_id,
            chunks = chunks.len(),
            segments = spans.len(),
            bytes = text.len(),
            "Chunking complete"
        );

        Ok(chunks)
    }

    /// Segment `range`, re-splitting anything over budget at a finer level.
    fn spans(&self, text: &str, range: Range<usize>, level: SplitOn) -> AppResult<Vec<Range<usize>>> {
        let mut out = Vec::new();
        for span in segment(text, range, level) {
            if self.tokenizer.count(&text[span.clone()]) <= self.budget.effective_max {
                out.push(span);
                continue;
            }
            match level.finer() {
                Some(finer) => out.extend(self.spans(text, span, finer)?),
                None => {
                    tracing::debug!(bytes = span.len(), "Cutting oversized word into token windows");
                    let windows = self.tokenizer.windows(
                        &text[span.clone()],
                        self.budget.window,
                        self.budget.effective_max,
                    )?;
                    out.extend(
                        windows
                            .into_iter()
                            .map(|w| span.start + w.start..span.start + w.end),
                    );
                }
            }
        }
        Ok(out)
    }

    /// Greedily pack spans into chunk ranges with overlap.
    fn pack(&self, text: &str, spans: &[Range<usize>]) -> Vec<Range<usize>> {
        let mut closed = Vec::new();
        let mut buffer: Option<Buffer> = None;

        for (i, span) in spans.iter().enumerate() {
            let mut current = match buffer.take() {
                Some(open) => {
                    let tokens = self.tokenizer.count(&text[open.start..span.end]);
                    if tokens <= self.budget.effective_max {
                        Buffer {
                            end: span.end,
                            tokens,
                            seed_only: false,
                            ..open
                        }
                    } else {
                        let seed = if open.seed_only {
                            None
                        } else {
                            closed.push(open.start..open.end);
                            self.seed(text, &open)
                        };
                        self.open_with(text, seed, span)
                    }
                }
                None => self.open_with(text, None, span),
            };

            if current.tokens >= self.budget.target && i + 1 < spans.len() {
                closed.push(current.start..current.end);
                current = match self.seed(text, &current) {
                    Some(start) => Buffer {
                        start,
                        end: current.end,
                        tokens: self.tokenizer.count(&text[start..current.end]),
                        seed_only: true,
                    },
                    None => continue,
                };
            }
            buffer = Some(current);
        }

        if let Some(open) = buffer {
            if !open.seed_only {
                closed.push(open.start..open.end);
            }
        }
        closed
    }

    /// Start a buffer at `span`, prefixed by an overlap seed when it fits.
    fn open_with(&self, text: &str, seed: Option<usize>, span: &Range<usize>) -> Buffer {
        if let Some(start) = seed {
            let tokens = self.tokenizer.count(&text[start..span.end]);
            if tokens <= self.budget.effective_max {
                return Buffer {
                    start,
                    end: span.end,
                    tokens,
                    seed_only: false,
                };
            }
        }
        Buffer {
            start: span.start,
            end: span.end,
            tokens: self.tokenizer.count(&text[span.clone()]),
            seed_only: false,
        }
    }

    /// Start offset of the overlap carried out of a closed chunk.
    fn seed(&self, text: &str, closed: &Buffer) -> Option<usize> {
        if self.budget.overlap == 0 {
            return None;
        }
        let chunk = &text[closed.start..closed.end];
        let tail = self.tokenizer.tail_len(chunk, self.budget.overlap);
        let start = closed.end - tail;
        let tail_text = &text[start..closed.end];
        let start = start + (tail_text.len() - tail_text.trim_start().len());

        (start > closed.start && start < closed.end).then_some(start)
    }

    /// Re-split any chunk whose real token count exceeds the embedding limit.
    fn enforce_ceiling(&self, text: &str, ranges: Vec<Range<usize>>) -> AppResult<Vec<Range<usize>>> {
        let limit = self.options.embedding_max_tokens.max(1);
        let mut out = Vec::with_capacity(ranges.len());

        for range in ranges {
            if self.tokenizer.count(&text[range.clone()]) <= limit {
                out.push(range);
                continue;
            }
            tracing::warn!(
                start = range.start,
                end = range.end,
                limit,
                "Chunk exceeds embedding limit, splitting by sentence"
            );

            let mut pieces = Vec::new();
            for sentence in segment(text, range, SplitOn::Sentence) {
                if self.tokenizer.count(&text[sentence.clone()]) <= limit {
                    pieces.push(sentence);
                } else {
                    let windows =
                        self.tokenizer
                            .windows(&text[sentence.clone()], self.budget.window, limit)?;
                    pieces.extend(
                        windows
                            .into_iter()
                            .map(|w| sentence.start + w.start..sentence.start + w.end),
                    );
                }
            }

            let mut current: Option<Range<usize>> = None;
            for piece in pieces {
                current = match current {
                    Some(open) if self.tokenizer.count(&text[open.start..piece.end]) <= limit => {
                        Some(open.start..piece.end)
                    }
                    Some(open) => {
                        out.push(open);
                        Some(piece)
                    }
                    None => Some(piece),
                };
            }
            out.extend(current);
        }

        Ok(out)
    }
}
