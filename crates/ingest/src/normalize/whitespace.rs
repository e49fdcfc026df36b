//! Whitespace normalization and sentinel resolution.

use super::SENTINEL;

/// Maximum consecutive newlines kept (one blank line).
const MAX_NEWLINES: usize = 2;

/// Collapse space/tab runs to one space and newline runs to at most one
/// blank line, dropping spaces that touch a newline and trimming both ends.
///
/// Sentinels are carried to just before the next visible character. A
/// sentinel that sat between two visible characters with no whitespace
/// gets a space in front of it, so removing it later never glues words.
pub(super) fn collapse(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut pending_newlines = 0usize;
    let mut pending_sentinels = 0usize;

    for c in text.chars() {
        match c {
            SENTINEL => pending_sentinels += 1,
            '\n' => pending_newlines += 1,
            c if c.is_whitespace() => pending_space = true,
            c => {
                if !out.is_empty() {
                    if pending_newlines > 0 {
                        for _ in 0..pending_newlines.min(MAX_NEWLINES) {
                            out.push('\n');
                        }
                    } else if pending_space || pending_sentinels > 0 {
                        out.push(' ');
                    }
                }
                push_sentinels(&mut out, pending_sentinels);
                out.push(c);
                pending_space = false;
                pending_newlines = 0;
                pending_sentinels = 0;
            }
        }
    }
    push_sentinels(&mut out, pending_sentinels);
    out
}

fn push_sentinels(out: &mut String, count: usize) {
    for _ in 0..count {
        out.push(SENTINEL);
    }
}

/// Remove sentinels, returning the text and the byte offset where each one stood.
pub(super) fn resolve_sentinels(text: &str) -> (String, Vec<usize>) {
    let mut out = String::with_capacity(text.len());
    let mut positions = Vec::new();
    for c in text.chars() {
        if c == SENTINEL {
            positions.push(out.len());
        } else {
            out.push(c);
        }
    }
    (out, positions)
}
