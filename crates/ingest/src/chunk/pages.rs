//! Page attribution from in-text page markers.

use crate::types::{PageMarker, PageRange};

/// Page number in effect at byte offset `position`.
///
/// The last marker at or before `position` wins; with no such marker the
/// text is on page 1.
pub fn page_at(markers: &[PageMarker], position: usize) -> u32 {
    markers
        .iter()
        .rev()
        .find(|m| m.position <= position)
        .map(|m| m.page_number)
        .unwrap_or(1)
}

/// Resolve `(page_number, page_range)` for the span `start..end`.
///
/// Returns `(None, None)` when the document has no markers.
pub fn attribute(markers: &[PageMarker], start: usize, end: usize) -> (Option<u32>, Option<PageRange>) {
    if markers.is_empty() {
        return (None, None);
    }

    let first = page_at(markers, start);
    let last = page_at(markers, end);
    if first == last {
        (Some(first), None)
    } else {
        (
            None,
            Some(PageRange {
                start: first.min(last),
                end: first.max(last),
            }),
        )
    }
}
