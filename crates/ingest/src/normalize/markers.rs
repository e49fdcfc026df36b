//! Page-marker extraction.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::PageMarker;

static PAGE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)--\s*(\d+)\s+of\s+(\d+)\s*--").expect("page marker pattern is valid")
});

/// Strip every `-- N of M --` marker from `text`.
///
/// Returns the stripped text and one marker per match, ordered by position.
/// Positions refer to the stripped text. Matches whose numbers overflow are
/// still stripped but not recorded.
pub fn extract_page_markers(text: &str) -> (String, Vec<PageMarker>) {
    let mut stripped = String::with_capacity(text.len());
    let mut markers = Vec::new();
    let mut last = 0;

    for caps in PAGE_MARKER.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        stripped.push_str(&text[last..whole.start()]);
        last = whole.end();

        let page = caps[1].parse::<u32>();
        let total = caps[2].parse::<u32>();
        match (page, total) {
            (Ok(page_number), Ok(total_pages)) => markers.push(PageMarker {
                page_number,
                total_pages,
                position: stripped.len(),
            }),
            _ => tracing::debug!(marker = whole.as_str(), "Skipping page marker with overflowing numbers"),
        }
    }
    stripped.push_str(&text[last..]);

    (stripped, markers)
}
