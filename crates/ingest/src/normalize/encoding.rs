//! Encoding repair: double-encoded UTF-8 and character filtering.

use super::{CleaningReport, SENTINEL};

/// UTF-8 text that was decoded as Latin-1/Windows-1252 and re-encoded.
/// Longer sequences come first so prefixes never shadow them.
const MOJIBAKE: &[(&str, &str)] = &[
    ("â€œ", "\u{201C}"),
    ("â€\u{9D}", "\u{201D}"),
    ("â€™", "\u{2019}"),
    ("â€˜", "\u{2018}"),
    ("â€“", "\u{2013}"),
    ("â€”", "\u{2014}"),
    ("â€¦", "\u{2026}"),
    ("â€¢", "\u{2022}"),
    ("Ã¡", "á"),
    ("Ã©", "é"),
    ("Ã\u{AD}", "í"),
    ("Ã³", "ó"),
    ("Ãº", "ú"),
    ("Ã±", "ñ"),
    ("Ã¼", "ü"),
    ("Ã\u{81}", "Á"),
    ("Ã‰", "É"),
    ("Ã\u{8D}", "Í"),
    ("Ã“", "Ó"),
    ("Ãš", "Ú"),
    ("Ã‘", "Ñ"),
    ("Ãœ", "Ü"),
    ("Â¿", "¿"),
    ("Â¡", "¡"),
    ("Âº", "º"),
    ("Âª", "ª"),
    ("Â°", "°"),
    ("Â\u{A0}", " "),
];

/// Non-ASCII characters kept by the allow-list.
const EXTRA_ALLOWED: &str = "áéíóúüñÁÉÍÓÚÜÑ¿¡“”‘’«»–—…•°ºª€§·";

/// Repair mojibake, strip control/format characters and drop everything
/// outside the Latin + Spanish allow-list.
pub(super) fn repair(text: &str, report: &mut CleaningReport) -> String {
    let mut repaired = text.to_string();
    for (broken, fixed) in MOJIBAKE {
        let hits = repaired.matches(broken).count();
        if hits > 0 {
            report.encoding_repairs += hits;
            repaired = repaired.replace(broken, fixed);
        }
    }

    let mut out = String::with_capacity(repaired.len());
    for c in repaired.chars() {
        if is_space_like(c) {
            out.push(' ');
        } else if is_allowed(c) {
            out.push(c);
        } else {
            report.stripped_chars += 1;
        }
    }
    out
}

fn is_space_like(c: char) -> bool {
    matches!(
        c,
        '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}'
    )
}

fn is_allowed(c: char) -> bool {
    c == '\n'
        || c == '\t'
        || c == ' '
        || c == SENTINEL
        || c.is_ascii_graphic()
        || EXTRA_ALLOWED.contains(c)
}
