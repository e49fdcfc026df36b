//! Decorative artifact removal: hex colour tokens, comma debris, noisy lines.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::{CleaningReport, SENTINEL};

/// Lines whose letters and digits make up less than this share of visible
/// characters are dropped.
const MIN_ALNUM_RATIO: f64 = 0.5;

/// Lines where commas exceed this share of visible characters are dropped.
const MAX_COMMA_RATIO: f64 = 0.3;

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#(?:[0-9a-fA-F]{6}|[0-9a-fA-F]{3})\b").expect("hex colour pattern is valid")
});

/// A bare page number, optionally framed by dashes or bars ("- 12 -", "|7|").
static PAGE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-–—|]*\d{1,4}[-–—|]*$").expect("page number pattern is valid")
});

static REPEATED_COMMAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?:[ \t{}]*,){{2,}}", SENTINEL)).expect("comma run pattern is valid")
});

static LEADING_COMMAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^[ \t{}]*,[ \t,{}]*", SENTINEL, SENTINEL))
        .expect("leading comma pattern is valid")
});

static SPACE_BEFORE_COMMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"[ \t{}]+,", SENTINEL)).expect("space-comma pattern is valid")
});

/// Strip decorative debris line by line and drop lines left as noise.
///
/// A dropped line's sentinels move to the start of the next kept line.
pub(super) fn remove(text: &str, report: &mut CleaningReport) -> String {
    let mut kept: Vec<String> = Vec::new();
    let mut carried = String::new();

    for line in text.split('\n') {
        let cleaned = clean_line(line, report);
        if is_noise(line, &cleaned) {
            report.dropped_lines += 1;
            carried.extend(cleaned.chars().filter(|c| *c == SENTINEL));
            continue;
        }
        if carried.is_empty() {
            kept.push(cleaned);
        } else {
            kept.push(format!("{}{}", carried, cleaned));
            carried.clear();
        }
    }

    let mut out = kept.join("\n");
    out.push_str(&carried);
    out
}

fn clean_line(line: &str, report: &mut CleaningReport) -> String {
    report.hex_tokens_removed += HEX_COLOR.find_iter(line).count();
    let line = HEX_COLOR.replace_all(line, "");

    let line = replace_keeping_sentinels(&REPEATED_COMMAS, &line, ",");
    let line = replace_keeping_sentinels(&LEADING_COMMAS, &line, "");
    replace_keeping_sentinels(&SPACE_BEFORE_COMMA, &line, ",")
}

fn replace_keeping_sentinels(re: &Regex, text: &str, replacement: &str) -> String {
    re.replace_all(text, |caps: &Captures| {
        let sentinels: String = caps[0].chars().filter(|c| *c == SENTINEL).collect();
        format!("{}{}", replacement, sentinels)
    })
    .into_owned()
}

fn visible_chars(line: &str) -> Vec<char> {
    line.chars()
        .filter(|c| !c.is_whitespace() && *c != SENTINEL)
        .collect()
}

/// Whether a line is decorative noise. `original` is the line before debris removal.
fn is_noise(original: &str, cleaned: &str) -> bool {
    let visible = visible_chars(cleaned);

    // Blank lines carry paragraph structure; lines emptied by cleanup do not.
    if visible.is_empty() {
        return !visible_chars(original).is_empty();
    }
    if visible.len() == 1 {
        return true;
    }

    let compact: String = visible.iter().collect();
    if PAGE_NUMBER.is_match(&compact) {
        return true;
    }

    let total = visible.len() as f64;
    let alnum = visible.iter().filter(|c| c.is_alphanumeric()).count() as f64;
    let commas = visible.iter().filter(|c| **c == ',').count() as f64;

    alnum / total < MIN_ALNUM_RATIO || commas / total > MAX_COMMA_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> (String, CleaningReport) {
        let mut report = CleaningReport::default();
        let out = remove(text, &mut report);
        (out, report)
    }

    #[test]
    fn test_strips_hex_colours_and_debris() {
        let (out, report) = run("Colores institucionales #1a2b3c, #fff, #000 del partido");
        assert_eq!(report.hex_tokens_removed, 3);
        assert_eq!(out, "Colores institucionales,  del partido");
    }

    #[test]
    fn test_drops_noise_lines() {
        let text = "Primera línea de texto\n- 12 -\nx\n,,,a,b\n* * * ~\nSegunda línea de texto";
        let (out, report) = run(text);
        assert_eq!(out, "Primera línea de texto\nSegunda línea de texto");
        assert_eq!(report.dropped_lines, 4);
    }

    #[test]
    fn test_keeps_lines_with_figures() {
        let text = "Meta: 2030\nPeríodo 2026-2030\n1.\n45%\nInversión de 1.500 millones";
        let (out, report) = run(text);
        assert_eq!(out, text);
        assert_eq!(report.dropped_lines, 0);
    }

    #[test]
    fn test_drops_bare_page_numbers() {
        let (out, report) = run("Fin de la sección\n17\n|3|\n— 204 —\nNueva sección");
        assert_eq!(out, "Fin de la sección\nNueva sección");
        assert_eq!(report.dropped_lines, 3);
    }

    #[test]
    fn test_keeps_blank_lines() {
        let (out, _) = run("Párrafo uno\n\nPárrafo dos");
        assert_eq!(out, "Párrafo uno\n\nPárrafo dos");
    }

    #[test]
    fn test_dropped_line_sentinel_moves_forward() {
        let text = format!("Texto previo\n{}2024\nTexto siguiente", SENTINEL);
        let (out, _) = run(&text);
        assert_eq!(out, format!("Texto previo\n{}Texto siguiente", SENTINEL));
    }

    #[test]
    fn test_dropped_last_line_sentinel_kept() {
        let text = format!("Texto final\n{}99", SENTINEL);
        let (out, _) = run(&text);
        assert_eq!(out, format!("Texto final{}", SENTINEL));
    }
}
