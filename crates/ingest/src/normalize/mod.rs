//! Text normalizer for extracted PDF text.
//!
//! Steps, in fixed order:
//! 1. Page-marker extraction (`-- N of M --`)
//! 2. Encoding repair and character allow-listing
//! 3. OCR-artifact repair (versioned rule table)
//! 4. Decorative artifact removal
//! 5. Whitespace normalization
//!
//! After step 1 each marker is held in the working text as a private-use
//! sentinel character, so later steps move it along with the surrounding
//! text. Steps 2–5 repeat until the text stops changing, which makes
//! cleaning a fixed point: `normalize(normalize(x).cleaned_text)` yields the
//! same text.

mod artifacts;
mod encoding;
mod markers;
mod rules;
mod whitespace;

pub use markers::extract_page_markers;
pub use rules::{RepairRule, RuleSet, RuleSpec, RULESET_VERSION};

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{CleaningResult, PageMarker};

/// Private-use character standing in for a stripped page marker.
pub(crate) const SENTINEL: char = '\u{E000}';

/// Upper bound on repair passes over the text.
const MAX_PASSES: usize = 6;

/// Counters collected while cleaning one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub markers_found: usize,
    pub encoding_repairs: usize,
    pub stripped_chars: usize,
    pub rule_hits: BTreeMap<String, usize>,
    pub dropped_lines: usize,
    pub hex_tokens_removed: usize,
    pub passes: usize,
}

/// Text normalizer bound to a repair rule table.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    rules: &'a RuleSet,
}

impl Default for Normalizer<'static> {
    fn default() -> Self {
        Self {
            rules: RuleSet::builtin(),
        }
    }
}

impl<'a> Normalizer<'a> {
    /// Create a normalizer with a custom rule table.
    pub fn with_rules(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// Clean raw extracted text.
    pub fn normalize(&self, raw: &str) -> CleaningResult {
        self.normalize_with_report(raw).0
    }

    /// Clean raw extracted text and return the step counters.
    pub fn normalize_with_report(&self, raw: &str) -> (CleaningResult, CleaningReport) {
        let mut report = CleaningReport::default();

        let prepared = prepare(raw);
        let mut found = Vec::new();
        let mut working = absorb_markers(&prepared, &mut found);

        for pass in 1..=MAX_PASSES {
            let next = self.repair_pass(&working, &mut found, &mut report);
            report.passes = pass;
            if next == working {
                break;
            }
            working = next;
        }
        report.markers_found = found.len();

        let (cleaned_text, positions) = whitespace::resolve_sentinels(&working);
        if positions.len() != found.len() {
            tracing::warn!(
                expected = found.len(),
                resolved = positions.len(),
                "Page marker count changed during cleaning"
            );
        }

        let page_markers = found
            .iter()
            .zip(positions)
            .map(|(marker, position)| PageMarker {
                position,
                ..*marker
            })
            .collect();

        tracing::debug!(
            raw_bytes = raw.len(),
            cleaned_bytes = cleaned_text.len(),
            markers = report.markers_found,
            encoding_repairs = report.encoding_repairs,
            stripped_chars = report.stripped_chars,
            rule_hits = ?report.rule_hits,
            dropped_lines = report.dropped_lines,
            hex_tokens = report.hex_tokens_removed,
            passes = report.passes,
            ruleset = self.rules.version(),
            "Normalized text"
        );

        (
            CleaningResult {
                cleaned_text,
                page_markers,
            },
            report,
        )
    }

    fn repair_pass(
        &self,
        text: &str,
        markers: &mut Vec<PageMarker>,
        report: &mut CleaningReport,
    ) -> String {
        let text = encoding::repair(text, report);
        let text = self.rules.apply(&text, report);
        let text = artifacts::remove(&text, report);
        let text = whitespace::collapse(&text);
        // Debris removal can bring a marker's pieces together.
        absorb_markers(&text, markers)
    }
}

/// Clean raw text with the built-in rule table.
pub fn normalize(raw: &str) -> CleaningResult {
    Normalizer::default().normalize(raw)
}

/// Clean raw text with the built-in rule table, returning step counters.
pub fn normalize_with_report(raw: &str) -> (CleaningResult, CleaningReport) {
    Normalizer::default().normalize_with_report(raw)
}

/// Unify line endings, turn page feeds into newlines, and drop stray sentinels.
fn prepare(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\x0C' => out.push('\n'),
            SENTINEL => {}
            c => out.push(c),
        }
    }
    out
}

/// Strip markers from `text`, replacing each with a sentinel and slotting it
/// into `markers` after every marker whose sentinel precedes it.
fn absorb_markers(text: &str, markers: &mut Vec<PageMarker>) -> String {
    let (stripped, new) = extract_page_markers(text);
    for (j, marker) in new.iter().enumerate() {
        let index = stripped[..marker.position].matches(SENTINEL).count() + j;
        markers.insert(index, *marker);
    }
    insert_sentinels(&stripped, &new)
}

fn insert_sentinels(text: &str, markers: &[PageMarker]) -> String {
    let mut out = String::with_capacity(text.len() + markers.len() * 3);
    let mut last = 0;
    for marker in markers {
        out.push_str(&text[last..marker.position]);
        out.push(SENTINEL);
        last = marker.position;
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_input() {
        let result = normalize("");
        assert_eq!(result.cleaned_text, "");
        assert!(result.page_markers.is_empty());
    }

    #[test]
    fn test_noise_only_input() {
        let result = normalize("#ffffff\n,,,\n12 34\n");
        assert_eq!(result.cleaned_text, "");
    }

    #[test]
    fn test_full_pipeline() {
        let raw = "Plan de Gobierno\r\n\r\nLa educaciÃ³n es prioridad.  #ff0000\r\n--  2 of 10 --\r\nLa ges:ón delgobierno\r\n,,,\r\nes clave.";
        let (result, report) = normalize_with_report(raw);

        assert_eq!(
            result.cleaned_text,
            "Plan de Gobierno\n\nLa educación es prioridad.\n\nLa gestión del gobierno\nes clave."
        );
        assert_eq!(result.page_markers.len(), 1);
        let marker = result.page_markers[0];
        assert_eq!(marker.page_number, 2);
        assert_eq!(marker.total_pages, 10);
        assert!(result.cleaned_text[marker.position..].starts_with("La gestión"));
        assert_eq!(report.markers_found, 1);
        assert_eq!(report.hex_tokens_removed, 1);
        assert!(report.rule_hits.contains_key("colon-ti"));
    }

    #[test]
    fn test_marker_literal_removed() {
        let prefix = "Introducción al plan nacional de desarrollo humano";
        let raw = format!("{}\n-- 2 of 10 --\nSegunda página", prefix);
        let result = normalize(&raw);

        assert!(!result.cleaned_text.contains("-- 2 of 10 --"));
        assert_eq!(result.page_markers.len(), 1);
        assert_eq!(
            &result.cleaned_text[result.page_markers[0].position..],
            "Segunda página"
        );
    }

    #[test]
    fn test_markers_survive_dropped_lines() {
        let raw = "Texto de la primera página\n-- 1 of 2 --\n2024\n-- 2 of 2 --\nTexto de la segunda página";
        let result = normalize(raw);

        assert_eq!(
            result.cleaned_text,
            "Texto de la primera página\n\nTexto de la segunda página"
        );
        assert_eq!(result.page_markers.len(), 2);
        assert!(result.page_markers[0].position <= result.page_markers[1].position);
        assert_eq!(
            &result.cleaned_text[result.page_markers[1].position..],
            "Texto de la segunda página"
        );
    }

    #[test]
    fn test_markers_ordered() {
        let raw = "-- 1 of 3 --\nuno dos tres\n-- 2 of 3 --\ncuatro cinco\n-- 3 of 3 --\nseis siete";
        let result = normalize(raw);
        let positions: Vec<usize> = result.page_markers.iter().map(|m| m.position).collect();
        assert_eq!(positions[0], 0);
        assert!(positions.windows(2).all(|w| w[0] <= w[1]));
        for position in positions {
            assert!(result.cleaned_text.is_char_boundary(position));
        }
    }

    #[test]
    fn test_idempotent_on_sample() {
        let raw = "La de mocracia  y la transparencia\n\n\n\nenla salud #abc, , pública:";
        let once = normalize(raw).cleaned_text;
        let twice = normalize(&once).cleaned_text;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_keeps_lines_with_years() {
        let text = "Plan de Gobierno\nPeríodo 2026-2030\nMeta: 2030\nLa educación es prioridad.";
        assert_eq!(normalize(text).cleaned_text, text);
    }

    #[test]
    fn test_keeps_conciudadanos() {
        assert_eq!(
            normalize("Estimados conciudadanos").cleaned_text,
            "Estimados conciudadanos"
        );
        assert_eq!(
            normalize("Estimados conciudadanos y enseguridad").cleaned_text,
            "Estimados conciudadanos y en seguridad"
        );
    }

    #[test]
    fn test_custom_rule_table() {
        let rules = RuleSet::new(
            1,
            vec![RuleSpec {
                id: "ocr-rn",
                description: "rn read as m",
                pattern: r"\brnunicipal".to_string(),
                replacement: "municipal".to_string(),
                applies_after: None,
                exceptions: &[],
            }],
        )
        .unwrap();
        let normalizer = Normalizer::with_rules(&rules);
        assert_eq!(
            normalizer.normalize("gestión rnunicipal").cleaned_text,
            "gestión municipal"
        );
    }

    fn word() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "de", "mocracia", "la", "Salud", "gobierno", "ges:ón", "educaciÃ³n", "#fff",
            "#a1b2c3", ",", ",,", "2024", "x", "delgobierno", "desarrolloSostenible", "AyA",
            "San José", "¿qué?", "plan.", "\u{201C}cita\u{201D}", "ñandú", "--", "of",
        ])
        .prop_map(str::to_string)
    }

    fn separator() -> impl Strategy<Value = String> {
        prop::sample::select(vec![" ", "  ", "\n", "\n\n", "\n\n\n", "\t", " \n "])
            .prop_map(str::to_string)
    }

    proptest! {
        #[test]
        fn prop_cleaning_is_idempotent(parts in prop::collection::vec((word(), separator()), 0..40)) {
            let raw: String = parts.iter().map(|(w, s)| format!("{}{}", w, s)).collect();
            let once = normalize(&raw).cleaned_text;
            let twice = normalize(&once).cleaned_text;
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_marker_positions_valid(parts in prop::collection::vec((word(), separator()), 0..30), page in 1u32..50) {
            let mut raw: String = parts.iter().map(|(w, s)| format!("{}{}", w, s)).collect();
            raw.push_str(&format!("\n-- {} of 50 --\n", page));
            raw.push_str("contenido final de la página");
            let result = normalize(&raw);
            prop_assert!(!result.page_markers.is_empty());
            let mut previous = 0;
            for marker in &result.page_markers {
                prop_assert!(marker.position >= previous);
                prop_assert!(marker.position <= result.cleaned_text.len());
                prop_assert!(result.cleaned_text.is_char_boundary(marker.position));
                previous = marker.position;
            }
        }
    }
}
