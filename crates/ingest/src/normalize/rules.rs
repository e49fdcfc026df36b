//! OCR-artifact repair rules.
//!
//! Rules are plain data applied in table order. Each rule may declare the id
//! of an earlier rule it depends on; [`RuleSet::new`] rejects tables that
//! violate that ordering.

use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::LazyLock;

use planscope_core::{AppError, AppResult};

use super::{CleaningReport, SENTINEL};

/// Bumped whenever the built-in table changes behaviour.
pub const RULESET_VERSION: u32 = 4;

/// Upper bound on re-applications of a single rule within one pass.
const MAX_RULE_ITERATIONS: usize = 16;

/// Declarative description of one repair rule.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub id: &'static str,
    pub description: &'static str,
    pub pattern: String,
    pub replacement: String,
    pub applies_after: Option<&'static str>,
    /// Matched words left untouched (lowercase)
    pub exceptions: &'static [&'static str],
}

/// A compiled repair rule.
#[derive(Debug, Clone)]
pub struct RepairRule {
    pub id: &'static str,
    pub description: &'static str,
    pub applies_after: Option<&'static str>,
    regex: Regex,
    replacement: String,
    exceptions: &'static [&'static str],
}

impl RepairRule {
    /// Apply the rule until it no longer matches.
    ///
    /// Page sentinels swallowed by a match are re-emitted after the
    /// replacement so no marker is lost.
    pub fn apply(&self, text: &str) -> (String, usize) {
        let mut current = text.to_string();
        let mut hits = 0;

        for _ in 0..MAX_RULE_ITERATIONS {
            let found = self
                .regex
                .find_iter(&current)
                .filter(|m| !self.is_exception(m.as_str()))
                .count();
            if found == 0 {
                break;
            }
            let next = self
                .regex
                .replace_all(&current, |caps: &Captures| {
                    if self.is_exception(&caps[0]) {
                        return caps[0].to_string();
                    }
                    let mut out = String::new();
                    caps.expand(&self.replacement, &mut out);
                    out.extend(caps[0].chars().filter(|c| *c == SENTINEL));
                    out
                })
                .into_owned();
            if next == current {
                break;
            }
            hits += found;
            current = next;
        }

        (current, hits)
    }

    fn is_exception(&self, matched: &str) -> bool {
        if self.exceptions.is_empty() {
            return false;
        }
        let word = matched.to_lowercase();
        self.exceptions.iter().any(|e| *e == word)
    }
}

/// Ordered, validated rule table.
#[derive(Debug, Clone)]
pub struct RuleSet {
    version: u32,
    rules: Vec<RepairRule>,
}

impl RuleSet {
    /// Compile and validate a rule table.
    ///
    /// Fails on duplicate ids, invalid patterns, or an `applies_after`
    /// that does not name an earlier rule.
    pub fn new(version: u32, specs: Vec<RuleSpec>) -> AppResult<Self> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(specs.len());

        for spec in specs {
            if let Some(dep) = spec.applies_after {
                if !seen.contains(dep) {
                    return Err(AppError::Config(format!(
                        "Rule '{}' must apply after '{}', which is not an earlier rule",
                        spec.id, dep
                    )));
                }
            }
            if !seen.insert(spec.id) {
                return Err(AppError::Config(format!("Duplicate rule id '{}'", spec.id)));
            }

            let regex = Regex::new(&spec.pattern).map_err(|e| {
                AppError::Config(format!("Invalid pattern for rule '{}': {}", spec.id, e))
            })?;

            rules.push(RepairRule {
                id: spec.id,
                description: spec.description,
                applies_after: spec.applies_after,
                regex,
                replacement: spec.replacement,
                exceptions: spec.exceptions,
            });
        }

        Ok(Self { version, rules })
    }

    /// The built-in Spanish OCR repair table.
    pub fn builtin() -> &'static RuleSet {
        &BUILTIN
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn rules(&self) -> &[RepairRule] {
        &self.rules
    }

    /// Apply every rule in order, counting hits per rule id.
    pub(super) fn apply(&self, text: &str, report: &mut CleaningReport) -> String {
        let mut current = text.to_string();
        for rule in &self.rules {
            let (next, hits) = rule.apply(&current);
            if hits > 0 {
                *report.rule_hits.entry(rule.id.to_string()).or_insert(0) += hits;
            }
            current = next;
        }
        current
    }
}

static BUILTIN: LazyLock<RuleSet> = LazyLock::new(|| {
    RuleSet::new(RULESET_VERSION, builtin_specs()).expect("built-in repair rules are valid")
});

/// Policy-domain words that OCR frequently glues onto a preceding function word.
const GLUED_WORDS: &[&str] = &[
    "gobierno",
    "propuestas",
    "propuesta",
    "ciudadanía",
    "ciudadanos",
    "seguridad",
    "corrupción",
    "economía",
    "educación",
    "salud",
    "vivienda",
    "transparencia",
    "infraestructura",
    "democracia",
    "participación",
    "municipalidad",
    "pobreza",
    "empleo",
];

/// Real words that look like a function word glued to a domain word.
const GLUED_EXCEPTIONS: &[&str] = &[
    "conciudadanos",
    "conciudadano",
    "conciudadanía",
];

const FUNCTION_WORDS: &[&str] = &[
    "de", "del", "la", "las", "el", "los", "en", "y", "para", "con", "por", "su", "sus",
];

/// Known word splits with their repaired form.
const BROKEN_PAIRS: &[(&str, &str, &str)] = &[
    ("de", "mocracia", "democracia"),
    ("gobier", "no", "gobierno"),
    ("ciuda", "danía", "ciudadanía"),
    ("se", "guridad", "seguridad"),
    ("eco", "nomía", "economía"),
    ("educa", "ción", "educación"),
    ("desa", "rrollo", "desarrollo"),
    ("institu", "ciones", "instituciones"),
    ("trans", "parencia", "transparencia"),
    ("corrup", "ción", "corrupción"),
];

fn builtin_specs() -> Vec<RuleSpec> {
    let mut specs = vec![
        RuleSpec {
            id: "colon-ti",
            description: "colon glyph read in place of 'ti' before a vowel",
            pattern: r"([a-záéíóúñ]):([aeiouáéíóú])".to_string(),
            replacement: "${1}ti${2}".to_string(),
            applies_after: None,
            exceptions: &[],
        },
        RuleSpec {
            id: "case-boundary",
            description: "missing space between a lowercase run and a capitalised word",
            pattern: r"([a-záéíóúñ]{2})([A-ZÁÉÍÓÚÑ][a-záéíóúñ])".to_string(),
            replacement: "${1} ${2}".to_string(),
            applies_after: Some("colon-ti"),
            exceptions: &[],
        },
        RuleSpec {
            id: "glued-domain-word",
            description: "function word run together with a policy-domain word",
            pattern: format!(
                r"(?i)\b({})({})\b",
                FUNCTION_WORDS.join("|"),
                GLUED_WORDS.join("|")
            ),
            replacement: "${1} ${2}".to_string(),
            applies_after: Some("case-boundary"),
            exceptions: GLUED_EXCEPTIONS,
        },
    ];

    let sep = format!(r"[\s{}]+", SENTINEL);
    specs.extend(BROKEN_PAIRS.iter().map(|&(left, right, fixed)| RuleSpec {
        id: fixed,
        description: "known broken word pair",
        pattern: format!(r"\b{}{}{}\b", left, sep, right),
        replacement: fixed.to_string(),
        applies_after: Some("glued-domain-word"),
        exceptions: &[],
    }));

    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(text: &str) -> String {
        let mut report = CleaningReport::default();
        RuleSet::builtin().apply(text, &mut report)
    }

    fn rule(id: &str) -> &'static RepairRule {
        RuleSet::builtin()
            .rules()
            .iter()
            .find(|r| r.id == id)
            .unwrap()
    }

    #[test]
    fn test_builtin_table_is_valid() {
        let set = RuleSet::builtin();
        assert_eq!(set.version(), RULESET_VERSION);
        assert!(set.rules().len() >= 4);
    }

    #[test]
    fn test_colon_ti() {
        assert_eq!(rule("colon-ti").apply("ges:ón").0, "gestión");
        assert_eq!(rule("colon-ti").apply("la cues:ón").0, "la cuestión");
        assert_eq!(rule("colon-ti").apply("Hora: ocho").0, "Hora: ocho");
    }

    #[test]
    fn test_colon_ti_chained() {
        assert_eq!(rule("colon-ti").apply("a:e:i").0, "atietii");
    }

    #[test]
    fn test_case_boundary() {
        let (out, hits) = rule("case-boundary").apply("desarrolloSostenible del paísCosta");
        assert_eq!(out, "desarrollo Sostenible del país Costa");
        assert_eq!(hits, 2);
        assert_eq!(rule("case-boundary").apply("AyA y McDonald").0, "AyA y McDonald");
    }

    #[test]
    fn test_glued_domain_word() {
        assert_eq!(apply("delgobierno y laseguridad"), "del gobierno y la seguridad");
        assert_eq!(apply("la inseguridad"), "la inseguridad");
        assert_eq!(apply("enseguridad vial"), "en seguridad vial");
    }

    #[test]
    fn test_glued_rule_skips_real_words() {
        assert_eq!(apply("Estimados conciudadanos"), "Estimados conciudadanos");
        assert_eq!(apply("Conciudadano y conciudadanía"), "Conciudadano y conciudadanía");

        let mut report = CleaningReport::default();
        RuleSet::builtin().apply("conciudadanos delgobierno", &mut report);
        assert_eq!(report.rule_hits.get("glued-domain-word"), Some(&1));
    }

    #[test]
    fn test_broken_pairs() {
        assert_eq!(apply("la de mocracia"), "la democracia");
        assert_eq!(apply("la de\nmocracia"), "la democracia");
        assert_eq!(apply("de mocratizar"), "de mocratizar");
    }

    #[test]
    fn test_broken_pair_keeps_sentinel() {
        let text = format!("de {}mocracia plena", SENTINEL);
        assert_eq!(apply(&text), format!("democracia{} plena", SENTINEL));
    }

    #[test]
    fn test_rejects_forward_dependency() {
        let specs = vec![RuleSpec {
            id: "first",
            description: "",
            pattern: "a".to_string(),
            replacement: "b".to_string(),
            applies_after: Some("second"),
            exceptions: &[],
        }];
        assert!(matches!(RuleSet::new(1, specs), Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let spec = RuleSpec {
            id: "dup",
            description: "",
            pattern: "a".to_string(),
            replacement: "b".to_string(),
            applies_after: None,
            exceptions: &[],
        };
        assert!(RuleSet::new(1, vec![spec.clone(), spec]).is_err());
    }

    #[test]
    fn test_rule_hits_reported() {
        let mut report = CleaningReport::default();
        RuleSet::builtin().apply("ges:ón en salud", &mut report);
        assert_eq!(report.rule_hits.get("colon-ti"), Some(&1));
    }
}
