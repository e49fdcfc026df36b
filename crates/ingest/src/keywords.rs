//! Keyword ranking and entity recognition for Costa Rican policy documents.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use crate::lexicon;
use crate::types::KeywordExtractionResult;

/// Default number of keywords kept per chunk.
pub const DEFAULT_MAX_KEYWORDS: usize = 10;

const MIN_GRAM_CHARS: usize = 3;

const ACRONYMS: &[&str] = &[
    "PLN", "PUSC", "PAC", "FA", "PLP", "PNR", "CCSS", "ICE", "INS", "MEP", "MOPT", "AyA", "INVU",
    "IMAS", "TSE", "OIJ", "UCR", "TEC", "UNA", "UNED", "CNE", "ONU", "OCDE", "BID", "FMI", "BCCR",
    "RECOPE", "JAPDEVA", "MIDEPLAN", "MINAE", "MAG", "MEIC", "MIVAH", "MICITT",
];

const PLACES: &[&str] = &[
    "San José", "Alajuela", "Cartago", "Heredia", "Guanacaste", "Puntarenas", "Limón",
    "Liberia", "Nicoya", "Santa Cruz", "San Carlos", "Pérez Zeledón", "Desamparados",
    "Golfito", "Osa", "Talamanca", "Upala", "Los Chiles", "Turrialba", "Grecia",
    "Escazú", "Curridabat", "Goicoechea", "Tibás", "Moravia", "Coto Brus", "Sarapiquí",
    "Quepos", "Siquirres", "Pococí", "Costa Rica",
];

const BODIES: &str = "Ministerio|Instituto|Consejo|Caja|Asamblea|Tribunal|Contraloría|Defensoría|Procuraduría|Banco|Poder|Sala|Corte|Universidad|Municipalidad|Dirección|Superintendencia|Autoridad|Comisión";

const CAPITALIZED: &str = r"\p{Lu}\p{Ll}+";

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("word pattern is valid"));

static ACRONYM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", ACRONYMS.join("|"))).expect("acronym pattern is valid")
});

static PLACE: LazyLock<Regex> = LazyLock::new(|| {
    let names: Vec<String> = PLACES.iter().map(|p| p.replace(' ', r"\s+")).collect();
    Regex::new(&format!(r"\b(?:{})\b", names.join("|"))).expect("place pattern is valid")
});

static GOVERNMENT_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?:{bodies})\s+(?:de|del|para)\s+(?:(?:la|el|los|las)\s+)?{cap}(?:\s+(?:(?:de|del|y)\s+)?{cap})*",
        bodies = BODIES,
        cap = CAPITALIZED
    ))
    .expect("government body pattern is valid")
});

static ORGANISATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b{cap}(?:\s+{cap})*\s+(?:de|del|para)\s+{cap}(?:\s+{cap})*",
        cap = CAPITALIZED
    ))
    .expect("organisation pattern is valid")
});

#[derive(Debug)]
struct Gram {
    first_seen: usize,
    count: usize,
    size: usize,
    capitalized: bool,
}

/// Extract ranked keywords and entities from `text`.
pub fn extract(text: &str, max_keywords: usize) -> KeywordExtractionResult {
    KeywordExtractionResult {
        keywords: rank_keywords(text, max_keywords),
        entities: extract_entities(text),
    }
}

fn rank_keywords(text: &str, max_keywords: usize) -> Vec<String> {
    let tokens: Vec<(String, bool)> = WORD
        .find_iter(text)
        .map(|m| {
            let word = m.as_str();
            let capitalized = word.chars().next().is_some_and(char::is_uppercase);
            (word.to_lowercase(), capitalized)
        })
        .collect();

    let mut grams: HashMap<String, Gram> = HashMap::new();
    let mut order = 0;
    for start in 0..tokens.len() {
        for size in 1..=3 {
            let Some(window) = tokens.get(start..start + size) else {
                break;
            };
            if window.iter().all(|(w, _)| lexicon::is_stopword(w)) {
                continue;
            }
            let phrase = window
                .iter()
                .map(|(w, _)| w.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            if phrase.chars().count() < MIN_GRAM_CHARS {
                continue;
            }

            grams
                .entry(phrase)
                .and_modify(|g| g.count += 1)
                .or_insert_with(|| {
                    order += 1;
                    Gram {
                        first_seen: order,
                        count: 1,
                        size,
                        capitalized: window[0].1,
                    }
                });
        }
    }

    let mut scored: Vec<(String, f64, usize)> = grams
        .into_iter()
        .map(|(phrase, gram)| {
            let score = gram_score(&phrase, &gram);
            (phrase, score, gram.first_seen)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.cmp(&b.2)));

    scored
        .into_iter()
        .take(max_keywords)
        .map(|(phrase, _, _)| phrase)
        .collect()
}

fn gram_score(phrase: &str, gram: &Gram) -> f64 {
    let mut score = gram.count as f64;
    if lexicon::contains_domain_keyword(phrase) {
        score *= 2.0;
    }
    score *= match gram.size {
        2 => 1.5,
        3 => 2.0,
        _ => 1.0,
    };
    if gram.capitalized {
        score *= 1.3;
    }
    score
}

fn extract_entities(text: &str) -> BTreeSet<String> {
    [&*ACRONYM, &*PLACE, &*GOVERNMENT_BODY, &*ORGANISATION]
        .into_iter()
        .flat_map(|re| re.find_iter(text))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}
