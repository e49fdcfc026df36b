//! Spanish word lists shared by the quality scorer and the keyword extractor.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Policy-domain vocabulary found in government plans.
pub const DOMAIN_KEYWORDS: &[&str] = &[
    "gobierno",
    "propuesta",
    "plan",
    "política",
    "público",
    "pública",
    "desarrollo",
    "educación",
    "salud",
    "seguridad",
    "economía",
    "económico",
    "empleo",
    "vivienda",
    "infraestructura",
    "transparencia",
    "corrupción",
    "ambiente",
    "ambiental",
    "pobreza",
    "igualdad",
    "derechos",
    "democracia",
    "ciudadanía",
    "ciudadano",
    "municipal",
    "nacional",
    "reforma",
    "inversión",
    "agricultura",
    "turismo",
    "energía",
    "transporte",
    "innovación",
    "tecnología",
    "cultura",
    "justicia",
    "fiscal",
    "impuesto",
    "pensiones",
];

const STOPWORDS: &[&str] = &[
    "a", "al", "ante", "bajo", "cada", "como", "con", "contra", "cual", "cuando", "de", "del",
    "desde", "donde", "durante", "e", "el", "ella", "ellas", "ellos", "en", "entre", "era",
    "es", "esa", "ese", "eso", "esta", "este", "esto", "estos", "estas", "está", "están", "fue",
    "han", "hasta", "hay", "la", "las", "le", "les", "lo", "los", "más", "mas", "muy", "ni",
    "no", "nos", "nuestra", "nuestro", "nuestras", "nuestros", "o", "otra", "otro", "para",
    "pero", "por", "porque", "que", "qué", "se", "sea", "ser", "si", "sí", "sin", "sobre",
    "son", "su", "sus", "también", "tiene", "todo", "todos", "todas", "tras", "un", "una",
    "uno", "unos", "unas", "y", "ya",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

/// Whether a lower-cased word is a Spanish stopword.
pub fn is_stopword(word: &str) -> bool {
    STOPWORD_SET.contains(word)
}

/// Whether lower-cased text contains any domain keyword.
pub fn contains_domain_keyword(lower: &str) -> bool {
    DOMAIN_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
