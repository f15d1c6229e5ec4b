//! Street address canonicalization for geocoding queries.
//!
//! Colombian addresses follow the "street type + street number # house number"
//! pattern (`Calle 59C # 2C-76`). Input arrives in every imaginable variation of
//! that, with unit details, neighbourhoods and e-mail addresses mixed in; the
//! functions here reduce it to the part a geocoder can use.

use regex::Regex;
use std::sync::LazyLock;

use super::{fold, SynonymService};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.+-]+@[\w-]+(?:\.[\w-]+)*").unwrap());

/// House-number markers glued to (or directly before) a number
static NUMBER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bn[°º]\.?|\bno\.?|\bnro\.?|\bnum\.?|\bn[uú]mero)\s*(\d)").unwrap()
});

static RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[A-Za-z]?)\s*-\s*(\d)").unwrap());

/// Street type abbreviations (folded) and their expansion
const STREET_TYPES: &[(&str, &str)] = &[
    ("calle", "Calle"),
    ("cl", "Calle"),
    ("cll", "Calle"),
    ("clle", "Calle"),
    ("call", "Calle"),
    ("carrera", "Carrera"),
    ("cra", "Carrera"),
    ("cr", "Carrera"),
    ("crr", "Carrera"),
    ("carr", "Carrera"),
    ("kr", "Carrera"),
    ("kra", "Carrera"),
    ("avenida", "Avenida"),
    ("av", "Avenida"),
    ("avda", "Avenida"),
    ("ave", "Avenida"),
    ("ak", "Avenida Carrera"),
    ("ac", "Avenida Calle"),
    ("diagonal", "Diagonal"),
    ("dg", "Diagonal"),
    ("diag", "Diagonal"),
    ("transversal", "Transversal"),
    ("tv", "Transversal"),
    ("tr", "Transversal"),
    ("trans", "Transversal"),
    ("transv", "Transversal"),
    ("circular", "Circular"),
    ("cq", "Circular"),
    ("circ", "Circular"),
    ("autopista", "Autopista"),
    ("autop", "Autopista"),
];

/// Canonical street type words, as emitted by [`normalize_address`]
const STREET_WORDS: &[&str] = &[
    "Calle",
    "Carrera",
    "Avenida",
    "Diagonal",
    "Transversal",
    "Circular",
    "Autopista",
];

/// Unit / floor / tower / block / neighbourhood words; everything after is dropped
const STOP_WORDS: &[&str] = &[
    "apto",
    "apt",
    "apartamento",
    "piso",
    "torre",
    "bloque",
    "blq",
    "bl",
    "interior",
    "int",
    "barrio",
    "br",
    "urbanizacion",
    "urb",
    "conjunto",
    "conj",
    "edificio",
    "edif",
    "local",
    "oficina",
    "of",
    "casa",
    "manzana",
    "mz",
    "etapa",
    "lote",
];

const NUMBER_MARKERS: &[&str] = &["#", "no", "nro", "num", "numero", "n°", "nº"];

const NUMBER_QUALIFIERS: &[&str] = &["bis", "sur", "este", "norte", "oeste"];

/// Noise that ends the useful part of an address in [`clean_for_query`]
const NOISE_WORDS: &[&str] = &[
    "piso",
    "apto",
    "apt",
    "apartamento",
    "frente",
    "esquina",
    "cerca",
    "junto",
    "detras",
    "diagonal a",
];

/// Connectors left dangling once noise is cut ("... en frente de")
const CONNECTORS: &[&str] = &["en", "a", "al", "de", "del", "y", "por"];

/// City names that show up inside address text
const KNOWN_CITIES: &[&str] = &[
    "bogota",
    "medellin",
    "cali",
    "barranquilla",
    "cartagena",
    "bucaramanga",
    "pereira",
    "manizales",
    "cucuta",
    "ibague",
    "santa marta",
    "villavicencio",
    "pasto",
    "monteria",
    "neiva",
    "armenia",
    "popayan",
    "valledupar",
    "sincelejo",
    "tunja",
    "soacha",
    "bello",
    "envigado",
    "itagui",
    "palmira",
];

/// Canonicalize an address for use as a geocoding query.
///
/// The result is a fixed point: `normalize_address(&normalize_address(x)) == normalize_address(x)`.
pub fn normalize_address(input: &str) -> String {
    let text = EMAIL.replace_all(input, " ");
    let text = text.replace('#', " # ").replace([',', ';'], " ");
    let text = NUMBER_MARKER.replace_all(&text, " # ${1}");
    let text = RANGE.replace_all(&text, "${1}-${2}");

    let mut tokens: Vec<String> = Vec::new();
    for raw in text.split_whitespace() {
        let key = fold(raw.trim_matches(|c: char| c == '.' || c == ':'));
        if key.is_empty() {
            continue;
        }

        if STOP_WORDS.contains(&key.as_str()) {
            break;
        }

        if NUMBER_MARKERS.contains(&key.as_str()) {
            if tokens.last().map(String::as_str) != Some("#") {
                tokens.push("#".to_string());
            }
            continue;
        }

        if let Some((_, full)) = STREET_TYPES.iter().find(|(abbr, _)| *abbr == key) {
            tokens.extend(full.split(' ').map(str::to_string));
            continue;
        }

        let starts_with_digit = raw.chars().next().is_some_and(|c| c.is_ascii_digit());
        let is_single_letter = raw.chars().count() == 1 && raw.chars().all(char::is_alphabetic);
        if starts_with_digit || is_single_letter || key == "bis" {
            tokens.push(raw.to_uppercase());
        } else {
            tokens.push(raw.to_string());
        }
    }

    insert_house_separator(&mut tokens);

    // a marker with nothing after it is noise
    while tokens.last().map(String::as_str) == Some("#") {
        tokens.pop();
    }

    tokens.join(" ")
}

/// Insert `#` between the street-number run and a following house-number run
/// when the separator is missing ("Calle 59C 2C-76" → "Calle 59C # 2C-76").
fn insert_house_separator(tokens: &mut Vec<String>) {
    if tokens.iter().any(|t| t == "#") {
        return;
    }
    let Some(start) = tokens.iter().position(|t| is_street_word(t)) else {
        return;
    };

    let mut i = start;
    while i < tokens.len() && is_street_word(&tokens[i]) {
        i += 1;
    }
    if i >= tokens.len() || !starts_with_digit(&tokens[i]) {
        return;
    }
    i += 1;
    while i < tokens.len() && is_number_qualifier(&tokens[i]) {
        i += 1;
    }
    if i < tokens.len() && starts_with_digit(&tokens[i]) {
        tokens.insert(i, "#".to_string());
    }
}

fn is_street_word(token: &str) -> bool {
    STREET_WORDS.contains(&token)
}

fn starts_with_digit(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn is_number_qualifier(token: &str) -> bool {
    let folded = fold(token);
    NUMBER_QUALIFIERS.contains(&folded.as_str())
        || (token.chars().count() == 1 && token.chars().all(char::is_alphabetic))
}

/// Trim an address down to the part worth geocoding.
///
/// Cuts at the first comma and at noise keywords (floor, apartment, "frente a",
/// "esquina", ...), then removes embedded city names that conflict with `city`.
/// City names are compared through their canonical synonym, so "Santiago de
/// Cali" keeps an embedded "Cali".
pub fn clean_for_query(address: &str, city: &str, synonyms: &SynonymService) -> String {
    let head = address.split(',').next().unwrap_or_default();

    let tokens: Vec<&str> = head.split_whitespace().collect();
    let folded: Vec<String> = tokens
        .iter()
        .map(|t| fold(t.trim_matches(|c: char| !c.is_alphanumeric())))
        .collect();

    let noise = (0..folded.len()).find(|&i| {
        NOISE_WORDS
            .iter()
            .any(|noise| matches_words(&folded[i..], noise))
    });
    let mut end = noise.unwrap_or(tokens.len());
    // "en frente", "cerca al": the connector belongs to the noise phrase
    if noise.is_some() {
        while end > 0 && CONNECTORS.contains(&folded[end - 1].as_str()) {
            end -= 1;
        }
    }

    let own_city = synonyms.canonical(city);
    let mut keep = vec![true; end];
    for known in KNOWN_CITIES {
        if !own_city.is_empty() && synonyms.canonical(known) == own_city {
            continue;
        }
        let width = known.split(' ').count();
        let mut i = 0;
        while i + width <= end {
            if matches_words(&folded[i..end], known) {
                keep[i..i + width].iter_mut().for_each(|k| *k = false);
                i += width;
            } else {
                i += 1;
            }
        }
    }

    let kept: Vec<&str> = tokens[..end]
        .iter()
        .zip(keep)
        .filter_map(|(t, k)| k.then_some(*t))
        .collect();
    kept.join(" ")
}

/// Whether `tokens` starts with the space-separated words of `phrase`
fn matches_words(tokens: &[String], phrase: &str) -> bool {
    let words: Vec<&str> = phrase.split(' ').collect();
    tokens.len() >= words.len() && words.iter().zip(tokens).all(|(w, t)| *w == t.as_str())
}

/// The street part of a normalized address ("Calle 59C # 2C-76" → "Calle 59C").
pub fn extract_street(normalized: &str) -> Option<String> {
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let start = tokens.iter().position(|t| is_street_word(t))?;

    let mut end = start;
    while end < tokens.len() && is_street_word(tokens[end]) {
        end += 1;
    }
    if end >= tokens.len() || !starts_with_digit(tokens[end]) {
        return None;
    }
    end += 1;
    while end < tokens.len() && tokens[end] != "#" && is_number_qualifier(tokens[end]) {
        end += 1;
    }

    Some(tokens[start..end].join(" "))
}
