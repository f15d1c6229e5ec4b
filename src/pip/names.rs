//! Lookup keys for municipality names and admin codes.

use regex::Regex;
use std::sync::LazyLock;

use crate::normalize::{collapse_whitespace, fold};

/// Width of a municipality code
pub const ADMIN_CODE_WIDTH: usize = 5;

/// Every spelling of the capital collapses to this key
pub const CAPITAL_KEY: &str = "bogota";

static PARENTHETICAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").unwrap());

static QUALIFIERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:ciudad de|municipio de|distrito capital)\b|\bd\s*\.\s*c\b\.?").unwrap()
});

/// Normalize a municipality or department name into a lookup key.
///
/// `"Bogotá, D.C."`, `"BOGOTA DISTRITO CAPITAL"` and `"Santa Fe de Bogotá"` all
/// become `"bogota"`; `"Municipio de Chía (Cund.)"` becomes `"chia"`.
pub fn normalize_place_name(name: &str) -> String {
    let folded = fold(name);
    let text = PARENTHETICAL.replace_all(&folded, " ");
    let text = QUALIFIERS.replace_all(&text, " ");
    let text: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let tokens: Vec<&str> = text.split_whitespace().filter(|t| *t != "dc").collect();
    if tokens.contains(&CAPITAL_KEY) {
        return CAPITAL_KEY.to_string();
    }
    collapse_whitespace(&tokens.join(" "))
}

/// Digits of a raw admin code, zero-padded to [`ADMIN_CODE_WIDTH`].
///
/// Longer codes keep their trailing digits. Returns `None` when there are no digits.
pub fn normalize_admin_code(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if digits.len() > ADMIN_CODE_WIDTH {
        return Some(digits[digits.len() - ADMIN_CODE_WIDTH..].to_string());
    }
    Some(format!("{:0>width$}", digits, width = ADMIN_CODE_WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_name_qualifiers() {
        assert_eq!(normalize_place_name("Municipio de Chía (Cund.)"), "chia");
        assert_eq!(normalize_place_name("  CIUDAD DE  Cartagena "), "cartagena");
        assert_eq!(normalize_place_name("Valle del Cauca"), "valle del cauca");
        assert_eq!(normalize_place_name("San José de Cúcuta"), "san jose de cucuta");
    }

    #[test]
    fn test_capital_variants_collapse() {
        for name in [
            "Bogotá, D.C.",
            "BOGOTA D.C",
            "Bogota DC",
            "Bogotá Distrito Capital",
            "Santa Fe de Bogotá",
            "bogota",
        ] {
            assert_eq!(normalize_place_name(name), CAPITAL_KEY, "name: {}", name);
        }
        assert_eq!(normalize_place_name("Distrito Capital"), "");
    }

    #[test]
    fn test_admin_code() {
        assert_eq!(normalize_admin_code("76001").as_deref(), Some("76001"));
        assert_eq!(normalize_admin_code("5001").as_deref(), Some("05001"));
        assert_eq!(normalize_admin_code(" 05-001 ").as_deref(), Some("05001"));
        assert_eq!(normalize_admin_code("1176001").as_deref(), Some("76001"));
        assert_eq!(normalize_admin_code("n/a"), None);
    }
}
