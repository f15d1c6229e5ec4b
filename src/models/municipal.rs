//! Reference municipal index entries.

use serde::{Deserialize, Serialize};

use crate::normalize::fold;

/// Markers that point at a rural delivery area
const RURAL_MARKERS: &[&str] = &[
    "vereda",
    "vda",
    "corregimiento",
    "corr",
    "finca",
    "hacienda",
    "parcela",
    "km",
    "kilometro",
    "rural",
    "caserio",
    "inspeccion",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaType {
    Urban,
    Rural,
}

impl AreaType {
    /// Parse the tabular source's area column ("urbano", "rural", "U", "R", ...)
    pub fn parse(value: &str) -> Option<Self> {
        match fold(value.trim()).as_str() {
            "urban" | "urbano" | "urbana" | "u" => Some(AreaType::Urban),
            "rural" | "r" => Some(AreaType::Rural),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalCodeEntry {
    pub postal_code: String,
    pub area_type: AreaType,
}

/// Reference data for one municipality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalIndexEntry {
    pub admin_code: String,
    pub municipality: String,
    pub department: String,
    pub postal_codes: Vec<PostalCodeEntry>,
    pub preferred: String,
}

impl MunicipalIndexEntry {
    pub fn urban_codes(&self) -> impl Iterator<Item = &str> {
        self.codes_of(AreaType::Urban)
    }

    pub fn rural_codes(&self) -> impl Iterator<Item = &str> {
        self.codes_of(AreaType::Rural)
    }

    fn codes_of(&self, area_type: AreaType) -> impl Iterator<Item = &str> {
        self.postal_codes
            .iter()
            .filter(move |e| e.area_type == area_type)
            .map(|e| e.postal_code.as_str())
    }

    /// At most one urban code: geocoding cannot refine the answer
    pub fn is_unambiguous(&self) -> bool {
        self.urban_codes().count() <= 1
    }

    /// Preferred code, or the first rural code when the address looks rural
    pub fn code_for_address(&self, address: &str) -> &str {
        if looks_rural(address) {
            if let Some(rural) = self.rural_codes().next() {
                return rural;
            }
        }
        &self.preferred
    }

    /// Union postal codes from `other` into this entry; `other` wins on names and preference
    pub fn merge(&mut self, other: MunicipalIndexEntry) {
        for code in other.postal_codes {
            if !self
                .postal_codes
                .iter()
                .any(|e| e.postal_code == code.postal_code)
            {
                self.postal_codes.push(code);
            }
        }
        if !other.municipality.is_empty() {
            self.municipality = other.municipality;
        }
        if !other.department.is_empty() {
            self.department = other.department;
        }
        if !other.preferred.is_empty() {
            self.preferred = other.preferred;
        }
    }
}

/// Keyword heuristic for rural addresses
pub fn looks_rural(address: &str) -> bool {
    let folded = fold(address);
    folded
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| RURAL_MARKERS.contains(&token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> MunicipalIndexEntry {
        MunicipalIndexEntry {
            admin_code: "25175".into(),
            municipality: "Chía".into(),
            department: "Cundinamarca".into(),
            postal_codes: vec![
                PostalCodeEntry {
                    postal_code: "250001".into(),
                    area_type: AreaType::Urban,
                },
                PostalCodeEntry {
                    postal_code: "250008".into(),
                    area_type: AreaType::Rural,
                },
            ],
            preferred: "250001".into(),
        }
    }

    #[test]
    fn test_rural_heuristic() {
        let e = entry();
        assert_eq!(e.code_for_address("Vereda Fagua, Finca El Roble"), "250008");
        assert_eq!(e.code_for_address("Km 3 via Cajicá"), "250008");
        assert_eq!(e.code_for_address("Carrera 10 # 12-30"), "250001");
        // "kmart" must not trip the km marker
        assert_eq!(e.code_for_address("Calle 2 Kmart"), "250001");
    }

    #[test]
    fn test_merge_unions_codes() {
        let mut e = entry();
        let mut update = entry();
        update.postal_codes = vec![PostalCodeEntry {
            postal_code: "250002".into(),
            area_type: AreaType::Urban,
        }];
        update.preferred = "250002".into();
        e.merge(update);
        assert_eq!(e.postal_codes.len(), 3);
        assert_eq!(e.preferred, "250002");
        assert!(!e.is_unambiguous());
    }

    #[test]
    fn test_area_type_parse() {
        assert_eq!(AreaType::parse("Urbano"), Some(AreaType::Urban));
        assert_eq!(AreaType::parse(" R "), Some(AreaType::Rural));
        assert_eq!(AreaType::parse("mixto"), None);
    }
}
