//! Reference municipal index: postal codes per municipality, keyed by admin code.

pub mod source;

use hashbrown::HashMap;
use tracing::warn;

use crate::models::MunicipalIndexEntry;
use crate::pip::{normalize_admin_code, normalize_place_name};

pub use source::{load_municipal_csv, parse_municipal_csv};

#[derive(Debug, Clone, Default)]
pub struct MunicipalIndex {
    by_code: HashMap<String, MunicipalIndexEntry>,
    /// Normalized municipality name -> admin codes (names repeat across departments)
    by_name: HashMap<String, Vec<String>>,
}

impl MunicipalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge an entry. Returns false when its admin code is unusable.
    pub fn upsert(&mut self, mut entry: MunicipalIndexEntry) -> bool {
        let Some(code) = normalize_admin_code(&entry.admin_code) else {
            warn!(
                "Skipping municipal entry without admin code: {}",
                entry.municipality
            );
            return false;
        };
        entry.admin_code = code.clone();

        let name = normalize_place_name(&entry.municipality);
        if !name.is_empty() {
            let codes = self.by_name.entry(name).or_default();
            if !codes.contains(&code) {
                codes.push(code.clone());
            }
        }

        match self.by_code.get_mut(&code) {
            Some(existing) => existing.merge(entry),
            None => {
                self.by_code.insert(code, entry);
            }
        }
        true
    }

    pub fn upsert_all(&mut self, entries: impl IntoIterator<Item = MunicipalIndexEntry>) -> usize {
        entries
            .into_iter()
            .map(|entry| self.upsert(entry))
            .filter(|inserted| *inserted)
            .count()
    }

    pub fn by_admin_code(&self, raw: &str) -> Option<&MunicipalIndexEntry> {
        self.by_code.get(&normalize_admin_code(raw)?)
    }

    /// Entry for a city name; a name shared by several municipalities is
    /// disambiguated by department, and stays unresolved otherwise.
    pub fn by_city(&self, city: &str, department: &str) -> Option<&MunicipalIndexEntry> {
        let codes = self.by_name.get(&normalize_place_name(city))?;
        if let [only] = codes.as_slice() {
            return self.by_code.get(only);
        }

        let department = normalize_place_name(department);
        if department.is_empty() {
            return None;
        }
        let mut matching = codes
            .iter()
            .filter_map(|code| self.by_code.get(code))
            .filter(|entry| normalize_place_name(&entry.department) == department);
        match (matching.next(), matching.next()) {
            (Some(entry), None) => Some(entry),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AreaType, PostalCodeEntry};

    fn entry(code: &str, municipality: &str, department: &str, postal: &str) -> MunicipalIndexEntry {
        MunicipalIndexEntry {
            admin_code: code.to_string(),
            municipality: municipality.to_string(),
            department: department.to_string(),
            postal_codes: vec![PostalCodeEntry {
                postal_code: postal.to_string(),
                area_type: AreaType::Urban,
            }],
            preferred: postal.to_string(),
        }
    }

    #[test]
    fn test_upsert_merges_by_code() {
        let mut index = MunicipalIndex::new();
        assert!(index.upsert(entry("5001", "Medellín", "Antioquia", "050001")));
        assert!(index.upsert(entry("05001", "Medellín", "Antioquia", "050010")));
        assert_eq!(index.len(), 1);

        let merged = index.by_admin_code("05001").unwrap();
        assert_eq!(merged.postal_codes.len(), 2);
        assert_eq!(merged.preferred, "050010");
        assert!(!index.upsert(entry("", "Nowhere", "", "000000")));
    }

    #[test]
    fn test_by_city_disambiguates_by_department() {
        let mut index = MunicipalIndex::new();
        index.upsert(entry("76001", "Santiago de Cali", "Valle del Cauca", "760001"));
        index.upsert(entry("05107", "Briceño", "Antioquia", "051820"));
        index.upsert(entry("15106", "Briceño", "Boyacá", "154401"));

        assert_eq!(
            index.by_city("santiago de cali", "").unwrap().admin_code,
            "76001"
        );
        assert!(index.by_city("Briceño", "").is_none());
        assert_eq!(
            index.by_city("BRICENO", "Boyaca").unwrap().preferred,
            "154401"
        );
        assert!(index.by_city("Atlantis", "").is_none());
    }
}
