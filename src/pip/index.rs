//! Lookup maps over postal zones.

use hashbrown::HashMap;
use std::sync::Arc;
use tracing::info;

use super::names::{normalize_admin_code, normalize_place_name, ADMIN_CODE_WIDTH};
use crate::models::PostalZone;

type ZoneMap = HashMap<String, Vec<Arc<PostalZone>>>;

/// Postal zones keyed by admin code, municipality name and department name.
///
/// Every map points at the same `Arc`s, so a zone found by code and by name is
/// the same zone.
#[derive(Debug, Default)]
pub struct ZoneIndex {
    zones: Vec<Arc<PostalZone>>,
    by_code: ZoneMap,
    by_name: ZoneMap,
    by_department: ZoneMap,
    /// Admin codes present in `by_code`, sorted
    codes: Vec<String>,
}

impl ZoneIndex {
    /// Build every map in one pass over the zones
    pub fn build(zones: Vec<PostalZone>) -> Self {
        info!("Building zone index for {} zones...", zones.len());

        let mut index = Self::default();
        for zone in zones {
            let zone = Arc::new(zone);

            if let Some(code) = normalize_admin_code(&zone.admin_code) {
                index.by_code.entry(code).or_default().push(Arc::clone(&zone));
            }

            let name = normalize_place_name(&zone.municipality);
            if !name.is_empty() {
                index.by_name.entry(name).or_default().push(Arc::clone(&zone));
            }

            let department = normalize_place_name(&zone.department);
            if !department.is_empty() {
                index
                    .by_department
                    .entry(department)
                    .or_default()
                    .push(Arc::clone(&zone));
            }

            index.zones.push(zone);
        }

        index.codes = index.by_code.keys().cloned().collect();
        index.codes.sort();

        info!(
            "Zone index built: {} zones, {} admin codes, {} municipality names",
            index.zones.len(),
            index.by_code.len(),
            index.by_name.len()
        );
        index
    }

    pub fn zones(&self) -> &[Arc<PostalZone>] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zones whose normalized admin code equals the normalized `raw`
    pub fn by_admin_code(&self, raw: &str) -> &[Arc<PostalZone>] {
        normalize_admin_code(raw)
            .and_then(|code| self.by_code.get(&code))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Zones whose code starts with the raw digits (a truncated code such as "76" or "7600")
    pub fn by_admin_code_prefix(&self, raw: &str) -> Vec<Arc<PostalZone>> {
        let digits = digits_of(raw);
        if digits.len() < 2 || digits.len() > ADMIN_CODE_WIDTH {
            return Vec::new();
        }
        self.collect_codes(|code| code.starts_with(&digits))
    }

    /// Zones whose code ends with the raw digits, leading zeros ignored ("5001" -> "05001")
    pub fn by_admin_code_suffix(&self, raw: &str) -> Vec<Arc<PostalZone>> {
        let digits = digits_of(raw);
        let digits = digits.trim_start_matches('0');
        if digits.len() < 2 || digits.len() > ADMIN_CODE_WIDTH {
            return Vec::new();
        }
        self.collect_codes(|code| code.ends_with(digits))
    }

    pub fn by_municipality(&self, name: &str) -> &[Arc<PostalZone>] {
        lookup_name(&self.by_name, name)
    }

    pub fn by_department(&self, name: &str) -> &[Arc<PostalZone>] {
        lookup_name(&self.by_department, name)
    }

    fn collect_codes(&self, matches: impl Fn(&str) -> bool) -> Vec<Arc<PostalZone>> {
        self.codes
            .iter()
            .filter(|code| matches(code))
            .filter_map(|code| self.by_code.get(code))
            .flat_map(|zones| zones.iter().cloned())
            .collect()
    }
}

fn digits_of(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

fn lookup_name<'a>(map: &'a ZoneMap, name: &str) -> &'a [Arc<PostalZone>] {
    let key = normalize_place_name(name);
    if key.is_empty() {
        return &[];
    }
    map.get(&key).map(Vec::as_slice).unwrap_or(&[])
}
