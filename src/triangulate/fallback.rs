//! Fallback chain once a coordinate failed to land in a candidate zone.

use std::sync::Arc;

use crate::models::{
    AddressRecord, GeoPoint, MunicipalIndexEntry, PostalZone, ResolutionResult, ResolvedBy,
    Sentinel,
};
use crate::municipal::MunicipalIndex;
use crate::normalize::SynonymService;
use crate::pip::normalize_place_name;

pub struct FallbackContext<'a> {
    pub record: &'a AddressRecord,
    pub candidates: &'a [Arc<PostalZone>],
    pub municipal: &'a MunicipalIndex,
    pub synonyms: &'a SynonymService,
    /// Best coordinate found, if any
    pub point: Option<GeoPoint>,
    /// Sub-area name reverse geocoded at `point`
    pub sub_area: Option<&'a str>,
}

pub type FallbackStrategy = fn(&FallbackContext) -> Option<ResolutionResult>;

/// Strategies in evaluation order
pub const STRATEGIES: &[(&str, FallbackStrategy)] = &[
    ("sub_area", by_sub_area),
    ("index_by_code", by_index_code),
    ("index_by_name", by_index_name),
];

/// First strategy that produces a code, else the terminal sentinel
pub fn resolve(ctx: &FallbackContext) -> ResolutionResult {
    STRATEGIES
        .iter()
        .find_map(|(_, strategy)| strategy(ctx))
        .unwrap_or_else(|| terminal(ctx))
}

/// A coordinate without a match needs review; no coordinate at all is not found
fn terminal(ctx: &FallbackContext) -> ResolutionResult {
    match ctx.point {
        Some(point) => ResolutionResult::sentinel_at(Sentinel::ReviewAddress, Some(point)),
        None => ResolutionResult::sentinel(Sentinel::AddressNotFound),
    }
}

fn by_sub_area(ctx: &FallbackContext) -> Option<ResolutionResult> {
    let wanted = normalize_place_name(ctx.sub_area?);
    if wanted.is_empty() {
        return None;
    }
    let zone = ctx.candidates.iter().find(|zone| {
        zone.sub_area
            .as_deref()
            .is_some_and(|name| normalize_place_name(name) == wanted)
    })?;
    Some(ResolutionResult::postal_code(
        zone.postal_code.clone(),
        ctx.point,
        zone.sub_area.clone(),
        ResolvedBy::SubArea,
    ))
}

fn by_index_code(ctx: &FallbackContext) -> Option<ResolutionResult> {
    let entry = ctx.municipal.by_admin_code(&ctx.record.admin_code)?;
    from_entry(ctx, entry, ResolvedBy::IndexByCode)
}

fn by_index_name(ctx: &FallbackContext) -> Option<ResolutionResult> {
    let city = ctx.record.city.trim();
    if city.is_empty() {
        return None;
    }
    let department = &ctx.record.department;
    let entry = ctx.municipal.by_city(city, department).or_else(|| {
        ctx.synonyms
            .expand(city)
            .iter()
            .find_map(|name| ctx.municipal.by_city(name, department))
    })?;
    from_entry(ctx, entry, ResolvedBy::IndexByName)
}

fn from_entry(
    ctx: &FallbackContext,
    entry: &MunicipalIndexEntry,
    resolved_by: ResolvedBy,
) -> Option<ResolutionResult> {
    let code = entry.code_for_address(&ctx.record.address);
    if code.is_empty() {
        return None;
    }
    Some(ResolutionResult::postal_code(
        code,
        ctx.point,
        ctx.sub_area.map(str::to_string),
        resolved_by,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AreaType, PostalCodeEntry};
    use geo::polygon;

    fn zone(postal_code: &str, sub_area: &str) -> Arc<PostalZone> {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];
        Arc::new(PostalZone::new(
            postal_code,
            postal_code,
            "76001",
            "Cali",
            "Valle del Cauca",
            Some(sub_area.to_string()),
            square,
        ))
    }

    fn municipal() -> MunicipalIndex {
        let mut index = MunicipalIndex::new();
        index.upsert(MunicipalIndexEntry {
            admin_code: "76001".into(),
            municipality: "Santiago de Cali".into(),
            department: "Valle del Cauca".into(),
            postal_codes: vec![
                PostalCodeEntry {
                    postal_code: "760001".into(),
                    area_type: AreaType::Urban,
                },
                PostalCodeEntry {
                    postal_code: "764001".into(),
                    area_type: AreaType::Rural,
                },
            ],
            preferred: "760001".into(),
        });
        index
    }

    struct Fixture {
        record: AddressRecord,
        candidates: Vec<Arc<PostalZone>>,
        municipal: MunicipalIndex,
        synonyms: SynonymService,
    }

    impl Fixture {
        fn new(record: AddressRecord) -> Self {
            Self {
                record,
                candidates: vec![zone("760042", "San Fernando"), zone("760044", "El Peñón")],
                municipal: municipal(),
                synonyms: SynonymService::with_defaults(),
            }
        }

        fn resolve(&self, point: Option<GeoPoint>, sub_area: Option<&str>) -> ResolutionResult {
            resolve(&FallbackContext {
                record: &self.record,
                candidates: &self.candidates,
                municipal: &self.municipal,
                synonyms: &self.synonyms,
                point,
                sub_area,
            })
        }
    }

    #[test]
    fn test_sub_area_wins_first() {
        let f = Fixture::new(AddressRecord::new("Cali", "", "76001", "Calle 5 # 38-10"));
        let result = f.resolve(Some(GeoPoint::new(3.4, -76.5)), Some("el penon"));
        assert_eq!(result.code(), "760044");
        assert_eq!(result.resolved_by, ResolvedBy::SubArea);
    }

    #[test]
    fn test_index_by_code_then_by_name() {
        let f = Fixture::new(AddressRecord::new("Cali", "", "76001", "Vereda La Buitrera"));
        let result = f.resolve(None, Some("Unknown Barrio"));
        assert_eq!(result.code(), "764001");
        assert_eq!(result.resolved_by, ResolvedBy::IndexByCode);

        // name only reaches the entry through the synonym table
        let f = Fixture::new(AddressRecord::new("Cali", "", "", "Calle 5"));
        let result = f.resolve(None, None);
        assert_eq!(result.code(), "760001");
        assert_eq!(result.resolved_by, ResolvedBy::IndexByName);
    }

    #[test]
    fn test_terminal_sentinels() {
        let mut f = Fixture::new(AddressRecord::new("Atlantis", "", "", "Calle 1"));
        f.candidates.clear();
        let point = GeoPoint::new(3.0, -76.0);
        let review = f.resolve(Some(point), None);
        assert_eq!(review.sentinel_kind(), Some(Sentinel::ReviewAddress));
        assert_eq!(review.point, Some(point));

        let missing = f.resolve(None, None);
        assert_eq!(missing.sentinel_kind(), Some(Sentinel::AddressNotFound));
    }
}
