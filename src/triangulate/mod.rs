//! Per-record postal code triangulation.
//!
//! Candidate zones come from name/code matching, a coordinate from the
//! geocoding resolver, and the answer from point-in-polygon matching, with the
//! municipal index and sub-area names as fallbacks.

pub mod candidates;
pub mod fallback;

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ResolveResult;
use crate::geocoder::{GeocodingResolver, Level};
use crate::models::{
    AddressRecord, GeoPoint, MunicipalIndexEntry, PostalZone, ResolutionResult, ResolvedBy,
    Sentinel,
};
use crate::municipal::MunicipalIndex;
use crate::normalize::SynonymService;
use crate::pip::ZoneIndex;

use candidates::{CandidateContext, Candidates};
use fallback::FallbackContext;

pub struct Triangulator<'a> {
    pub zones: &'a ZoneIndex,
    pub municipal: &'a MunicipalIndex,
    pub synonyms: &'a SynonymService,
    pub resolver: &'a GeocodingResolver,
}

impl Triangulator<'_> {
    /// Resolve one record. Quota exhaustion is returned as an error; any other
    /// failure becomes `ERROR_GEOCODIFICACION`.
    pub async fn resolve(&self, record: &AddressRecord) -> ResolveResult<ResolutionResult> {
        match self.triangulate(record).await {
            Err(err) if !err.is_quota() => {
                warn!(?err, city = %record.city, "resolution failed");
                Ok(ResolutionResult::sentinel(Sentinel::GeocodingError))
            }
            other => other,
        }
    }

    async fn triangulate(&self, record: &AddressRecord) -> ResolveResult<ResolutionResult> {
        let city = record.city.trim();
        let address = record.address.trim();
        if city.is_empty() && address.is_empty() {
            return Ok(ResolutionResult::sentinel(Sentinel::IncompleteData));
        }

        let candidates = candidates::find(&CandidateContext {
            zones: self.zones,
            synonyms: self.synonyms,
            record,
        });
        let entry = self.municipal.by_admin_code(&record.admin_code);
        debug!(
            city,
            candidates = candidates.zones.len(),
            matched_by = ?candidates.matched_by,
            indexed = entry.is_some(),
            "candidate lookup"
        );

        if let Some(entry) = entry {
            // geocoding cannot improve on a single-code municipality, nor work without zones or an address
            if entry.is_unambiguous() || candidates.is_empty() || address.is_empty() {
                return Ok(direct(entry, &candidates, address));
            }
        }

        if candidates.is_empty() {
            return Ok(ResolutionResult::sentinel(Sentinel::MunicipalityWithoutZones));
        }
        if address.is_empty() {
            return Ok(ResolutionResult::sentinel(Sentinel::IncompleteData));
        }

        let mut geocoded = self.resolver.geocode(record, Level::Full).await?;
        if geocoded.is_none() {
            debug!(city, "geocoding exhausted every level, retrying once");
            geocoded = self.resolver.geocode(record, Level::Full).await?;
        }

        let point = match geocoded {
            Some(first) => {
                if let Some(zone) = containing(&candidates.zones, first.point) {
                    return Ok(contained(zone, first.point));
                }
                if first.level == Level::Full {
                    if let Some(street) = self.resolver.geocode(record, Level::Street).await? {
                        if let Some(zone) = containing(&candidates.zones, street.point) {
                            return Ok(contained(zone, street.point));
                        }
                    }
                }
                Some(first.point)
            }
            None => None,
        };

        let sub_area = match point {
            Some(point) => self.resolver.reverse_sub_area(point).await?,
            None => None,
        };

        let result = fallback::resolve(&FallbackContext {
            record,
            candidates: &candidates.zones,
            municipal: self.municipal,
            synonyms: self.synonyms,
            point,
            sub_area: sub_area.as_deref(),
        });
        debug!(city, code = result.code(), by = ?result.resolved_by, "fallback result");
        Ok(result)
    }
}

fn containing(zones: &[Arc<PostalZone>], point: GeoPoint) -> Option<&Arc<PostalZone>> {
    zones.iter().find(|zone| zone.contains(point))
}

fn contained(zone: &PostalZone, point: GeoPoint) -> ResolutionResult {
    ResolutionResult::postal_code(
        zone.postal_code.clone(),
        Some(point),
        zone.sub_area.clone(),
        ResolvedBy::Containment,
    )
}

/// Municipal index shortcut, located at the centroid of a zone with the chosen code
fn direct(entry: &MunicipalIndexEntry, candidates: &Candidates, address: &str) -> ResolutionResult {
    let code = entry.code_for_address(address);
    if code.is_empty() {
        return ResolutionResult::sentinel(Sentinel::MunicipalityWithoutZones);
    }
    let zone = candidates
        .zones
        .iter()
        .find(|zone| zone.postal_code == code)
        .or_else(|| candidates.zones.first());
    ResolutionResult::postal_code(
        code,
        zone.map(|z| z.centroid),
        None,
        ResolvedBy::DirectIndex,
    )
}
