//! The owned service object: zone index, municipal index, synonyms, cache and resolver.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use crate::cache::GeocodeCache;
use crate::config::Config;
use crate::error::{CacheError, ResolveResult};
use crate::geocoder::{GeocodingResolver, Providers, ResolverSettings};
use crate::models::{AddressRecord, MunicipalIndexEntry, PostalZone, ResolutionResult};
use crate::municipal::MunicipalIndex;
use crate::normalize::SynonymService;
use crate::pip::{ZoneIndex, ZoneSource};
use crate::triangulate::Triangulator;

/// Build-once, lookup-many state shared by every record of a batch.
///
/// Index snapshots are `Arc`s, so a zone reload never blocks records that are
/// already resolving.
pub struct Engine {
    zones: RwLock<Arc<ZoneIndex>>,
    municipal: RwLock<Arc<MunicipalIndex>>,
    resolver: GeocodingResolver,
}

impl Engine {
    pub fn new(providers: Providers, cache: Arc<GeocodeCache>, settings: ResolverSettings) -> Self {
        Self {
            zones: RwLock::new(Arc::new(ZoneIndex::default())),
            municipal: RwLock::new(Arc::new(MunicipalIndex::new())),
            resolver: GeocodingResolver::new(providers, cache, settings),
        }
    }

    /// Engine with the configured providers and cache, and empty indexes
    pub fn from_config(config: &Config) -> Result<Self> {
        let providers = Providers::from_config(config)?;
        let cache = GeocodeCache::open(config.cache.path.as_deref())
            .context("Failed to open geocode cache")?;
        Ok(Self::new(
            providers,
            Arc::new(cache),
            ResolverSettings::from(&config.resolver),
        ))
    }

    pub fn with_synonyms(mut self, synonyms: SynonymService) -> Self {
        self.resolver = self.resolver.with_synonyms(synonyms);
        self
    }

    /// Replace the whole zone set (clear-then-bulk-load)
    pub fn replace_zones(&self, zones: Vec<PostalZone>) -> usize {
        let index = Arc::new(ZoneIndex::build(zones));
        let count = index.len();
        *self.zones.write() = index;
        count
    }

    pub fn load_zones_from(&self, source: &dyn ZoneSource) -> Result<usize> {
        let zones = source.load_zones()?;
        Ok(self.replace_zones(zones))
    }

    /// Merge entries into the municipal index, keyed by admin code
    pub fn upsert_municipal(&self, entries: impl IntoIterator<Item = MunicipalIndexEntry>) -> usize {
        let mut guard = self.municipal.write();
        let count = Arc::make_mut(&mut guard).upsert_all(entries);
        info!(
            "Upserted {} municipal entries ({} municipalities indexed)",
            count,
            guard.len()
        );
        count
    }

    pub fn zones(&self) -> Arc<ZoneIndex> {
        Arc::clone(&self.zones.read())
    }

    pub fn municipal(&self) -> Arc<MunicipalIndex> {
        Arc::clone(&self.municipal.read())
    }

    pub fn synonyms(&self) -> &SynonymService {
        self.resolver.synonyms()
    }

    pub fn resolver(&self) -> &GeocodingResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &Arc<GeocodeCache> {
        self.resolver.cache()
    }

    /// Operator action: drop every cached geocode, positive and negative
    pub fn clear_cache(&self) -> Result<(), CacheError> {
        self.resolver.cache().clear()
    }

    /// Whether a quota-limited provider is configured (drives batch pacing)
    pub fn has_paid_provider(&self) -> bool {
        self.resolver.providers().has_paid()
    }

    /// Triangulate one record against the current index snapshots.
    pub async fn resolve(&self, record: &AddressRecord) -> ResolveResult<ResolutionResult> {
        let zones = self.zones();
        let municipal = self.municipal();
        Triangulator {
            zones: &zones,
            municipal: &municipal,
            synonyms: self.resolver.synonyms(),
            resolver: &self.resolver,
        }
        .resolve(record)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AreaType, PostalCodeEntry, ResolvedBy, Sentinel};
    use geo::polygon;

    fn engine() -> Engine {
        Engine::new(
            Providers::default(),
            Arc::new(GeocodeCache::in_memory()),
            ResolverSettings::default(),
        )
    }

    fn zone(postal_code: &str) -> PostalZone {
        let square = polygon![
            (x: -75.0, y: 6.0),
            (x: -74.0, y: 6.0),
            (x: -74.0, y: 7.0),
            (x: -75.0, y: 7.0),
        ];
        PostalZone::new(postal_code, postal_code, "5001", "Medellín", "Antioquia", None, square)
    }

    #[test]
    fn test_replace_zones_is_wholesale() {
        let engine = engine();
        assert_eq!(engine.replace_zones(vec![zone("050001"), zone("050002")]), 2);
        let before = engine.zones();
        assert_eq!(engine.replace_zones(vec![zone("050003")]), 1);
        assert_eq!(engine.zones().len(), 1);
        // earlier snapshots stay intact
        assert_eq!(before.len(), 2);
    }

    #[tokio::test]
    async fn test_direct_shortcut_for_single_code_municipality() {
        let engine = engine();
        engine.replace_zones(vec![zone("050001")]);
        engine.upsert_municipal([MunicipalIndexEntry {
            admin_code: "05001".into(),
            municipality: "Medellín".into(),
            department: "Antioquia".into(),
            postal_codes: vec![PostalCodeEntry {
                postal_code: "050001".into(),
                area_type: AreaType::Urban,
            }],
            preferred: "050001".into(),
        }]);

        let record = AddressRecord::new("Medellín", "Antioquia", "5001", "Calle 10 # 43-12");
        let result = engine.resolve(&record).await.unwrap();
        assert_eq!(result.code(), "050001");
        assert_eq!(result.resolved_by, ResolvedBy::DirectIndex);
        assert!(result.point.is_some());
        assert_eq!(engine.resolver().provider_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_providers_means_not_found() {
        let engine = engine();
        engine.replace_zones(vec![zone("050001")]);
        let record = AddressRecord::new("Medellín", "", "", "Calle 10 # 43-12");
        let result = engine.resolve(&record).await.unwrap();
        assert_eq!(result.sentinel_kind(), Some(Sentinel::AddressNotFound));
    }
}
