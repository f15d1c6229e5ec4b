//! Two-tier geocode cache: an in-process map in front of a persistent store.
//!
//! Entries are written once per key and only removed by [`GeocodeCache::clear`].
//! A cached [`CachedGeocode::NotFound`] is distinct from a missing key.

pub mod store;

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::geocoder::{Level, ProviderKind};
use crate::models::GeoPoint;
use crate::normalize::collapse_whitespace;
pub use store::{CacheStore, MemoryStore, SledStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CachedGeocode {
    Found {
        point: GeoPoint,
        provider: ProviderKind,
        level: Level,
        cached_at: DateTime<Utc>,
    },
    NotFound {
        cached_at: DateTime<Utc>,
    },
}

impl CachedGeocode {
    pub fn found(point: GeoPoint, provider: ProviderKind, level: Level) -> Self {
        CachedGeocode::Found {
            point,
            provider,
            level,
            cached_at: Utc::now(),
        }
    }

    pub fn not_found() -> Self {
        CachedGeocode::NotFound {
            cached_at: Utc::now(),
        }
    }

    pub fn point(&self) -> Option<GeoPoint> {
        match self {
            CachedGeocode::Found { point, .. } => Some(*point),
            CachedGeocode::NotFound { .. } => None,
        }
    }
}

pub struct GeocodeCache {
    local: RwLock<HashMap<String, CachedGeocode>>,
    store: Arc<dyn CacheStore>,
}

impl GeocodeCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Both tiers in memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// sled-backed cache at `path`, or in memory when no path is configured
    pub fn open(path: Option<&Path>) -> Result<Self, CacheError> {
        match path {
            Some(path) => Ok(Self::new(Arc::new(SledStore::open(path)?))),
            None => {
                info!("No cache path configured, geocode cache is in-memory only");
                Ok(Self::in_memory())
            }
        }
    }

    /// Lower-cased, whitespace-collapsed query, with the recipient appended after `|`
    pub fn key(query: &str, recipient: Option<&str>) -> String {
        let mut key = collapse_whitespace(&query.to_lowercase());
        if let Some(recipient) = recipient {
            let recipient = collapse_whitespace(&recipient.to_lowercase());
            if !recipient.is_empty() {
                key.push('|');
                key.push_str(&recipient);
            }
        }
        key
    }

    /// In-process tier first, then the persistent tier (hydrating the in-process one).
    ///
    /// An entry that no longer decodes is dropped and reported as a miss, so the
    /// next successful lookup can take its place.
    pub fn get(&self, key: &str) -> Result<Option<CachedGeocode>, CacheError> {
        if let Some(hit) = self.local.read().get(key) {
            return Ok(Some(hit.clone()));
        }

        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };
        let value: CachedGeocode = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!(?err, key, "undecodable geocode cache entry, dropping it");
                if let Err(err) = self.store.remove(key) {
                    warn!(?err, key, "failed to drop geocode cache entry");
                }
                return Ok(None);
            }
        };
        debug!(key, "geocode cache hit in persistent tier");
        self.local
            .write()
            .entry(key.to_string())
            .or_insert_with(|| value.clone());
        Ok(Some(value))
    }

    /// Write-once in both tiers. A failing persistent write is logged, not returned.
    pub fn put(&self, key: &str, value: CachedGeocode) {
        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                if let Err(err) = self.store.put_if_absent(key, &bytes) {
                    warn!(?err, key, "failed to persist geocode cache entry");
                }
            }
            Err(err) => warn!(?err, key, "failed to encode geocode cache entry"),
        }
        self.local.write().entry(key.to_string()).or_insert(value);
    }

    /// Operator action: empty both tiers
    pub fn clear(&self) -> Result<(), CacheError> {
        self.local.write().clear();
        self.store.clear()?;
        info!("Geocode cache cleared");
        Ok(())
    }

    pub fn len_in_process(&self) -> usize {
        self.local.read().len()
    }

    pub fn len_persistent(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalization() {
        assert_eq!(
            GeocodeCache::key("  Calle 5  #  10-20, CALI ", None),
            "calle 5 # 10-20, cali"
        );
        assert_eq!(
            GeocodeCache::key("Calle 5", Some(" Tienda  La Esquina ")),
            "calle 5|tienda la esquina"
        );
        assert_eq!(GeocodeCache::key("Calle 5", Some("  ")), "calle 5");
    }

    #[test]
    fn test_negative_is_distinct_from_missing() {
        let cache = GeocodeCache::in_memory();
        assert_eq!(cache.get("nowhere").unwrap(), None);
        cache.put("nowhere", CachedGeocode::not_found());
        let hit = cache.get("nowhere").unwrap().unwrap();
        assert!(matches!(hit, CachedGeocode::NotFound { .. }));
        assert_eq!(hit.point(), None);
    }

    #[test]
    fn test_write_once() {
        let cache = GeocodeCache::in_memory();
        let first = CachedGeocode::found(GeoPoint::new(3.0, -76.0), ProviderKind::Google, Level::Full);
        cache.put("k", first.clone());
        cache.put("k", CachedGeocode::not_found());
        assert_eq!(cache.get("k").unwrap(), Some(first));
    }

    #[test]
    fn test_persistent_hit_hydrates_local() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let point = GeoPoint::new(4.6, -74.1);
        GeocodeCache::new(Arc::clone(&store)).put(
            "carrera 7 bogota",
            CachedGeocode::found(point, ProviderKind::ArcGis, Level::Street),
        );

        let cache = GeocodeCache::new(store);
        assert_eq!(cache.len_in_process(), 0);
        let hit = cache.get("carrera 7 bogota").unwrap().unwrap();
        assert_eq!(hit.point(), Some(point));
        assert_eq!(cache.len_in_process(), 1);
    }

    #[test]
    fn test_undecodable_entry_is_replaced() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        store
            .put_if_absent("calle 5 cali", br#"{"status":"found","legacy":1}"#)
            .unwrap();

        let cache = GeocodeCache::new(Arc::clone(&store));
        assert_eq!(cache.get("calle 5 cali").unwrap(), None);
        assert!(store.is_empty());

        let fresh = CachedGeocode::found(GeoPoint::new(3.4, -76.5), ProviderKind::Google, Level::Full);
        cache.put("calle 5 cali", fresh.clone());
        assert_eq!(GeocodeCache::new(store).get("calle 5 cali").unwrap(), Some(fresh));
    }

    #[test]
    fn test_clear_empties_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GeocodeCache::open(Some(dir.path())).unwrap();
        cache.put("a", CachedGeocode::not_found());
        assert_eq!(cache.len_persistent(), 1);
        cache.clear().unwrap();
        assert_eq!(cache.len_in_process(), 0);
        assert_eq!(cache.len_persistent(), 0);
        assert_eq!(cache.get("a").unwrap(), None);
    }
}
