#![allow(dead_code)]

use async_trait::async_trait;
use geo::polygon;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cartero::cache::{CacheStore, GeocodeCache, MemoryStore};
use cartero::geocoder::{
    Candidate, GeocodeQuery, Geocoder, ProviderKind, Providers, ResolverSettings,
};
use cartero::models::{
    AreaType, GeoPoint, MunicipalIndexEntry, PostalCodeEntry, PostalZone,
};
use cartero::{Engine, ProviderError};

type Answer = dyn Fn(&GeocodeQuery, usize) -> Result<Option<Candidate>, ProviderError> + Send + Sync;

/// Geocoder answering from a closure of (query, call number)
pub struct ScriptedGeocoder {
    kind: ProviderKind,
    answer: Box<Answer>,
    delay: Option<Duration>,
    sub_area: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedGeocoder {
    pub fn new<F>(kind: ProviderKind, answer: F) -> Arc<Self>
    where
        F: Fn(&GeocodeQuery, usize) -> Result<Option<Candidate>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self::build(kind, Box::new(answer)))
    }

    fn build(kind: ProviderKind, answer: Box<Answer>) -> Self {
        Self {
            kind,
            answer,
            delay: None,
            sub_area: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn answering(point: GeoPoint) -> Self {
        Self::build(
            ProviderKind::Google,
            Box::new(move |_: &GeocodeQuery, _: usize| Ok(Some(Candidate::new(point, None)))),
        )
    }

    /// Answers with `point` after sleeping `delay`
    pub fn slow(point: GeoPoint, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::answering(point)
        })
    }

    /// Answers with `point` and reverse geocodes every point to `sub_area`
    pub fn with_sub_area(point: GeoPoint, sub_area: &str) -> Arc<Self> {
        Arc::new(Self {
            sub_area: Some(sub_area.to_string()),
            ..Self::answering(point)
        })
    }

    /// Always answers with `point`
    pub fn fixed(point: GeoPoint) -> Arc<Self> {
        Arc::new(Self::answering(point))
    }

    /// Never finds anything
    pub fn empty() -> Arc<Self> {
        Self::new(ProviderKind::Google, |_, _| Ok(None))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for ScriptedGeocoder {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn geocode(&self, query: &GeocodeQuery) -> Result<Option<Candidate>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.answer)(query, call)
    }

    async fn reverse_sub_area(&self, _point: GeoPoint) -> Result<Option<String>, ProviderError> {
        Ok(self.sub_area.clone())
    }
}

pub fn engine_with(primary: Arc<ScriptedGeocoder>) -> Engine {
    engine_with_store(primary, Arc::new(MemoryStore::new()))
}

/// Engine whose persistent cache tier is `store`
pub fn engine_with_store(primary: Arc<ScriptedGeocoder>, store: Arc<dyn CacheStore>) -> Engine {
    let providers = Providers {
        primary: Some(primary),
        ..Providers::default()
    };
    let engine = Engine::new(
        providers,
        Arc::new(GeocodeCache::new(store)),
        ResolverSettings::default(),
    );
    engine.replace_zones(cali_zones());
    engine
}

/// Two adjacent urban zones in Cali; 760212 covers lat 3.4372, lon -76.5197
pub fn cali_zones() -> Vec<PostalZone> {
    let north = polygon![
        (x: -76.53, y: 3.43),
        (x: -76.51, y: 3.43),
        (x: -76.51, y: 3.445),
        (x: -76.53, y: 3.445),
    ];
    let south = polygon![
        (x: -76.53, y: 3.415),
        (x: -76.51, y: 3.415),
        (x: -76.51, y: 3.43),
        (x: -76.53, y: 3.43),
    ];
    vec![
        PostalZone::new(
            "760212-0",
            "760212",
            "76001",
            "Cali",
            "Valle del Cauca",
            Some("Chapinero".into()),
            north,
        ),
        PostalZone::new(
            "760001-0",
            "760001",
            "76001",
            "Cali",
            "Valle del Cauca",
            Some("San Fernando".into()),
            south,
        ),
    ]
}

/// Cali with two urban codes, 760001 preferred
pub fn cali_entry() -> MunicipalIndexEntry {
    MunicipalIndexEntry {
        admin_code: "76001".into(),
        municipality: "Cali".into(),
        department: "Valle del Cauca".into(),
        postal_codes: vec![
            PostalCodeEntry {
                postal_code: "760001".into(),
                area_type: AreaType::Urban,
            },
            PostalCodeEntry {
                postal_code: "760212".into(),
                area_type: AreaType::Urban,
            },
        ],
        preferred: "760001".into(),
    }
}

pub const INSIDE_760212: GeoPoint = GeoPoint {
    lat: 3.4372,
    lon: -76.5197,
};
