//! Geocoding providers and the multi-level resolver built on them.

mod arcgis;
mod gemini;
mod google;
mod resolver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{has_key, Config};
use crate::error::ProviderError;
use crate::models::GeoPoint;

pub use arcgis::ArcGisGeocoder;
pub use gemini::GeminiGeocoder;
pub use google::GoogleGeocoder;
pub use resolver::{Geocoded, GeocodingResolver, ResolverSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    ArcGis,
    Gemini,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::Google => "google",
            ProviderKind::ArcGis => "arcgis",
            ProviderKind::Gemini => "gemini",
        })
    }
}

/// Query simplification level, from most to least precise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Full normalized address + city + department
    Full = 0,
    /// Extracted street + city + department
    Street = 1,
    /// City + department
    City = 2,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Full, Level::Street, Level::City];

    /// Levels from `self` down to the coarsest
    pub fn from_here(self) -> impl Iterator<Item = Level> {
        Self::ALL.into_iter().filter(move |l| *l >= self)
    }
}

/// Single best coordinate returned by a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub point: GeoPoint,
    /// Provider confidence on a 0..=100 scale when the provider reports one
    pub score: Option<f64>,
}

impl Candidate {
    pub fn new(point: GeoPoint, score: Option<f64>) -> Self {
        Self { point, score }
    }
}

/// One provider request: the free-text query plus the context some providers use.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeQuery {
    pub text: String,
    pub city: String,
    pub department: String,
    pub recipient: Option<String>,
    pub level: Level,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Zero or one candidate for the query
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Option<Candidate>, ProviderError>;

    /// Neighbourhood / sub-area name at a point. Unsupported by default.
    async fn reverse_sub_area(&self, _point: GeoPoint) -> Result<Option<String>, ProviderError> {
        Ok(None)
    }
}

/// Provider chain in resolution order.
#[derive(Clone, Default)]
pub struct Providers {
    pub primary: Option<Arc<dyn Geocoder>>,
    pub secondary: Option<Arc<dyn Geocoder>>,
    pub tertiary: Option<Arc<dyn Geocoder>>,
}

impl Providers {
    /// Providers enabled by the configuration: Google and Gemini need an API key.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let timeout = config.resolver.provider_timeout();
        let http = http_client(timeout)?;
        let providers = &config.providers;

        let primary = match providers.google.api_key.as_deref() {
            Some(key) if has_key(&providers.google.api_key) => Some(Arc::new(GoogleGeocoder::new(
                http.clone(),
                &providers.google.base_url,
                key,
                &providers.google.region,
            )) as Arc<dyn Geocoder>),
            _ => None,
        };

        let secondary = providers.arcgis.enabled.then(|| {
            Arc::new(ArcGisGeocoder::new(
                http.clone(),
                &providers.arcgis.base_url,
                &providers.arcgis.country_code,
            )) as Arc<dyn Geocoder>
        });

        let tertiary = match providers.gemini.api_key.as_deref() {
            Some(key) if has_key(&providers.gemini.api_key) => Some(Arc::new(GeminiGeocoder::new(
                http,
                &providers.gemini.base_url,
                &providers.gemini.model,
                key,
            )) as Arc<dyn Geocoder>),
            _ => None,
        };

        let chain = Self {
            primary,
            secondary,
            tertiary,
        };
        info!(
            "Geocoding providers: {}",
            chain
                .iter()
                .map(|p| p.kind().to_string())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        Ok(chain)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Geocoder>> {
        [&self.primary, &self.secondary, &self.tertiary]
            .into_iter()
            .flatten()
    }

    /// A quota-limited provider is part of the chain
    pub fn has_paid(&self) -> bool {
        self.primary.is_some() || self.tertiary.is_some()
    }
}

fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("cartero/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// `{base}/{path}` without doubled slashes
pub(crate) fn endpoint(base: &str, path: &str) -> Result<url::Url, ProviderError> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    url::Url::parse(&raw).map_err(|e| ProviderError::Malformed(format!("bad endpoint {}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_from_here() {
        let levels: Vec<Level> = Level::Street.from_here().collect();
        assert_eq!(levels, vec![Level::Street, Level::City]);
        assert_eq!(Level::Full.from_here().count(), 3);
    }

    #[test]
    fn test_from_config_without_keys() {
        let config = Config::default();
        let providers = Providers::from_config(&config).unwrap();
        assert!(providers.primary.is_none());
        assert!(providers.secondary.is_some());
        assert!(providers.tertiary.is_none());
        assert!(!providers.has_paid());
    }

    #[test]
    fn test_endpoint_join() {
        let url = endpoint("http://localhost:1234/base/", "/json").unwrap();
        assert_eq!(url.as_str(), "http://localhost:1234/base/json");
    }
}
