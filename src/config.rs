use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub resolver: ResolverConfig,
    pub batch: BatchConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub google: GoogleConfig,
    pub arcgis: ArcGisConfig,
    pub gemini: GeminiConfig,
}

/// Primary provider; disabled without an API key
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GoogleConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub region: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://maps.googleapis.com/maps/api/geocode".to_string(),
            region: "co".to_string(),
        }
    }
}

/// Secondary provider, keyless and rate limited
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ArcGisConfig {
    pub enabled: bool,
    pub base_url: String,
    pub country_code: String,
}

impl Default for ArcGisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url:
                "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer".to_string(),
            country_code: "COL".to_string(),
        }
    }
}

/// Tertiary search-grounded LLM provider; disabled without an API key
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ResolverConfig {
    pub provider_timeout_ms: u64,
    /// Minimum secondary-provider score at the full-address level
    pub strict_min_score: f64,
    /// Minimum secondary-provider score at the street and city levels
    pub relaxed_min_score: f64,
    pub backoff_base_ms: u64,
    pub max_rate_limit_attempts: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            provider_timeout_ms: 5_000,
            strict_min_score: 90.0,
            relaxed_min_score: 80.0,
            backoff_base_ms: 250,
            max_rate_limit_attempts: 5,
        }
    }
}

impl ResolverConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatchConfig {
    pub record_timeout_ms: u64,
    pub quota_pause_secs: u64,
    pub max_quota_pauses: u32,
    pub paid_concurrency: usize,
    pub paid_request_delay_ms: u64,
    pub free_concurrency: usize,
    pub free_request_delay_ms: u64,
    pub progress_interval_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            record_timeout_ms: 8_000,
            quota_pause_secs: 30,
            max_quota_pauses: 5,
            paid_concurrency: 5,
            paid_request_delay_ms: 200,
            free_concurrency: 1,
            free_request_delay_ms: 1_100,
            progress_interval_ms: 250,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Persistent store directory; in-memory only when unset
    pub path: Option<PathBuf>,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let providers = &self.providers;
        for (name, base_url) in [
            ("google", &providers.google.base_url),
            ("arcgis", &providers.arcgis.base_url),
            ("gemini", &providers.gemini.base_url),
        ] {
            Url::parse(base_url)
                .with_context(|| format!("Invalid {} base_url: {}", name, base_url))?;
        }

        if self.resolver.provider_timeout_ms == 0 {
            bail!("resolver.provider_timeout_ms must be positive");
        }
        if self.resolver.provider_timeout_ms >= self.batch.record_timeout_ms {
            bail!(
                "resolver.provider_timeout_ms ({}) must be shorter than batch.record_timeout_ms ({})",
                self.resolver.provider_timeout_ms,
                self.batch.record_timeout_ms
            );
        }
        if self.batch.paid_concurrency == 0 || self.batch.free_concurrency == 0 {
            bail!("batch concurrency must be at least 1");
        }
        Ok(())
    }
}

pub(crate) fn has_key(key: &Option<String>) -> bool {
    key.as_deref().is_some_and(|k| !k.trim().is_empty())
}
