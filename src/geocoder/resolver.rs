//! Multi-provider, multi-level coordinate lookup.
//!
//! Each level is resolved as cache -> primary -> secondary -> tertiary. The
//! levels are walked by an explicit loop from the requested starting level
//! down to the city-only query.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::{Candidate, GeocodeQuery, Geocoder, Level, ProviderKind, Providers};
use crate::cache::{CachedGeocode, GeocodeCache};
use crate::config::ResolverConfig;
use crate::error::{ProviderError, ResolveError, ResolveResult};
use crate::models::{AddressRecord, GeoPoint};
use crate::normalize::{clean_for_query, extract_street, normalize_address, SynonymService};

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub provider_timeout: Duration,
    pub strict_min_score: f64,
    pub relaxed_min_score: f64,
    pub backoff_base: Duration,
    pub max_rate_limit_attempts: u32,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from(&ResolverConfig::default())
    }
}

impl From<&ResolverConfig> for ResolverSettings {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            provider_timeout: config.provider_timeout(),
            strict_min_score: config.strict_min_score,
            relaxed_min_score: config.relaxed_min_score,
            backoff_base: config.backoff_base(),
            max_rate_limit_attempts: config.max_rate_limit_attempts.max(1),
        }
    }
}

impl ResolverSettings {
    fn min_score(&self, level: Level) -> f64 {
        match level {
            Level::Full => self.strict_min_score,
            Level::Street | Level::City => self.relaxed_min_score,
        }
    }

    /// Delay before retry `attempt` (1-based): base, 2*base, 4*base, ...
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(6);
        self.backoff_base * (1u32 << exponent)
    }
}

/// A resolved coordinate and where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geocoded {
    pub point: GeoPoint,
    pub level: Level,
    pub provider: ProviderKind,
    pub from_cache: bool,
}

enum LevelOutcome {
    Found(Candidate, ProviderKind),
    /// Every provider answered: nothing usable at this level
    Definitive,
    /// At least one provider failed softly; the answer may differ next time
    Transient,
}

pub struct GeocodingResolver {
    providers: Providers,
    cache: Arc<GeocodeCache>,
    settings: ResolverSettings,
    synonyms: SynonymService,
    provider_calls: AtomicU64,
}

impl GeocodingResolver {
    pub fn new(providers: Providers, cache: Arc<GeocodeCache>, settings: ResolverSettings) -> Self {
        Self {
            providers,
            cache,
            settings,
            synonyms: SynonymService::with_defaults(),
            provider_calls: AtomicU64::new(0),
        }
    }

    /// Synonyms used to recognise the record's own city inside the address
    pub fn with_synonyms(mut self, synonyms: SynonymService) -> Self {
        self.synonyms = synonyms;
        self
    }

    pub fn synonyms(&self) -> &SynonymService {
        &self.synonyms
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    pub fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }

    /// Outbound provider requests made so far, retries included
    pub fn provider_calls(&self) -> u64 {
        self.provider_calls.load(Ordering::Relaxed)
    }

    /// Query for one simplification level, or `None` when the record lacks the parts for it
    pub fn build_query(&self, record: &AddressRecord, level: Level) -> Option<GeocodeQuery> {
        let city = record.city.trim();
        let department = record.department.trim();
        let address = normalize_address(&clean_for_query(&record.address, city, &self.synonyms));

        let head = match level {
            Level::Full => Some(address).filter(|a| !a.is_empty()),
            Level::Street => extract_street(&address),
            Level::City => None,
        };
        if level != Level::City && head.is_none() {
            return None;
        }
        if level == Level::City && city.is_empty() {
            return None;
        }

        let text = [head.as_deref().unwrap_or_default(), city, department]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        Some(GeocodeQuery {
            text,
            city: city.to_string(),
            department: department.to_string(),
            recipient: match level {
                Level::Full => record.recipient_text().map(str::to_string),
                _ => None,
            },
            level,
        })
    }

    /// Walk the levels from `start` down to the city query and return the first coordinate.
    ///
    /// `Ok(None)` means every level came back empty. Quota exhaustion is returned as
    /// [`ResolveError::QuotaExhausted`]; every other provider failure is absorbed.
    pub async fn geocode(
        &self,
        record: &AddressRecord,
        start: Level,
    ) -> ResolveResult<Option<Geocoded>> {
        for level in start.from_here() {
            let Some(query) = self.build_query(record, level) else {
                continue;
            };
            let key = GeocodeCache::key(&query.text, query.recipient.as_deref());

            match self.cache.get(&key)? {
                Some(CachedGeocode::Found {
                    point, provider, ..
                }) => {
                    debug!(%key, "geocode cache hit");
                    return Ok(Some(Geocoded {
                        point,
                        level,
                        provider,
                        from_cache: true,
                    }));
                }
                Some(CachedGeocode::NotFound { .. }) => {
                    debug!(%key, "cached negative, escalating level");
                    continue;
                }
                None => {}
            }

            match self.resolve_level(&query).await? {
                LevelOutcome::Found(candidate, provider) => {
                    self.cache
                        .put(&key, CachedGeocode::found(candidate.point, provider, level));
                    return Ok(Some(Geocoded {
                        point: candidate.point,
                        level,
                        provider,
                        from_cache: false,
                    }));
                }
                LevelOutcome::Definitive => {
                    self.cache.put(&key, CachedGeocode::not_found());
                }
                LevelOutcome::Transient => {
                    debug!(%key, ?level, "level failed transiently, not caching");
                }
            }
        }
        Ok(None)
    }

    async fn resolve_level(&self, query: &GeocodeQuery) -> ResolveResult<LevelOutcome> {
        let mut transient = false;

        if let Some(primary) = &self.providers.primary {
            match self.call(primary.as_ref(), query).await {
                Ok(Some(candidate)) => return Ok(LevelOutcome::Found(candidate, primary.kind())),
                Ok(None) => {}
                Err(err) => transient |= self.absorb(primary.kind(), err)?,
            }
        }

        if let Some(secondary) = &self.providers.secondary {
            match self.call_with_backoff(secondary.as_ref(), query).await {
                Ok(Some(candidate)) => {
                    let min_score = self.settings.min_score(query.level);
                    match candidate.score {
                        Some(score) if score < min_score => {
                            debug!(score, min_score, level = ?query.level, "low-confidence match, escalating");
                            return Ok(if transient {
                                LevelOutcome::Transient
                            } else {
                                LevelOutcome::Definitive
                            });
                        }
                        _ => return Ok(LevelOutcome::Found(candidate, secondary.kind())),
                    }
                }
                Ok(None) => {}
                Err(err) => transient |= self.absorb(secondary.kind(), err)?,
            }
        }

        if let Some(tertiary) = &self.providers.tertiary {
            match self.call(tertiary.as_ref(), query).await {
                Ok(Some(candidate)) => return Ok(LevelOutcome::Found(candidate, tertiary.kind())),
                Ok(None) => {}
                Err(err) => transient |= self.absorb(tertiary.kind(), err)?,
            }
        }

        Ok(if transient {
            LevelOutcome::Transient
        } else {
            LevelOutcome::Definitive
        })
    }

    /// Quota errors become [`ResolveError::QuotaExhausted`]; anything else is logged
    /// and reported as a transient failure (`Ok(true)`).
    fn absorb(&self, provider: ProviderKind, err: ProviderError) -> ResolveResult<bool> {
        if err.is_quota() {
            warn!(%provider, "provider quota exhausted");
            return Err(ResolveError::QuotaExhausted { provider });
        }
        warn!(%provider, ?err, "provider call failed, falling through");
        Ok(true)
    }

    async fn call(
        &self,
        provider: &dyn Geocoder,
        query: &GeocodeQuery,
    ) -> Result<Option<Candidate>, ProviderError> {
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
        match timeout(self.settings.provider_timeout, provider.geocode(query)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        }
    }

    /// Retry HTTP 429 with doubling delays, up to the configured attempt count
    async fn call_with_backoff(
        &self,
        provider: &dyn Geocoder,
        query: &GeocodeQuery,
    ) -> Result<Option<Candidate>, ProviderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.call(provider, query).await {
                Err(ProviderError::RateLimited)
                    if attempt < self.settings.max_rate_limit_attempts =>
                {
                    let delay = self.settings.backoff_delay(attempt);
                    warn!(
                        provider = %provider.kind(),
                        attempt, "rate limited; retrying after {:?}", delay
                    );
                    sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    /// Sub-area name at `point` from the first provider that knows one
    pub async fn reverse_sub_area(&self, point: GeoPoint) -> ResolveResult<Option<String>> {
        for provider in [&self.providers.primary, &self.providers.secondary]
            .into_iter()
            .flatten()
        {
            self.provider_calls.fetch_add(1, Ordering::Relaxed);
            let result = match timeout(self.settings.provider_timeout, provider.reverse_sub_area(point)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout),
            };
            match result {
                Ok(Some(name)) => return Ok(Some(name)),
                Ok(None) => {}
                Err(err) => {
                    self.absorb(provider.kind(), err)?;
                }
            }
        }
        Ok(None)
    }
}
