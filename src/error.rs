use thiserror::Error;

use crate::geocoder::ProviderKind;

/// Failure of a single provider call.
///
/// Everything except [`ProviderError::QuotaExhausted`] is a soft failure: the
/// resolver falls through to the next provider or level.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited (HTTP 429)")]
    RateLimited,
    #[error("request quota exhausted")]
    QuotaExhausted,
    #[error("provider call timed out")]
    Timeout,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn is_quota(&self) -> bool {
        matches!(self, ProviderError::QuotaExhausted)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] sled::Error),
    #[error(transparent)]
    Codec(#[from] serde_json::Error),
}

/// Failure resolving one record.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Must reach the batch processor, which pauses and retries the record
    #[error("{provider} quota exhausted")]
    QuotaExhausted { provider: ProviderKind },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ResolveError {
    pub fn is_quota(&self) -> bool {
        matches!(self, ResolveError::QuotaExhausted { .. })
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;
