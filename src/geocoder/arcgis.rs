use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{endpoint, Candidate, GeocodeQuery, Geocoder, ProviderKind};
use crate::error::ProviderError;
use crate::models::GeoPoint;

/// Free, rate-limited secondary provider (World GeocodeServer REST API).
pub struct ArcGisGeocoder {
    http: reqwest::Client,
    base_url: String,
    country_code: String,
}

#[derive(Deserialize)]
struct FindResponse {
    #[serde(default)]
    candidates: Vec<FindCandidate>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct FindCandidate {
    location: XY,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Deserialize)]
struct XY {
    x: f64,
    y: f64,
}

#[derive(Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<ReverseAddress>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ReverseAddress {
    #[serde(default, rename = "Neighborhood")]
    neighborhood: Option<String>,
    #[serde(default, rename = "District")]
    district: Option<String>,
}

/// The REST API reports some failures with HTTP 200 and an error body
#[derive(Deserialize)]
struct ErrorBody {
    code: u16,
    #[serde(default)]
    message: String,
}

impl ErrorBody {
    fn into_error(self) -> ProviderError {
        match self.code {
            429 => ProviderError::RateLimited,
            // unable to geocode / no address at location
            400 if self.message.to_lowercase().contains("unable") => {
                ProviderError::Malformed(self.message)
            }
            code => ProviderError::Status(code),
        }
    }
}

impl ArcGisGeocoder {
    pub fn new(http: reqwest::Client, base_url: &str, country_code: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            country_code: country_code.to_string(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: url::Url) -> Result<T, ProviderError> {
        let response = self.http.get(url).send().await?;
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
            status if !status.is_success() => Err(ProviderError::Status(status.as_u16())),
            _ => response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string())),
        }
    }
}

#[async_trait]
impl Geocoder for ArcGisGeocoder {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ArcGis
    }

    async fn geocode(&self, query: &GeocodeQuery) -> Result<Option<Candidate>, ProviderError> {
        let mut url = endpoint(&self.base_url, "findAddressCandidates")?;
        url.query_pairs_mut()
            .append_pair("SingleLine", &query.text)
            .append_pair("f", "json")
            .append_pair("maxLocations", "1")
            .append_pair("outFields", "Score")
            .append_pair("countryCode", &self.country_code);

        let response: FindResponse = self.get_json(url).await?;
        if let Some(error) = response.error {
            return Err(error.into_error());
        }

        let Some(best) = response.candidates.into_iter().next() else {
            return Ok(None);
        };
        let point = GeoPoint::new(best.location.y, best.location.x);
        if !point.is_valid() {
            return Err(ProviderError::Malformed(format!("invalid location {:?}", point)));
        }
        Ok(Some(Candidate::new(point, best.score)))
    }

    async fn reverse_sub_area(&self, point: GeoPoint) -> Result<Option<String>, ProviderError> {
        let mut url = endpoint(&self.base_url, "reverseGeocode")?;
        url.query_pairs_mut()
            .append_pair("location", &format!("{},{}", point.lon, point.lat))
            .append_pair("f", "json")
            .append_pair("featureTypes", "");

        let response: ReverseResponse = self.get_json(url).await?;
        if let Some(error) = response.error {
            return match error.into_error() {
                // nothing at this location
                ProviderError::Malformed(_) => Ok(None),
                other => Err(other),
            };
        }

        Ok(response
            .address
            .and_then(|a| a.neighborhood.or(a.district))
            .filter(|name| !name.trim().is_empty()))
    }
}
