use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::{endpoint, Candidate, GeocodeQuery, Geocoder, ProviderKind};
use crate::error::ProviderError;
use crate::models::GeoPoint;

/// Precise, quota-limited primary provider (Geocoding API JSON).
pub struct GoogleGeocoder {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    region: String,
}

#[derive(Deserialize)]
struct Response {
    status: String,
    #[serde(default)]
    results: Vec<ResponseResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct ResponseResult {
    geometry: ResponseGeometry,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Deserialize)]
struct ResponseGeometry {
    location: Location,
    #[serde(default)]
    location_type: Option<String>,
}

#[derive(Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct AddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

const SUB_AREA_TYPES: &[&str] = &["neighborhood", "sublocality_level_1", "sublocality"];

impl GoogleGeocoder {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str, region: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            region: region.to_string(),
        }
    }

    async fn call(&self, params: &[(&str, &str)]) -> Result<Response, ProviderError> {
        let mut url = endpoint(&self.base_url, "json")?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("region", &self.region)
            .append_pair("key", &self.api_key);

        let response = self.http.get(url).send().await?;
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(ProviderError::RateLimited),
            status if !status.is_success() => return Err(ProviderError::Status(status.as_u16())),
            _ => {}
        }

        let parsed: Response = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        match parsed.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(parsed),
            "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Err(ProviderError::QuotaExhausted),
            other => Err(ProviderError::Malformed(format!(
                "status {}: {}",
                other,
                parsed.error_message.unwrap_or_default()
            ))),
        }
    }
}

/// Confidence derived from how the coordinate was obtained
fn location_score(location_type: Option<&str>) -> f64 {
    match location_type {
        Some("ROOFTOP") => 100.0,
        Some("RANGE_INTERPOLATED") => 90.0,
        Some("GEOMETRIC_CENTER") => 80.0,
        _ => 70.0,
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn geocode(&self, query: &GeocodeQuery) -> Result<Option<Candidate>, ProviderError> {
        let response = self.call(&[("address", query.text.as_str())]).await?;
        let Some(first) = response.results.into_iter().next() else {
            debug!(query = %query.text, "google: no results");
            return Ok(None);
        };

        let geometry = first.geometry;
        let point = GeoPoint::new(geometry.location.lat, geometry.location.lng);
        if !point.is_valid() {
            return Err(ProviderError::Malformed(format!("invalid location {:?}", point)));
        }
        Ok(Some(Candidate::new(
            point,
            Some(location_score(geometry.location_type.as_deref())),
        )))
    }

    async fn reverse_sub_area(&self, point: GeoPoint) -> Result<Option<String>, ProviderError> {
        let latlng = format!("{},{}", point.lat, point.lon);
        let response = self
            .call(&[
                ("latlng", latlng.as_str()),
                ("result_type", "neighborhood|sublocality"),
            ])
            .await?;

        Ok(response
            .results
            .into_iter()
            .flat_map(|r| r.address_components)
            .find(|c| c.types.iter().any(|t| SUB_AREA_TYPES.contains(&t.as_str())))
            .map(|c| c.long_name))
    }
}
