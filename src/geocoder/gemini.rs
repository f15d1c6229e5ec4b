use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::sync::LazyLock;
use tracing::debug;

use super::{endpoint, Candidate, GeocodeQuery, Geocoder, ProviderKind};
use crate::error::ProviderError;
use crate::models::GeoPoint;

/// Score reported for an answer the model grounded with search results
const GROUNDED_SCORE: f64 = 75.0;

static COORDINATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""?lat"?\s*:\s*(-?\d+(?:\.\d+)?)\s*,\s*"?(?:lng|lon)"?\s*:\s*(-?\d+(?:\.\d+)?)"#)
        .unwrap()
});

/// Tertiary provider: an LLM asked to locate the address with search grounding.
pub struct GeminiGeocoder {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiGeocoder {
    pub fn new(http: reqwest::Client, base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn prompt(query: &GeocodeQuery) -> String {
        let mut prompt = format!(
            "Find the geographic coordinates of this Colombian address: \"{}\" (municipality: {}, department: {}).",
            query.text, query.city, query.department
        );
        if let Some(recipient) = &query.recipient {
            prompt.push_str(&format!(" The recipient or place is described as: \"{}\".", recipient));
        }
        prompt.push_str(
            " Reply only with JSON {\"lat\": <number>, \"lng\": <number>}, or {\"lat\": null, \"lng\": null} if the address cannot be located.",
        );
        prompt
    }
}

/// First `lat`/`lng` pair in the model's text
fn parse_coordinates(text: &str) -> Option<GeoPoint> {
    let caps = COORDINATES.captures(text)?;
    let lat = caps.get(1)?.as_str().parse().ok()?;
    let lon = caps.get(2)?.as_str().parse().ok()?;
    Some(GeoPoint::new(lat, lon)).filter(GeoPoint::is_valid)
}

#[async_trait]
impl Geocoder for GeminiGeocoder {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn geocode(&self, query: &GeocodeQuery) -> Result<Option<Candidate>, ProviderError> {
        let url = endpoint(&self.base_url, &format!("models/{}:generateContent", self.model))?;
        let body = json!({
            "contents": [{ "parts": [{ "text": Self::prompt(query) }] }],
            "tools": [{ "google_search": {} }],
        });

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(ProviderError::QuotaExhausted),
            status if !status.is_success() => return Err(ProviderError::Status(status.as_u16())),
            _ => {}
        }

        let parsed: Response = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n");

        let point = parse_coordinates(&text);
        if point.is_none() {
            debug!(query = %query.text, "gemini: no coordinates in answer");
        }
        Ok(point.map(|p| Candidate::new(p, Some(GROUNDED_SCORE))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoder::Level;
    use httptest::matchers::{all_of, contains, request};
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};

    fn geocoder(server: &Server) -> GeminiGeocoder {
        GeminiGeocoder::new(
            reqwest::Client::new(),
            &server.url("/v1beta").to_string(),
            "gemini-test",
            "secret",
        )
    }

    fn query() -> GeocodeQuery {
        GeocodeQuery {
            text: "Calle 59C 2C-76".to_string(),
            city: "Cali".to_string(),
            department: "Valle del Cauca".to_string(),
            recipient: Some("Panadería La Espiga".to_string()),
            level: Level::Full,
        }
    }

    #[test]
    fn test_parse_coordinates() {
        assert_eq!(
            parse_coordinates("```json\n{\"lat\": 3.4372, \"lng\": -76.5197}\n```"),
            Some(GeoPoint::new(3.4372, -76.5197))
        );
        assert_eq!(parse_coordinates("{\"lat\": null, \"lng\": null}"), None);
        assert_eq!(parse_coordinates("lat: 123.0, lon: 10"), None);
    }

    #[test]
    fn test_prompt_carries_recipient() {
        let prompt = GeminiGeocoder::prompt(&query());
        assert!(prompt.contains("Panadería La Espiga"));
        assert!(prompt.contains("Valle del Cauca"));
    }

    #[tokio::test]
    async fn test_generate_content() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method("POST"),
                request::path("/v1beta/models/gemini-test:generateContent"),
                request::headers(contains(("x-goog-api-key", "secret"))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "{\"lat\": 3.4372, \"lng\": -76.5197}" }] }
                }]
            }))),
        );

        let candidate = geocoder(&server).geocode(&query()).await.unwrap().unwrap();
        assert_eq!(candidate.point, GeoPoint::new(3.4372, -76.5197));
    }

    #[tokio::test]
    async fn test_429_is_quota() {
        let server = Server::run();
        server.expect(Expectation::matching(request::method("POST")).respond_with(status_code(429)));
        let err = geocoder(&server).geocode(&query()).await.unwrap_err();
        assert!(err.is_quota());
    }
}
