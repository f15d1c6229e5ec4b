//! Zone sources feeding [`ZoneIndex`](super::ZoneIndex) rebuilds.

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::PostalZone;

/// Bulk provider of postal zones.
///
/// Consumers replace their whole zone set with whatever this returns.
pub trait ZoneSource {
    fn load_zones(&self) -> Result<Vec<PostalZone>>;
}

/// In-memory zone list, mostly for tests and embedding
impl ZoneSource for Vec<PostalZone> {
    fn load_zones(&self) -> Result<Vec<PostalZone>> {
        Ok(self.clone())
    }
}

/// GeoJSON FeatureCollection of Polygon/MultiPolygon postal zones
pub struct GeoJsonZoneSource {
    path: PathBuf,
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Value>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum RawGeometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

const POSTAL_CODE_KEYS: &[&str] = &["postal_code", "codigo_postal", "cod_postal"];
const ADMIN_CODE_KEYS: &[&str] = &["admin_code", "divipola", "cod_mpio"];
const MUNICIPALITY_KEYS: &[&str] = &["municipality", "municipio", "mpio_cnmbr"];
const DEPARTMENT_KEYS: &[&str] = &["department", "departamento", "dpto_cnmbr"];
const SUB_AREA_KEYS: &[&str] = &["sub_area", "barrio", "sector"];

impl GeoJsonZoneSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Parse a FeatureCollection document. Features without a postal code or a
    /// usable polygon are skipped with a warning.
    pub fn parse(content: &str) -> Result<Vec<PostalZone>> {
        let collection: FeatureCollection =
            serde_json::from_str(content).context("Failed to parse zone GeoJSON")?;

        let total = collection.features.len();
        let mut zones = Vec::with_capacity(total);
        for (i, feature) in collection.features.into_iter().enumerate() {
            match feature_to_zone(i, feature) {
                Ok(zone) => zones.push(zone),
                Err(e) => warn!("Skipping zone feature {}: {:#}", i, e),
            }
        }

        if total > 0 && zones.is_empty() {
            bail!("None of the {} zone features could be read", total);
        }
        Ok(zones)
    }
}

impl ZoneSource for GeoJsonZoneSource {
    fn load_zones(&self) -> Result<Vec<PostalZone>> {
        info!("Loading postal zones from {}", self.path.display());
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read zone file: {}", self.path.display()))?;
        let zones = Self::parse(&content)?;
        info!("Loaded {} postal zones", zones.len());
        Ok(zones)
    }
}

fn feature_to_zone(position: usize, feature: Feature) -> Result<PostalZone> {
    let props = feature.properties.unwrap_or_default();

    let postal_code = property(&props, POSTAL_CODE_KEYS).context("missing postal code")?;
    let geometry = feature.geometry.context("missing geometry")?;
    let geometry: RawGeometry =
        serde_json::from_value(geometry).context("unsupported geometry")?;
    let geometry = to_multi_polygon(geometry);
    if geometry.0.is_empty() {
        bail!("empty geometry");
    }

    let id = feature
        .id
        .as_ref()
        .and_then(value_to_string)
        .unwrap_or_else(|| format!("{}-{}", postal_code, position));

    Ok(PostalZone::new(
        id,
        postal_code,
        property(&props, ADMIN_CODE_KEYS).unwrap_or_default(),
        property(&props, MUNICIPALITY_KEYS).unwrap_or_default(),
        property(&props, DEPARTMENT_KEYS).unwrap_or_default(),
        property(&props, SUB_AREA_KEYS),
        geometry,
    ))
}

fn property(props: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| props.get(*key))
        .find_map(value_to_string)
}

/// Strings and numbers (codes often arrive as numbers)
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn to_ring(coords: Vec<Vec<f64>>) -> LineString<f64> {
    coords
        .into_iter()
        .filter(|c| c.len() >= 2)
        .map(|c| Coord { x: c[0], y: c[1] })
        .collect()
}

fn to_polygon(rings: Vec<Vec<Vec<f64>>>) -> Option<Polygon<f64>> {
    let mut rings = rings.into_iter().map(to_ring);
    let exterior = rings.next()?;
    if exterior.0.len() < 3 {
        return None;
    }
    Some(Polygon::new(exterior, rings.collect()))
}

fn to_multi_polygon(geometry: RawGeometry) -> MultiPolygon<f64> {
    match geometry {
        RawGeometry::Polygon { coordinates } => {
            MultiPolygon::new(to_polygon(coordinates).into_iter().collect())
        }
        RawGeometry::MultiPolygon { coordinates } => {
            MultiPolygon::new(coordinates.into_iter().filter_map(to_polygon).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "cali-760212",
                "properties": {
                    "postal_code": "760212",
                    "admin_code": 76001,
                    "municipality": "Cali",
                    "department": "Valle del Cauca",
                    "barrio": "San Vicente"
                },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-76.53, 3.43], [-76.51, 3.43], [-76.51, 3.45], [-76.53, 3.45], [-76.53, 3.43]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "codigo_postal": "050001", "divipola": "05001" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[0, 0], [1, 0], [1, 1], [0, 0]]], [[[5, 5], [6, 5], [6, 6], [5, 5]]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "postal_code": "999999" },
                "geometry": { "type": "Point", "coordinates": [0, 0] }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn test_parse_feature_collection() {
        let zones = GeoJsonZoneSource::parse(COLLECTION).unwrap();
        assert_eq!(zones.len(), 2);

        let cali = &zones[0];
        assert_eq!(cali.id, "cali-760212");
        assert_eq!(cali.admin_code, "76001");
        assert_eq!(cali.sub_area.as_deref(), Some("San Vicente"));
        assert!(cali.contains(GeoPoint::new(3.4372, -76.5197)));

        let medellin = &zones[1];
        assert_eq!(medellin.id, "050001-1");
        assert_eq!(medellin.geometry.0.len(), 2);
        assert_eq!(medellin.municipality, "");
    }

    #[test]
    fn test_all_features_broken_is_an_error() {
        let doc = r#"{"type":"FeatureCollection","features":[{"properties":{}}]}"#;
        assert!(GeoJsonZoneSource::parse(doc).is_err());
        let empty = r#"{"type":"FeatureCollection","features":[]}"#;
        assert!(GeoJsonZoneSource::parse(empty).unwrap().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.geojson");
        std::fs::write(&path, COLLECTION).unwrap();
        let zones = GeoJsonZoneSource::new(&path).load_zones().unwrap();
        assert_eq!(zones.len(), 2);
    }
}
