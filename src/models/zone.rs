//! Postal zone polygons and the point/box types they are built from.

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

use crate::pip::geometry;

/// Geographic point (lat/lon)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both components are finite and inside the WGS84 range
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Axis-aligned bounding box in lon/lat degrees.
///
/// A degenerate geometry produces the all-zero box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoBbox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GeoBbox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Inclusive containment test
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }
}

/// A polygonal area mapped to exactly one postal code.
#[derive(Debug, Clone)]
pub struct PostalZone {
    /// Stable identifier from the zone source
    pub id: String,

    pub postal_code: String,

    /// Municipality code as delivered by the source (normalized on indexing)
    pub admin_code: String,

    pub municipality: String,

    pub department: String,

    /// Neighbourhood / sector name inside the municipality
    pub sub_area: Option<String>,

    /// Outer rings are used for containment; holes are kept but never subtracted
    pub geometry: MultiPolygon<f64>,

    /// Precomputed envelope of every ring, used as containment prefilter
    pub bbox: GeoBbox,

    /// First-ring vertex average, see [`geometry::centroid`]
    pub centroid: GeoPoint,
}

impl PostalZone {
    /// Create a zone, precomputing its bbox and centroid
    pub fn new(
        id: impl Into<String>,
        postal_code: impl Into<String>,
        admin_code: impl Into<String>,
        municipality: impl Into<String>,
        department: impl Into<String>,
        sub_area: Option<String>,
        geometry: impl Into<MultiPolygon<f64>>,
    ) -> Self {
        let geometry = geometry.into();
        let bbox = geometry::bbox(&geometry);
        let centroid = geometry::centroid(&geometry);
        Self {
            id: id.into(),
            postal_code: postal_code.into(),
            admin_code: admin_code.into(),
            municipality: municipality.into(),
            department: department.into(),
            sub_area: sub_area.filter(|s| !s.trim().is_empty()),
            geometry,
            bbox,
            centroid,
        }
    }

    /// Point containment with bbox prefilter
    pub fn contains(&self, point: GeoPoint) -> bool {
        geometry::contains(self, point)
    }
}
