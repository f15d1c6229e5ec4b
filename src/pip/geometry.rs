//! Bounding boxes, ray casting and the coarse zone centroid.
//!
//! Containment deliberately looks only at outer rings: a point inside a hole
//! of a donut-shaped zone still counts as contained. Zone data has not been
//! audited for holes, so this is kept as-is rather than silently "fixed".

use geo::{CoordsIter, LineString, MultiPolygon};

use crate::models::{GeoBbox, GeoPoint, PostalZone};

/// Min/max over every ring of every polygon part; all-zero for empty geometry
pub fn bbox(geometry: &MultiPolygon<f64>) -> GeoBbox {
    let mut coords = geometry.coords_iter();
    let Some(first) = coords.next() else {
        return GeoBbox::default();
    };

    let mut bbox = GeoBbox::new(first.x, first.y, first.x, first.y);
    for c in coords {
        bbox.min_lon = bbox.min_lon.min(c.x);
        bbox.min_lat = bbox.min_lat.min(c.y);
        bbox.max_lon = bbox.max_lon.max(c.x);
        bbox.max_lat = bbox.max_lat.max(c.y);
    }
    bbox
}

/// Even-odd ray casting against a single ring (closed or not).
pub fn point_in_ring(point: GeoPoint, ring: &LineString<f64>) -> bool {
    let coords = &ring.0;
    if coords.len() < 3 {
        return false;
    }

    let (x, y) = (point.lon, point.lat);
    let mut inside = false;
    let mut j = coords.len() - 1;
    for i in 0..coords.len() {
        let (xi, yi) = (coords[i].x, coords[i].y);
        let (xj, yj) = (coords[j].x, coords[j].y);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Zone containment: bbox prefilter, then any member polygon's outer ring.
pub fn contains(zone: &PostalZone, point: GeoPoint) -> bool {
    if !zone.bbox.contains(point) {
        return false;
    }
    zone.geometry
        .0
        .iter()
        .any(|polygon| point_in_ring(point, polygon.exterior()))
}

/// Arithmetic mean of the first polygon's outer ring vertices.
///
/// A representative point for map centering only; it can fall outside
/// concave polygons and must not be used for containment.
pub fn centroid(geometry: &MultiPolygon<f64>) -> GeoPoint {
    let Some(polygon) = geometry.0.first() else {
        return GeoPoint::default();
    };

    let mut ring: &[geo::Coord<f64>] = &polygon.exterior().0;
    if ring.len() > 1 && ring.first() == ring.last() {
        ring = &ring[..ring.len() - 1];
    }
    if ring.is_empty() {
        return GeoPoint::default();
    }

    let n = ring.len() as f64;
    let (sum_x, sum_y) = ring
        .iter()
        .fold((0.0, 0.0), |(sx, sy), c| (sx + c.x, sy + c.y));
    GeoPoint::new(sum_y / n, sum_x / n)
}
