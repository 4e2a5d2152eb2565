//! GeoJSON coordinate codec.
//!
//! The map works in `[lat, lng]` order; the remote store keeps a GeoJSON
//! geometry string in `[lng, lat]` order. Encoding also normalizes the ring so
//! the server never receives noise, repeated vertices or an open ring.

use foundation::math::{is_collinear, round_coord};
use foundation::{LatLng, Ring};
use geojson::{GeoJson, Geometry, Value};

/// Minimum distinct vertices of a persistable ring.
pub const MIN_RING_VERTICES: usize = 3;

/// A cleaned single-ring polygon in GeoJSON storage order.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageGeometry {
    ring: Vec<[f64; 2]>,
}

impl StorageGeometry {
    /// Closed ring of `[lng, lat]` pairs.
    pub fn ring(&self) -> &[[f64; 2]] {
        &self.ring
    }

    pub fn to_geometry(&self) -> Geometry {
        let ring = self.ring.iter().map(|p| p.to_vec()).collect();
        Geometry::new(Value::Polygon(vec![ring]))
    }

    /// `{"type":"Polygon","coordinates":[[...]]}`, the string sent as `geoJson`.
    pub fn to_json_string(&self) -> String {
        GeoJson::Geometry(self.to_geometry()).to_string()
    }
}

/// Normalize a map ring: round, drop repeated and collinear vertices, close it.
///
/// Returns `None` when fewer than three usable vertices remain.
pub fn clean_ring(ring: &[LatLng]) -> Option<Ring> {
    if ring.iter().any(|p| !p.is_finite()) {
        return None;
    }

    let mut pts: Vec<LatLng> = ring.iter().copied().map(round_coord).collect();
    loop {
        pts.dedup();
        while pts.len() > 1 && pts.first() == pts.last() {
            pts.pop();
        }
        if pts.len() < MIN_RING_VERTICES {
            return None;
        }
        if !remove_one_collinear(&mut pts) {
            break;
        }
    }

    let first = pts[0];
    pts.push(first);
    Some(pts)
}

// Removing a vertex can expose another collinear triple or a repeated point,
// so callers loop until nothing changes.
fn remove_one_collinear(pts: &mut Vec<LatLng>) -> bool {
    let n = pts.len();
    for i in 0..n {
        let prev = pts[(i + n - 1) % n];
        let next = pts[(i + 1) % n];
        if is_collinear(prev, pts[i], next) {
            pts.remove(i);
            return true;
        }
    }
    false
}

/// Encode a map ring for storage; `None` means the polygon is degenerate and
/// must not be persisted.
pub fn to_storage_geometry(ring: &[LatLng]) -> Option<StorageGeometry> {
    let cleaned = clean_ring(ring)?;
    if cleaned.len() < MIN_RING_VERTICES + 1 {
        return None;
    }
    Some(StorageGeometry {
        ring: cleaned.into_iter().map(LatLng::to_lng_lat).collect(),
    })
}

/// Decode a stored geometry string into a map ring.
///
/// Accepts a bare geometry, a Feature, or a FeatureCollection (first feature).
/// Only `Polygon` (first ring) and `MultiPolygon` (first polygon, first ring)
/// are supported.
pub fn from_storage_geometry(raw: &str) -> Option<Ring> {
    let parsed: GeoJson = match raw.parse() {
        Ok(g) => g,
        Err(e) => {
            tracing::debug!("unparseable geometry: {e}");
            return None;
        }
    };

    let geometry = match parsed {
        GeoJson::Geometry(g) => g,
        GeoJson::Feature(f) => f.geometry?,
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().next()?.geometry?,
    };

    let ring = match geometry.value {
        Value::Polygon(rings) => rings.into_iter().next()?,
        Value::MultiPolygon(polys) => polys.into_iter().next()?.into_iter().next()?,
        _ => {
            tracing::debug!("unsupported geometry type, expected Polygon or MultiPolygon");
            return None;
        }
    };

    let points = ring
        .iter()
        .map(|pos| match pos.as_slice() {
            [lng, lat, ..] => Some(LatLng::from_lng_lat([*lng, *lat])),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    if points.len() < MIN_RING_VERTICES {
        return None;
    }
    Some(points)
}
