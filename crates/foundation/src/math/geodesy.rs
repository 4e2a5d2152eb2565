use geo::{Contains, Coord, GeodesicArea, LineString, Point, Polygon};

use crate::latlng::{LatLng, open_vertices};

const SQ_M_PER_HECTARE: f64 = 10_000.0;
const SQ_M_PER_SQ_KM: f64 = 1_000_000.0;

fn to_geo_polygon(ring: &[LatLng]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = ring
        .iter()
        .map(|p| Coord { x: p.lng, y: p.lat })
        .collect();
    // `Polygon::new` closes the exterior ring itself.
    Polygon::new(LineString::from(coords), vec![])
}

/// Geodesic area of a field ring on the WGS84 ellipsoid, in square meters.
pub fn ring_area_m2(ring: &[LatLng]) -> f64 {
    if open_vertices(ring).len() < 3 {
        return 0.0;
    }
    to_geo_polygon(ring).geodesic_area_unsigned()
}

/// Human-readable area: square meters below one hectare, hectares below one
/// square kilometer, square kilometers above.
pub fn format_area(area_m2: f64) -> String {
    if area_m2 < SQ_M_PER_HECTARE {
        format!("{area_m2:.1} m²")
    } else if area_m2 < SQ_M_PER_SQ_KM {
        format!("{:.1} ha", area_m2 / SQ_M_PER_HECTARE)
    } else {
        format!("{:.1} km²", area_m2 / SQ_M_PER_SQ_KM)
    }
}

/// Point-in-polygon test in degree space. Boundary points are outside.
pub fn ring_contains(ring: &[LatLng], p: LatLng) -> bool {
    if open_vertices(ring).len() < 3 {
        return false;
    }
    to_geo_polygon(ring).contains(&Point::new(p.lng, p.lat))
}
