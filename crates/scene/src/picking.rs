use foundation::LatLng;

use crate::entity::Polygon;

/// Topmost polygon under `point`.
///
/// Ordering contract:
/// - Later polygons are drawn above earlier ones, so the last containing
///   polygon wins.
/// - Points on a boundary are outside.
pub fn pick_polygon(polygons: &[Polygon], point: LatLng) -> Option<&Polygon> {
    polygons
        .iter()
        .rev()
        .filter(|p| p.bounds().is_some_and(|b| b.contains(point)))
        .find(|p| p.contains(point))
}
