use serde::{Deserialize, Serialize};

/// A map-native geographic point in degrees.
///
/// Serialized as a `[lat, lng]` pair, which is the order the map widget and the
/// local cache use. GeoJSON storage order (`[lng, lat]`) is handled by the codec.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Storage order used by GeoJSON.
    pub fn to_lng_lat(self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    pub fn from_lng_lat(pair: [f64; 2]) -> Self {
        Self::new(pair[1], pair[0])
    }

    pub fn is_finite(self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

impl From<[f64; 2]> for LatLng {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(p: LatLng) -> Self {
        [p.lat, p.lng]
    }
}

/// An ordered ring of map-native points.
pub type Ring = Vec<LatLng>;

/// True when the ring's first and last points are coordinate-equal.
pub fn is_closed(ring: &[LatLng]) -> bool {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) => ring.len() > 1 && first == last,
        _ => false,
    }
}

/// Append a copy of the first point if the ring is open.
pub fn close_ring(ring: &mut Ring) {
    if let Some(first) = ring.first().copied() {
        if !is_closed(ring) {
            ring.push(first);
        }
    }
}

/// Vertices of the ring without its closing duplicate.
pub fn open_vertices(ring: &[LatLng]) -> &[LatLng] {
    if is_closed(ring) {
        &ring[..ring.len() - 1]
    } else {
        ring
    }
}

/// Arithmetic mean of the open ring's vertices; used to anchor the field marker.
pub fn ring_center(ring: &[LatLng]) -> Option<LatLng> {
    let verts = open_vertices(ring);
    if verts.is_empty() {
        return None;
    }
    let n = verts.len() as f64;
    let (lat, lng) = verts
        .iter()
        .fold((0.0, 0.0), |(a, b), p| (a + p.lat, b + p.lng));
    Some(LatLng::new(lat / n, lng / n))
}

#[cfg(test)]
mod tests {
    use super::{LatLng, close_ring, is_closed, open_vertices, ring_center};

    fn ring(points: &[[f64; 2]]) -> Vec<LatLng> {
        points.iter().copied().map(LatLng::from).collect()
    }

    #[test]
    fn serializes_as_lat_lng_pair() {
        let json = serde_json::to_string(&LatLng::new(43.2, 76.9)).unwrap();
        assert_eq!(json, "[43.2,76.9]");
        let back: LatLng = serde_json::from_str(&json).unwrap();
        assert_eq!(back, LatLng::new(43.2, 76.9));
    }

    #[test]
    fn close_ring_appends_first_point_once() {
        let mut r = ring(&[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        assert!(!is_closed(&r));
        close_ring(&mut r);
        assert!(is_closed(&r));
        assert_eq!(r.len(), 4);
        close_ring(&mut r);
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn center_ignores_closing_duplicate() {
        let r = ring(&[[0.0, 0.0], [0.0, 2.0], [2.0, 2.0], [2.0, 0.0], [0.0, 0.0]]);
        assert_eq!(open_vertices(&r).len(), 4);
        assert_eq!(ring_center(&r), Some(LatLng::new(1.0, 1.0)));
        assert_eq!(ring_center(&[]), None);
    }
}
