use crate::latlng::LatLng;

/// Geographic axis-aligned bounding box in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl GeoBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        GeoBounds {
            south_west,
            north_east,
        }
    }

    /// Smallest box containing every point; `None` for an empty slice.
    pub fn from_points(points: &[LatLng]) -> Option<Self> {
        let first = points.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &points[1..] {
            min.lat = min.lat.min(p.lat);
            min.lng = min.lng.min(p.lng);
            max.lat = max.lat.max(p.lat);
            max.lng = max.lng.max(p.lng);
        }
        Some(GeoBounds::new(min, max))
    }

    pub fn contains(&self, p: LatLng) -> bool {
        p.lat >= self.south_west.lat
            && p.lat <= self.north_east.lat
            && p.lng >= self.south_west.lng
            && p.lng <= self.north_east.lng
    }

    /// `[[south, west], [north, east]]`, the corner layout image overlays expect.
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [self.south_west.into(), self.north_east.into()]
    }
}
