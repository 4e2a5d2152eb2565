use std::f64::consts::PI;

use super::vec::Vec2;
use crate::latlng::LatLng;

/// Web Mercator tile size in pixels at zoom 0.
pub const TILE_SIZE_PX: f64 = 256.0;

/// Latitude limit of the square Web Mercator world.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Converts geographic points to container pixel coordinates.
///
/// The map widget owns the real projection; interaction code only needs the
/// screen distance between two points.
pub trait ScreenProjector {
    fn to_screen(&self, p: LatLng) -> Vec2;

    fn screen_distance(&self, a: LatLng, b: LatLng) -> f64 {
        self.to_screen(a).distance_to(self.to_screen(b))
    }
}

/// Spherical Web Mercator world pixel position at `zoom`.
pub fn mercator_world_px(p: LatLng, zoom: f64) -> Vec2 {
    let scale = TILE_SIZE_PX * 2f64.powf(zoom);
    let lat = p.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (p.lng + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale;
    Vec2::new(x, y)
}

/// A map view: center, zoom and container size.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MercatorViewport {
    pub center: LatLng,
    pub zoom: f64,
    pub width_px: f64,
    pub height_px: f64,
}

impl MercatorViewport {
    pub fn new(center: LatLng, zoom: f64, width_px: f64, height_px: f64) -> Self {
        Self {
            center,
            zoom,
            width_px: width_px.max(1.0),
            height_px: height_px.max(1.0),
        }
    }
}

impl ScreenProjector for MercatorViewport {
    fn to_screen(&self, p: LatLng) -> Vec2 {
        let origin = mercator_world_px(self.center, self.zoom)
            - Vec2::new(self.width_px / 2.0, self.height_px / 2.0);
        mercator_world_px(p, self.zoom) - origin
    }
}

#[cfg(test)]
mod tests {
    use super::{MercatorViewport, ScreenProjector, mercator_world_px};
    use crate::latlng::LatLng;
    use crate::math::Vec2;

    #[test]
    fn world_origin_is_top_left() {
        let p = mercator_world_px(LatLng::new(0.0, 0.0), 0.0);
        assert!((p.x - 128.0).abs() < 1e-9);
        assert!((p.y - 128.0).abs() < 1e-9);
    }

    #[test]
    fn center_maps_to_container_middle() {
        let center = LatLng::new(43.238949, 76.889709);
        let view = MercatorViewport::new(center, 13.0, 800.0, 600.0);
        let s = view.to_screen(center);
        assert!(s.distance_to(Vec2::new(400.0, 300.0)) < 1e-6);
    }

    #[test]
    fn screen_distance_scales_with_zoom() {
        let a = LatLng::new(43.0, 76.0);
        let b = LatLng::new(43.0, 76.0001);
        let near = MercatorViewport::new(a, 18.0, 800.0, 600.0);
        let far = MercatorViewport::new(a, 10.0, 800.0, 600.0);
        assert!(near.screen_distance(a, b) > 10.0);
        assert!(far.screen_distance(a, b) < 1.0);
    }
}
