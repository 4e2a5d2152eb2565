//! Precision policies.
//!
//! Coordinates coming out of a map widget carry floating noise from screen to
//! geographic conversions. Everything persisted goes through [`round_coord`]
//! first so equal-looking points compare equal.

use crate::latlng::LatLng;

/// Decimal digits kept for persisted coordinates.
pub const COORD_DECIMALS: i32 = 8;

/// Cross-product magnitude below which three points count as collinear.
pub const COLLINEAR_EPSILON: f64 = 1e-9;

/// Canonicalize a floating-point value.
///
/// - `-0.0` becomes `0.0`
/// - all NaNs become a single canonical NaN
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        // Handles +0.0 and -0.0.
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Round to `decimals` digits after the point.
pub fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    canonical_f64((v * scale).round() / scale)
}

pub fn round_coord(p: LatLng) -> LatLng {
    LatLng::new(round_to(p.lat, COORD_DECIMALS), round_to(p.lng, COORD_DECIMALS))
}

/// Z component of `(b - a) x (c - b)` in degree space.
pub fn turn_cross(a: LatLng, b: LatLng, c: LatLng) -> f64 {
    let (abx, aby) = (b.lng - a.lng, b.lat - a.lat);
    let (bcx, bcy) = (c.lng - b.lng, c.lat - b.lat);
    abx * bcy - aby * bcx
}

pub fn is_collinear(a: LatLng, b: LatLng, c: LatLng) -> bool {
    turn_cross(a, b, c).abs() < COLLINEAR_EPSILON
}
