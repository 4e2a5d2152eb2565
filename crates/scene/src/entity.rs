use foundation::math::ring_area_m2;
use foundation::time::{format_utc, now_ms};
use foundation::{GeoBounds, LatLng, PolygonId, Ring, open_vertices};
use formats::CropLabel;
use serde::{Deserialize, Serialize};

/// A field outline owned by the entity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub id: PolygonId,
    pub name: String,
    #[serde(default)]
    pub crop: Option<String>,
    /// Closed ring in map order.
    pub coordinates: Ring,
    /// Display hue; see [`foundation::hsl_css`].
    pub color: u16,
    /// Bumped on every local mutation.
    #[serde(default)]
    pub revision: u64,
}

impl Polygon {
    pub fn vertex_count(&self) -> usize {
        open_vertices(&self.coordinates).len()
    }

    pub fn bounds(&self) -> Option<GeoBounds> {
        GeoBounds::from_points(&self.coordinates)
    }

    pub fn area_m2(&self) -> f64 {
        ring_area_m2(&self.coordinates)
    }

    pub fn crop_label(&self) -> CropLabel {
        CropLabel::parse(self.crop.as_deref().unwrap_or_default())
    }

    pub fn contains(&self, p: LatLng) -> bool {
        foundation::math::ring_contains(&self.coordinates, p)
    }
}

/// Input to `PolygonStore::create`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonDraft {
    pub coordinates: Ring,
    /// `None` picks the timestamped default name.
    pub name: Option<String>,
    pub crop: Option<String>,
}

impl PolygonDraft {
    pub fn new(coordinates: Ring) -> Self {
        Self {
            coordinates,
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_crop(mut self, crop: impl Into<String>) -> Self {
        self.crop = Some(crop.into());
        self
    }
}

/// Field-wise replacement for `PolygonStore::update`; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the crop.
    pub crop: Option<Option<String>>,
    pub coordinates: Option<Ring>,
    pub color: Option<u16>,
}

impl PolygonPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn crop(crop: Option<String>) -> Self {
        Self {
            crop: Some(crop),
            ..Self::default()
        }
    }

    pub fn coordinates(ring: Ring) -> Self {
        Self {
            coordinates: Some(ring),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.crop.is_none()
            && self.coordinates.is_none()
            && self.color.is_none()
    }
}

pub fn default_field_name() -> String {
    format!("Field {}", format_utc(now_ms()))
}
