/// How a map layer is produced.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Plain slippy-map base tiles.
    BaseTiles,
    /// Full-extent imagery through the WMS proxy.
    WmsTiles,
    /// An index raster clipped to one polygon; needs the overlay fetcher.
    MaskedOverlay,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Layer {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: LayerKind,
}

impl Layer {
    pub fn needs_polygon(&self) -> bool {
        self.kind == LayerKind::MaskedOverlay
    }
}

pub const OSM_LAYER_ID: &str = "OSM";

pub const OSM_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Selectable layers in menu order.
pub const LAYERS: &[Layer] = &[
    Layer {
        id: OSM_LAYER_ID,
        label: "OpenStreetMap",
        kind: LayerKind::BaseTiles,
    },
    Layer {
        id: "1_TRUE_COLOR",
        label: "True Color",
        kind: LayerKind::WmsTiles,
    },
    Layer {
        id: "2_FALSE_COLOR",
        label: "False Color",
        kind: LayerKind::WmsTiles,
    },
    Layer {
        id: "3_NDVI",
        label: "NDVI",
        kind: LayerKind::MaskedOverlay,
    },
    Layer {
        id: "5-MOISTURE-INDEX1",
        label: "Moisture Index",
        kind: LayerKind::MaskedOverlay,
    },
    Layer {
        id: "6-SWIR",
        label: "SWIR",
        kind: LayerKind::WmsTiles,
    },
    Layer {
        id: "7-NDWI",
        label: "NDWI",
        kind: LayerKind::MaskedOverlay,
    },
    Layer {
        id: "8-NDSI",
        label: "NDSI",
        kind: LayerKind::MaskedOverlay,
    },
    Layer {
        id: "SCENE-CLASSIFICATION",
        label: "Scene Classification",
        kind: LayerKind::WmsTiles,
    },
];

pub fn layer_by_id(id: &str) -> Option<&'static Layer> {
    LAYERS.iter().find(|l| l.id == id)
}

pub fn default_layer() -> &'static Layer {
    &LAYERS[0]
}

/// WMS request parameters for the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WmsParams {
    pub layers: String,
    pub format: &'static str,
    pub version: &'static str,
    pub time: String,
    pub max_cloud_cover: u8,
}

impl WmsParams {
    pub fn for_layer(layer: &Layer, time_range: impl Into<String>) -> Option<Self> {
        (layer.kind == LayerKind::WmsTiles).then(|| Self {
            layers: layer.id.to_string(),
            format: "image/png",
            version: "1.3.0",
            time: time_range.into(),
            max_cloud_cover: 20,
        })
    }
}
