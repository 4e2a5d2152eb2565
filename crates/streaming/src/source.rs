use bytes::Bytes;
use foundation::LatLng;
use runtime::BoxFuture;

/// Error type for raster and index lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Non-success response; `message` is the server's own text when it gave one.
    Status { status: u16, message: String },
    Network(String),
    Decode(String),
    /// No credential available; nothing was sent.
    Unauthorized,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Status { status, message } => write!(f, "{message} ({status})"),
            SourceError::Network(msg) => write!(f, "network error: {msg}"),
            SourceError::Decode(msg) => write!(f, "unexpected response: {msg}"),
            SourceError::Unauthorized => write!(f, "not signed in"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Server-rendered index rasters clipped to a stored polygon.
///
/// Implementations must be `Send + Sync` for use across async tasks.
pub trait RasterSource: Send + Sync {
    fn masked_index<'a>(
        &'a self,
        polygon_id: &'a str,
        layer_id: &'a str,
    ) -> BoxFuture<'a, Result<Bytes, SourceError>>;
}

/// Point NDVI lookups. `Ok(None)` means the service has no value there.
pub trait NdviSource: Send + Sync {
    fn ndvi_at(&self, point: LatLng) -> BoxFuture<'_, Result<Option<f64>, SourceError>>;
}
