use runtime::BoxFuture;
use scene::Polygon;

use crate::error::RemoteError;
use crate::wire::FetchReport;

/// Server-side persistence of a user's polygons.
///
/// Implementations must be `Send + Sync`; methods return boxed futures so the
/// session can hold the remote as `Arc<dyn PolygonRemote>`.
pub trait PolygonRemote: Send + Sync {
    /// Persist a new polygon and return the server-assigned id.
    fn create_remote<'a>(&'a self, polygon: &'a Polygon) -> BoxFuture<'a, Result<String, RemoteError>>;

    /// Overwrite name, crop and geometry of a confirmed polygon.
    ///
    /// A pending polygon has nothing to update yet and fails with `Validation`.
    fn update_remote<'a>(&'a self, polygon: &'a Polygon) -> BoxFuture<'a, Result<(), RemoteError>>;

    fn delete_remote<'a>(&'a self, server_id: &'a str) -> BoxFuture<'a, Result<(), RemoteError>>;

    /// One bulk call removing every polygon of the user.
    fn delete_all_remote(&self) -> BoxFuture<'_, Result<(), RemoteError>>;

    fn fetch_all(&self) -> BoxFuture<'_, Result<FetchReport, RemoteError>>;
}

/// Server id of a polygon that must already be confirmed.
pub(crate) fn require_server_id(polygon: &Polygon) -> Result<&str, RemoteError> {
    polygon.id.server_id().ok_or_else(|| {
        RemoteError::Validation(format!("polygon {} has not been saved to the server yet", polygon.id))
    })
}
