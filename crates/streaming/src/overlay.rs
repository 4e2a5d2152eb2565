//! Masked index overlay for the selected polygon.
//!
//! Requests are debounced and superseding: only the most recent request can
//! render. An older request is cancelled by aborting its task (which drops the
//! in-flight fetch) and by invalidating its token, so a completion that races
//! the abort is still discarded.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use foundation::GeoBounds;
use parking_lot::Mutex;
use runtime::{CancelToken, Debouncer};
use scene::Polygon;

use crate::cache::{RasterCache, RasterKey};
use crate::layers::Layer;
use crate::request::Request;
use crate::residency::ResidencyState;
use crate::source::RasterSource;

pub const DEFAULT_OVERLAY_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayImage {
    pub request: Request,
    pub key: RasterKey,
    /// Where the image is pinned on the map: the polygon's bounding box.
    pub bounds: GeoBounds,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum OverlayState {
    #[default]
    Idle,
    Loading(RasterKey),
    Ready(OverlayImage),
    Failed { key: RasterKey, message: String },
}

impl OverlayState {
    pub fn is_loading(&self) -> bool {
        matches!(self, OverlayState::Loading(_))
    }

    pub fn image(&self) -> Option<&OverlayImage> {
        match self {
            OverlayState::Ready(image) => Some(image),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct OverlayShared {
    state: OverlayState,
    cache: RasterCache,
    renders: u64,
}

impl OverlayShared {
    fn replace_state(&mut self, next: OverlayState) {
        if let OverlayState::Ready(prev) = std::mem::replace(&mut self.state, next) {
            self.cache.release(prev.request);
        }
    }
}

/// Releases a requested raster if the fetch task is dropped mid-flight.
struct InFlight {
    shared: Arc<Mutex<OverlayShared>>,
    request: Request,
    settled: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.settled {
            self.shared.lock().cache.release(self.request);
            tracing::debug!(request = %self.request, "overlay fetch aborted");
        }
    }
}

pub struct OverlayFetcher {
    source: Arc<dyn RasterSource>,
    shared: Arc<Mutex<OverlayShared>>,
    debouncer: Debouncer,
}

impl OverlayFetcher {
    pub fn new(source: Arc<dyn RasterSource>, debounce: Duration) -> Self {
        Self {
            source,
            shared: Arc::new(Mutex::new(OverlayShared::default())),
            debouncer: Debouncer::new(debounce),
        }
    }

    pub fn state(&self) -> OverlayState {
        self.shared.lock().state.clone()
    }

    /// How many images have been rendered since creation.
    pub fn renders(&self) -> u64 {
        self.shared.lock().renders
    }

    pub fn live_rasters(&self) -> usize {
        self.shared.lock().cache.live_count()
    }

    pub fn raster_state(&self, req: Request) -> Option<ResidencyState> {
        self.shared.lock().cache.state(req)
    }

    /// Show `layer` clipped to `polygon`.
    ///
    /// Only masked-overlay layers with a stored polygon (server id and
    /// coordinates) are fetched; anything else clears the overlay. Returns
    /// whether a fetch was scheduled.
    pub fn request(&mut self, polygon: Option<&Polygon>, layer: &Layer) -> bool {
        let target = polygon.filter(|_| layer.needs_polygon()).and_then(|p| {
            let server_id = p.id.server_id()?;
            let bounds = p.bounds()?;
            Some((RasterKey::new(server_id, layer.id), bounds))
        });
        let Some((key, bounds)) = target else {
            self.clear();
            return false;
        };

        self.shared
            .lock()
            .replace_state(OverlayState::Loading(key.clone()));
        let source = Arc::clone(&self.source);
        let shared = Arc::clone(&self.shared);
        self.debouncer
            .schedule(move |token| fetch(source, shared, token, key, bounds));
        true
    }

    /// Cancel pending work and drop the displayed image.
    pub fn clear(&mut self) {
        if self.debouncer.cancel() {
            tracing::debug!("pending overlay request cancelled");
        }
        self.shared.lock().replace_state(OverlayState::Idle);
    }

    /// Clear and release every raster still held.
    pub fn shutdown(&mut self) {
        self.clear();
        let released = self.shared.lock().cache.release_all();
        if released > 0 {
            tracing::debug!(released, "overlay rasters released on shutdown");
        }
    }
}

impl Drop for OverlayFetcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn fetch(
    source: Arc<dyn RasterSource>,
    shared: Arc<Mutex<OverlayShared>>,
    token: CancelToken,
    key: RasterKey,
    bounds: GeoBounds,
) {
    let request = {
        let mut s = shared.lock();
        if token.is_cancelled() {
            return;
        }
        s.replace_state(OverlayState::Loading(key.clone()));
        s.cache.request(key.clone())
    };
    let mut in_flight = InFlight {
        shared: Arc::clone(&shared),
        request,
        settled: false,
    };

    tracing::debug!(%request, polygon = %key.polygon_id, layer = %key.layer_id, "fetching overlay");
    let result = source.masked_index(&key.polygon_id, &key.layer_id).await;

    let mut s = shared.lock();
    in_flight.settled = true;
    if token.is_cancelled() {
        s.cache.release(request);
        tracing::debug!(%request, "stale overlay result dropped");
        return;
    }

    match result {
        Ok(bytes) => match s.cache.mark_resident(request, bytes.clone()) {
            Ok(()) => {
                s.replace_state(OverlayState::Ready(OverlayImage {
                    request,
                    key,
                    bounds,
                    bytes,
                }));
                s.renders += 1;
            }
            Err(e) => tracing::warn!("overlay raster lost: {e}"),
        },
        Err(e) => {
            tracing::warn!(polygon = %key.polygon_id, layer = %key.layer_id, "overlay fetch failed: {e}");
            s.cache.release(request);
            s.replace_state(OverlayState::Failed {
                key,
                message: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::layer_by_id;
    use crate::source::SourceError;
    use foundation::{LatLng, PolygonId};
    use pretty_assertions::assert_eq;
    use runtime::BoxFuture;

    struct FakeRasters {
        delay: Duration,
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRasters {
        fn new(delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                delay: Duration::from_millis(delay_ms),
                fail: false,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                delay: Duration::from_millis(10),
                fail: true,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl RasterSource for FakeRasters {
        fn masked_index<'a>(
            &'a self,
            polygon_id: &'a str,
            layer_id: &'a str,
        ) -> BoxFuture<'a, Result<Bytes, SourceError>> {
            Box::pin(async move {
                self.calls.lock().push(polygon_id.to_string());
                tokio::time::sleep(self.delay).await;
                if self.fail {
                    return Err(SourceError::Status {
                        status: 502,
                        message: "index service down".into(),
                    });
                }
                Ok(Bytes::from(format!("{polygon_id}:{layer_id}")))
            })
        }
    }

    fn field(id: PolygonId, offset: f64) -> Polygon {
        Polygon {
            id,
            name: "f".into(),
            crop: None,
            coordinates: vec![
                LatLng::new(offset, offset),
                LatLng::new(offset, offset + 0.01),
                LatLng::new(offset + 0.01, offset + 0.01),
                LatLng::new(offset, offset),
            ],
            color: 0,
            revision: 0,
        }
    }

    fn ndvi() -> &'static Layer {
        layer_by_id("3_NDVI").unwrap()
    }

    fn fetcher(source: Arc<FakeRasters>) -> OverlayFetcher {
        OverlayFetcher::new(source, DEFAULT_OVERLAY_DEBOUNCE)
    }

    #[tokio::test(start_paused = true)]
    async fn quick_a_then_b_renders_only_b() {
        let source = FakeRasters::new(50);
        let mut f = fetcher(Arc::clone(&source));
        let a = field(PolygonId::confirmed("1"), 0.0);
        let b = field(PolygonId::confirmed("2"), 1.0);

        assert!(f.request(Some(&a), ndvi()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(f.request(Some(&b), ndvi()));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(f.renders(), 1);
        assert_eq!(source.calls(), vec!["2".to_string()]);
        let image = f.state().image().cloned().expect("overlay ready");
        assert_eq!(image.key, RasterKey::new("2", "3_NDVI"));
        assert_eq!(image.bounds, b.bounds().unwrap());
        assert_eq!(&image.bytes[..], b"2:3_NDVI");
        assert_eq!(f.live_rasters(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_in_flight_fetch_is_aborted() {
        let source = FakeRasters::new(1_000);
        let mut f = fetcher(Arc::clone(&source));
        let a = field(PolygonId::confirmed("1"), 0.0);
        let b = field(PolygonId::confirmed("2"), 1.0);

        f.request(Some(&a), ndvi());
        // A's debounce has fired and its fetch is in flight.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(f.state(), OverlayState::Loading(RasterKey::new("1", "3_NDVI")));
        f.request(Some(&b), ndvi());
        assert_eq!(f.state(), OverlayState::Loading(RasterKey::new("2", "3_NDVI")));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(source.calls(), vec!["1".to_string(), "2".to_string()]);
        assert_eq!(f.renders(), 1);
        let image = f.state().image().cloned().unwrap();
        assert_eq!(image.key.polygon_id, "2");
        // A's handle was released when its task was dropped.
        assert_eq!(f.raster_state(Request(1)), None);
        assert_eq!(f.live_rasters(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_an_image_releases_the_old_one() {
        let source = FakeRasters::new(10);
        let mut f = fetcher(source);
        let a = field(PolygonId::confirmed("1"), 0.0);
        let b = field(PolygonId::confirmed("2"), 1.0);

        f.request(Some(&a), ndvi());
        tokio::time::sleep(Duration::from_secs(1)).await;
        let first = f.state().image().unwrap().request;

        f.request(Some(&b), ndvi());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.renders(), 2);
        assert_eq!(f.raster_state(first), None);
        assert_eq!(f.live_rasters(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_overlay_layer_or_pending_polygon_clears() {
        let source = FakeRasters::new(10);
        let mut f = fetcher(Arc::clone(&source));
        let a = field(PolygonId::confirmed("1"), 0.0);

        f.request(Some(&a), ndvi());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(f.state().image().is_some());

        assert!(!f.request(Some(&a), layer_by_id("1_TRUE_COLOR").unwrap()));
        assert_eq!(f.state(), OverlayState::Idle);
        assert_eq!(f.live_rasters(), 0);

        let pending = field(PolygonId::new_pending(), 0.0);
        assert!(!f.request(Some(&pending), ndvi()));
        assert!(!f.request(None, ndvi()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_request_silently() {
        let source = FakeRasters::new(10);
        let mut f = fetcher(Arc::clone(&source));
        f.request(Some(&field(PolygonId::confirmed("1"), 0.0)), ndvi());
        f.clear();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(source.calls().is_empty());
        assert_eq!(f.state(), OverlayState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_reported_and_clears_raster() {
        let mut f = fetcher(FakeRasters::failing());
        f.request(Some(&field(PolygonId::confirmed("1"), 0.0)), ndvi());
        tokio::time::sleep(Duration::from_secs(1)).await;

        match f.state() {
            OverlayState::Failed { key, message } => {
                assert_eq!(key.polygon_id, "1");
                assert!(message.contains("index service down"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(f.renders(), 0);
        assert_eq!(f.live_rasters(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_everything() {
        let mut f = fetcher(FakeRasters::new(10));
        f.request(Some(&field(PolygonId::confirmed("1"), 0.0)), ndvi());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.live_rasters(), 1);
        f.shutdown();
        assert_eq!(f.live_rasters(), 0);
    }
}
