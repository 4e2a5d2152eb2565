//! The map-session controller.
//!
//! Each operation applies its local effect (store, cache, interaction state)
//! before returning, and hands back a [`SyncTask`] for the remote half. Hosts
//! spawn the task or await it; dropping it skips the remote write.

use std::collections::HashSet;
use std::sync::Arc;

use catalog::{CatalogStore, InMemoryCatalogStore, LocalStorageCatalogStore};
use foundation::math::ScreenProjector;
use foundation::{LatLng, PolygonId, Ring};
use formats::clean_ring;
use gateway::{Credentials, HttpIndexService, HttpPolygonRemote, PolygonRemote, RemoteError};
use parking_lot::Mutex;
use runtime::{BoxFuture, Notice, NoticeBus};
use scene::{
    InteractionMachine, InteractionOutput, Polygon, PolygonDraft, PolygonPatch, PolygonStore,
    Reconciliation, pick_polygon,
};
use streaming::{
    Layer, NdviSource, OverlayFetcher, OverlayState, PointerProbe, ProbePanel, RasterSource,
    WmsParams, default_layer, layer_by_id,
};

use crate::config::SessionConfig;
use crate::error::SessionError;

/// Remote half of a session operation.
pub type SyncTask = BoxFuture<'static, Result<(), SessionError>>;

fn settled() -> SyncTask {
    Box::pin(async { Ok(()) })
}

struct Shared<C> {
    store: PolygonStore<C>,
    notices: NoticeBus,
    /// Pending ids whose create request has not completed.
    creating: HashSet<PolygonId>,
}

type SharedState<C> = Arc<Mutex<Shared<C>>>;

pub struct FieldSession<C> {
    shared: SharedState<C>,
    remote: Arc<dyn PolygonRemote>,
    machine: InteractionMachine,
    overlay: OverlayFetcher,
    probe: PointerProbe,
    layer: &'static Layer,
    wms_time_range: String,
}

impl FieldSession<Box<dyn CatalogStore>> {
    /// Session against the configured HTTP API, cached in browser storage
    /// under `config.cache_key`. Hosts without local storage cache in memory.
    ///
    /// Must be called inside a tokio runtime.
    pub fn connect(config: &SessionConfig, credentials: Arc<Credentials>) -> Self {
        let remote = HttpPolygonRemote::with_timeout(
            config.api_url.as_str(),
            Arc::clone(&credentials),
            config.request_timeout,
        );
        let indices = Arc::new(HttpIndexService::new(
            config.api_url.as_str(),
            credentials,
            config.request_timeout,
        ));
        tracing::info!(api_url = %config.api_url, "field session connecting");
        Self::new(
            config,
            open_cache(&config.cache_key),
            Arc::new(remote),
            indices.clone(),
            indices,
        )
    }
}

fn open_cache(key: &str) -> Box<dyn CatalogStore> {
    match LocalStorageCatalogStore::new(key) {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!(key, "polygons cached in memory only: {e}");
            Box::new(InMemoryCatalogStore::new())
        }
    }
}

impl<C: CatalogStore + 'static> FieldSession<C> {
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: &SessionConfig,
        cache: C,
        remote: Arc<dyn PolygonRemote>,
        rasters: Arc<dyn RasterSource>,
        ndvi: Arc<dyn NdviSource>,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                store: PolygonStore::new(cache),
                notices: NoticeBus::new(),
                creating: HashSet::new(),
            })),
            remote,
            machine: InteractionMachine::new(config.close_tolerance_px),
            overlay: OverlayFetcher::new(rasters, config.overlay_debounce),
            probe: PointerProbe::new(ndvi, config.echo_delay, config.ndvi_delay),
            layer: default_layer(),
            wms_time_range: config.wms_time_range.clone(),
        }
    }

    pub fn polygons(&self) -> Vec<Polygon> {
        self.shared.lock().store.polygons().to_vec()
    }

    pub fn polygon(&self, id: &PolygonId) -> Option<Polygon> {
        self.shared.lock().store.get(id).cloned()
    }

    pub fn selected(&self) -> Option<Polygon> {
        self.shared.lock().store.selected().cloned()
    }

    pub fn selected_id(&self) -> Option<PolygonId> {
        self.shared.lock().store.selected_id().cloned()
    }

    pub fn interaction(&self) -> &InteractionMachine {
        &self.machine
    }

    pub fn display_path(&self) -> Vec<LatLng> {
        self.machine.display_path()
    }

    pub fn overlay(&self) -> OverlayState {
        self.overlay.state()
    }

    pub fn probe_panel(&self) -> ProbePanel {
        self.probe.panel()
    }

    pub fn active_layer(&self) -> &'static Layer {
        self.layer
    }

    /// Tile parameters for the active layer when it is served over WMS.
    pub fn wms_params(&self) -> Option<WmsParams> {
        WmsParams::for_layer(self.layer, self.wms_time_range.as_str())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.shared.lock().notices.notices().to_vec()
    }

    pub fn drain_notices(&self) -> Vec<Notice> {
        self.shared.lock().notices.drain()
    }

    pub fn crop_area_summary(&self) -> Vec<(String, f64)> {
        self.shared.lock().store.crop_area_summary()
    }

    pub fn total_area_m2(&self) -> f64 {
        self.shared.lock().store.total_area_m2()
    }

    /// Startup: the cache snapshot wins; without one, load from the server.
    pub fn bootstrap(&mut self) -> SyncTask {
        let cached = self.shared.lock().store.load_from_cache();
        match cached {
            Ok(Some(count)) => {
                self.shared
                    .lock()
                    .notices
                    .info(format!("Loaded {count} polygons from local storage"));
                settled()
            }
            Ok(None) => self.reload_from_remote(),
            Err(e) => {
                tracing::warn!("polygon cache unavailable, loading from server: {e}");
                self.reload_from_remote()
            }
        }
    }

    /// Replace the collection with the server's copy. Active drawing and
    /// editing sessions are dropped.
    pub fn reload_from_remote(&mut self) -> SyncTask {
        self.machine.stop_drawing();
        self.machine.cancel_edit();
        self.overlay.clear();

        let shared = Arc::clone(&self.shared);
        let remote = Arc::clone(&self.remote);
        Box::pin(async move {
            let report = match remote.fetch_all().await {
                Ok(report) => report,
                Err(e) => {
                    shared
                        .lock()
                        .notices
                        .error(format!("Could not load polygons from the server: {e}"));
                    return Err(e.into());
                }
            };
            let mut st = shared.lock();
            let loaded = st.store.replace_all(report.polygons);
            st.notices
                .success(format!("Loaded {loaded} polygons from the server"));
            if report.discarded > 0 {
                st.notices.warning(format!(
                    "{} server records had invalid geometry and were skipped",
                    report.discarded
                ));
            }
            Ok(())
        })
    }

    /// Enter drawing mode. An active vertex edit is saved first; the
    /// selection and overlay are cleared.
    pub fn start_drawing(&mut self) -> Result<SyncTask, SessionError> {
        let committed = self.machine.start_drawing();
        let task = self.apply_output(committed);
        self.shared.lock().store.select(None)?;
        self.overlay.clear();
        task
    }

    pub fn stop_drawing(&mut self) -> bool {
        self.machine.stop_drawing()
    }

    /// Map click: extends or closes the drawing, otherwise selects the
    /// topmost polygon under the pointer.
    pub fn click(
        &mut self,
        point: LatLng,
        projector: &dyn ScreenProjector,
    ) -> Result<SyncTask, SessionError> {
        if self.machine.is_drawing() {
            let out = self.machine.click(point, projector);
            return self.apply_output(out);
        }
        if !self.machine.is_idle() {
            return Ok(settled());
        }
        let hit = {
            let st = self.shared.lock();
            pick_polygon(st.store.polygons(), point).map(|p| p.id.clone())
        };
        match hit {
            Some(id) => self.select(Some(&id)),
            None => Ok(settled()),
        }
    }

    pub fn double_click(&mut self) -> Result<SyncTask, SessionError> {
        let out = self.machine.double_click();
        self.apply_output(out)
    }

    pub fn pointer_move(&mut self, point: LatLng) {
        self.machine.pointer_move(point);
        if !self.machine.is_drawing() {
            let field = self.selected();
            self.probe.on_pointer_move(point, field.as_ref());
        }
    }

    pub fn pointer_out(&mut self) {
        self.machine.pointer_out();
        self.probe.on_pointer_out();
    }

    /// Start vertex editing. An active drawing is cancelled, an edit of
    /// another polygon is saved.
    pub fn edit_shape(&mut self, id: &PolygonId) -> Result<SyncTask, SessionError> {
        let ring = self.polygon(id).map(|p| p.coordinates);
        let Some(ring) = ring else {
            return Err(self.report(scene::StoreError::NotFound(id.clone()).into()));
        };
        let out = self.machine.edit_shape(id.clone(), &ring);
        self.apply_output(out)
    }

    pub fn move_vertex(&mut self, index: usize, to: LatLng) -> Result<(), SessionError> {
        self.machine
            .move_vertex(index, to)
            .map_err(|e| self.report(e.into()))
    }

    pub fn insert_vertex(&mut self, after: usize, point: LatLng) -> Result<(), SessionError> {
        self.machine
            .insert_vertex(after, point)
            .map_err(|e| self.report(e.into()))
    }

    pub fn remove_vertex(&mut self, index: usize) -> Result<(), SessionError> {
        self.machine
            .remove_vertex(index)
            .map_err(|e| self.report(e.into()))
    }

    pub fn stop_and_save(&mut self) -> Result<SyncTask, SessionError> {
        match self.machine.stop_and_save() {
            Some(out) => self.apply_output(Some(out)),
            None => Err(self.report(scene::InteractionError::NotEditing.into())),
        }
    }

    pub fn cancel_edit(&mut self) -> bool {
        self.machine.cancel_edit()
    }

    pub fn create_polygon(&mut self, draft: PolygonDraft) -> Result<SyncTask, SessionError> {
        let created = self.shared.lock().store.create(draft);
        let polygon = created.map_err(|e| self.report(e.into()))?;
        Ok(self.create_task(polygon))
    }

    /// Local update, mirrored to the server when a stored field changed.
    ///
    /// Pending polygons are not sent here; their create carries the change.
    pub fn update_polygon(
        &mut self,
        id: &PolygonId,
        patch: PolygonPatch,
    ) -> Result<SyncTask, SessionError> {
        let touches_geometry = patch.coordinates.is_some();
        let updated = self.shared.lock().store.update(id, patch);
        let outcome = updated.map_err(|e| self.report(e.into()))?;

        if touches_geometry && self.selected_id().as_ref() == Some(id) {
            self.refresh_overlay();
        }
        if !outcome.remote_changed {
            return Ok(settled());
        }
        if outcome.polygon.id.is_pending() {
            tracing::debug!(id = %outcome.polygon.id, "update deferred until create completes");
            return Ok(settled());
        }
        Ok(self.update_task(outcome.polygon))
    }

    pub fn rename(&mut self, id: &PolygonId, name: &str) -> Result<SyncTask, SessionError> {
        self.update_polygon(id, PolygonPatch::name(name))
    }

    pub fn set_crop(&mut self, id: &PolygonId, crop: Option<String>) -> Result<SyncTask, SessionError> {
        self.update_polygon(id, PolygonPatch::crop(crop))
    }

    /// Manual retry after a failed server write.
    pub fn save(&mut self, id: &PolygonId) -> Result<SyncTask, SessionError> {
        let (polygon, in_flight) = {
            let st = self.shared.lock();
            (st.store.get(id).cloned(), st.creating.contains(id))
        };
        let Some(polygon) = polygon else {
            return Err(self.report(scene::StoreError::NotFound(id.clone()).into()));
        };
        if in_flight {
            self.shared.lock().notices.info("Polygon is still being saved");
            return Ok(settled());
        }
        Ok(if polygon.id.is_pending() {
            self.create_task(polygon)
        } else {
            self.update_task(polygon)
        })
    }

    /// Remove locally, then on the server. A pending polygon has no server
    /// copy yet; an in-flight create for it is cleaned up on completion.
    pub fn delete_polygon(&mut self, id: &PolygonId) -> Result<SyncTask, SessionError> {
        if self.machine.editing_id() == Some(id) {
            self.machine.cancel_edit();
        }
        let removed = self.shared.lock().store.remove(id);
        let removal = removed.map_err(|e| self.report(e.into()))?;
        if removal.was_selected {
            self.overlay.clear();
        }

        let Some(server_id) = removal.polygon.id.server_id().map(str::to_string) else {
            self.shared
                .lock()
                .notices
                .info(format!("Polygon \"{}\" removed", removal.polygon.name));
            return Ok(settled());
        };

        let shared = Arc::clone(&self.shared);
        let remote = Arc::clone(&self.remote);
        let name = removal.polygon.name;
        Ok(Box::pin(async move {
            let result = remote.delete_remote(&server_id).await;
            let mut st = shared.lock();
            match result {
                Ok(()) => {
                    st.notices.success(format!("Polygon \"{name}\" deleted"));
                    Ok(())
                }
                Err(e) => {
                    st.notices
                        .error(format!("Polygon \"{name}\" was not deleted on the server: {e}"));
                    Err(e.into())
                }
            }
        }))
    }

    /// Empty everything locally and issue a single bulk delete.
    pub fn clear_all(&mut self) -> SyncTask {
        self.machine.stop_drawing();
        self.machine.cancel_edit();
        self.overlay.clear();
        let removed = self.shared.lock().store.clear_all();
        tracing::info!(removed, "polygons cleared locally");

        let shared = Arc::clone(&self.shared);
        let remote = Arc::clone(&self.remote);
        Box::pin(async move {
            let result = remote.delete_all_remote().await;
            let mut st = shared.lock();
            match result {
                Ok(()) => {
                    st.notices.success("All polygons deleted");
                    Ok(())
                }
                Err(e) => {
                    st.notices
                        .error(format!("Polygons were not deleted on the server: {e}"));
                    Err(e.into())
                }
            }
        })
    }

    /// Local-only reset of every crop tag.
    pub fn clear_all_crops(&mut self) -> usize {
        let mut st = self.shared.lock();
        let cleared = st.store.clear_all_crops();
        st.notices.info(format!("Cleared crops on {cleared} polygons"));
        cleared
    }

    /// Change the selection. Drawing is cancelled and an active vertex edit
    /// is saved before the selection moves.
    pub fn select(&mut self, id: Option<&PolygonId>) -> Result<SyncTask, SessionError> {
        if let Some(id) = id {
            let exists = self.shared.lock().store.get(id).is_some();
            if !exists {
                return Err(self.report(scene::StoreError::NotFound(id.clone()).into()));
            }
        }

        if self.machine.stop_drawing() {
            tracing::debug!("drawing cancelled by selection change");
        }
        let committed = self.machine.stop_and_save();
        let task = self.apply_output(committed)?;

        self.shared.lock().store.select(id)?;
        self.refresh_overlay();
        Ok(task)
    }

    pub fn set_layer(&mut self, layer_id: &str) -> Result<(), SessionError> {
        let Some(layer) = layer_by_id(layer_id) else {
            return Err(self.report(SessionError::UnknownLayer(layer_id.to_string())));
        };
        self.layer = layer;
        self.refresh_overlay();
        Ok(())
    }

    /// Re-request the overlay for the current selection and layer. Returns
    /// whether a fetch was scheduled.
    pub fn refresh_overlay(&mut self) -> bool {
        let selected = self.selected();
        self.overlay.request(selected.as_ref(), self.layer)
    }

    pub fn shutdown(&mut self) {
        self.probe.on_pointer_out();
        self.overlay.shutdown();
    }

    fn apply_output(&mut self, out: Option<InteractionOutput>) -> Result<SyncTask, SessionError> {
        match out {
            None => Ok(settled()),
            Some(InteractionOutput::RingClosed(ring)) => {
                let ring = normalized(&ring).map_err(|e| self.report(e))?;
                self.create_polygon(PolygonDraft::new(ring))
            }
            Some(InteractionOutput::EditCommitted { id, ring }) => {
                let ring = normalized(&ring).map_err(|e| self.report(e))?;
                self.update_polygon(&id, PolygonPatch::coordinates(ring))
            }
        }
    }

    fn report(&self, err: SessionError) -> SessionError {
        self.shared.lock().notices.error(err.to_string());
        err
    }

    fn create_task(&self, polygon: Polygon) -> SyncTask {
        let shared = Arc::clone(&self.shared);
        let remote = Arc::clone(&self.remote);
        let in_flight = CreateInFlight::mark(&shared, &polygon.id);
        Box::pin(async move {
            let sent_revision = polygon.revision;
            let result = remote.create_remote(&polygon).await;
            drop(in_flight);

            let server_id = match result {
                Ok(id) => id,
                Err(e) => {
                    shared.lock().notices.error(format!(
                        "Polygon \"{}\" was saved locally but not on the server: {e}{}",
                        polygon.name,
                        retry_hint(&e)
                    ));
                    return Err(e.into());
                }
            };

            let outcome = shared
                .lock()
                .store
                .confirm(&polygon.id, &server_id, sent_revision);
            match outcome {
                Reconciliation::Confirmed { polygon, resend } => {
                    shared
                        .lock()
                        .notices
                        .success(format!("Polygon \"{}\" saved", polygon.name));
                    if resend {
                        tracing::debug!(id = %polygon.id, "re-sending changes made during create");
                        push_update(&shared, remote.as_ref(), &polygon).await?;
                    }
                    Ok(())
                }
                Reconciliation::Orphaned { server_id } => {
                    tracing::info!(server_id, "deleting server copy of a removed polygon");
                    if let Err(e) = remote.delete_remote(&server_id).await {
                        shared
                            .lock()
                            .notices
                            .error(format!("Removed polygon is still stored on the server: {e}"));
                        return Err(e.into());
                    }
                    Ok(())
                }
                Reconciliation::Merged { polygon } => {
                    tracing::debug!(id = %polygon.id, "create resolved to an existing polygon");
                    Ok(())
                }
            }
        })
    }

    fn update_task(&self, polygon: Polygon) -> SyncTask {
        let shared = Arc::clone(&self.shared);
        let remote = Arc::clone(&self.remote);
        Box::pin(async move { push_update(&shared, remote.as_ref(), &polygon).await })
    }
}

/// Marks a pending id as being created until dropped, so a dropped task
/// does not leave the mark behind.
struct CreateInFlight<C> {
    shared: SharedState<C>,
    id: PolygonId,
}

impl<C> CreateInFlight<C> {
    fn mark(shared: &SharedState<C>, id: &PolygonId) -> Self {
        shared.lock().creating.insert(id.clone());
        Self {
            shared: Arc::clone(shared),
            id: id.clone(),
        }
    }
}

impl<C> Drop for CreateInFlight<C> {
    fn drop(&mut self) {
        self.shared.lock().creating.remove(&self.id);
    }
}

fn retry_hint(err: &RemoteError) -> &'static str {
    if err.is_retryable() {
        " (use save to retry)"
    } else {
        ""
    }
}

// Shapes from the pointer are stored cleaned.
fn normalized(ring: &Ring) -> Result<Ring, SessionError> {
    clean_ring(ring).ok_or_else(|| {
        SessionError::Store(scene::StoreError::Validation(
            "shape is degenerate and cannot be saved".into(),
        ))
    })
}

async fn push_update<C: CatalogStore>(
    shared: &SharedState<C>,
    remote: &dyn PolygonRemote,
    polygon: &Polygon,
) -> Result<(), SessionError> {
    let result = remote.update_remote(polygon).await;
    let mut st = shared.lock();
    match result {
        Ok(()) => {
            st.notices
                .success(format!("Polygon \"{}\" updated", polygon.name));
            Ok(())
        }
        Err(e) => {
            st.notices.error(format!(
                "Changes to \"{}\" were not saved on the server: {e}{}",
                polygon.name,
                retry_hint(&e)
            ));
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use foundation::math::Vec2;
    use gateway::{MemoryPolygonRemote, RemoteCall};
    use pretty_assertions::assert_eq;
    use runtime::NoticeLevel;
    use std::time::Duration;
    use streaming::SourceError;

    struct Linear;

    impl ScreenProjector for Linear {
        fn to_screen(&self, p: LatLng) -> Vec2 {
            Vec2::new(p.lng * 1000.0, -p.lat * 1000.0)
        }
    }

    #[derive(Default)]
    struct FakeIndices {
        raster_calls: Mutex<Vec<(String, String)>>,
    }

    impl RasterSource for FakeIndices {
        fn masked_index<'a>(
            &'a self,
            polygon_id: &'a str,
            layer_id: &'a str,
        ) -> BoxFuture<'a, Result<Bytes, SourceError>> {
            Box::pin(async move {
                self.raster_calls
                    .lock()
                    .push((polygon_id.to_string(), layer_id.to_string()));
                Ok(Bytes::from_static(b"png"))
            })
        }
    }

    impl NdviSource for FakeIndices {
        fn ndvi_at(&self, _point: LatLng) -> BoxFuture<'_, Result<Option<f64>, SourceError>> {
            Box::pin(async { Ok(Some(0.5)) })
        }
    }

    struct Harness {
        session: FieldSession<InMemoryCatalogStore>,
        remote: Arc<MemoryPolygonRemote>,
        indices: Arc<FakeIndices>,
    }

    fn harness_with(remote: MemoryPolygonRemote, cache: InMemoryCatalogStore) -> Harness {
        let remote = Arc::new(remote);
        let indices = Arc::new(FakeIndices::default());
        let session = FieldSession::new(
            &SessionConfig::default(),
            cache,
            remote.clone(),
            indices.clone(),
            indices.clone(),
        );
        Harness {
            session,
            remote,
            indices,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryPolygonRemote::new(), InMemoryCatalogStore::new())
    }

    fn square(offset: f64) -> Vec<LatLng> {
        vec![
            LatLng::new(offset, offset),
            LatLng::new(offset, offset + 1.0),
            LatLng::new(offset + 1.0, offset + 1.0),
            LatLng::new(offset + 1.0, offset),
            LatLng::new(offset, offset),
        ]
    }

    /// Create and confirm a polygon, returning its confirmed id.
    async fn saved(h: &mut Harness, name: &str, offset: f64) -> PolygonId {
        let draft = PolygonDraft::new(square(offset)).named(name);
        h.session.create_polygon(draft).unwrap().await.unwrap();
        h.session
            .polygons()
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.id)
            .unwrap()
    }

    #[tokio::test]
    async fn blank_name_fails_without_a_request() {
        let mut h = harness();
        let draft = PolygonDraft::new(square(0.0)).named("   ");

        let err = h.session.create_polygon(draft).err().unwrap();
        assert!(err.is_precondition());
        assert!(h.session.polygons().is_empty());
        assert!(h.remote.calls().is_empty());
        assert_eq!(h.session.notices().last().unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn drawn_ring_is_created_and_confirmed() {
        let mut h = harness();
        h.session.start_drawing().unwrap().await.unwrap();
        for p in &square(0.0)[..4] {
            h.session.click(*p, &Linear).unwrap().await.unwrap();
        }
        let task = h.session.click(LatLng::new(0.000_001, 0.0), &Linear).unwrap();

        assert!(h.session.interaction().is_idle());
        let local = h.session.polygons();
        assert_eq!(local.len(), 1);
        assert!(local[0].id.is_pending());

        task.await.unwrap();
        let stored = h.session.polygons();
        assert_eq!(stored[0].id, PolygonId::confirmed("1"));
        assert_eq!(stored[0].coordinates.len(), 5);
    }

    #[tokio::test]
    async fn collinear_drawing_is_rejected_locally() {
        let mut h = harness();
        h.session.start_drawing().unwrap().await.unwrap();
        for lng in [0.0, 1.0, 2.0] {
            h.session.click(LatLng::new(0.0, lng), &Linear).unwrap().await.unwrap();
        }

        let err = h.session.double_click().err().unwrap();
        assert!(err.is_precondition());
        assert!(h.session.interaction().is_idle());
        assert!(h.session.polygons().is_empty());
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn deleting_selected_polygon_clears_selection() {
        let mut h = harness();
        let a = saved(&mut h, "A", 0.0).await;
        let b = saved(&mut h, "B", 5.0).await;

        h.session.select(Some(&a)).unwrap().await.unwrap();
        h.session.delete_polygon(&b).unwrap().await.unwrap();
        assert_eq!(h.session.selected_id(), Some(a.clone()));

        h.session.delete_polygon(&a).unwrap().await.unwrap();
        assert_eq!(h.session.selected_id(), None);
        assert!(h.remote.stored_ids().is_empty());
    }

    #[tokio::test]
    async fn start_drawing_commits_active_edit() {
        let mut h = harness();
        let id = saved(&mut h, "A", 0.0).await;

        h.session.edit_shape(&id).unwrap().await.unwrap();
        h.session.move_vertex(2, LatLng::new(2.0, 2.0)).unwrap();
        h.session.start_drawing().unwrap().await.unwrap();

        assert!(h.session.interaction().is_drawing());
        assert_eq!(h.session.polygon(&id).unwrap().coordinates[2], LatLng::new(2.0, 2.0));
        assert_eq!(
            h.remote.calls().last(),
            Some(&RemoteCall::Update {
                server_id: "1".into()
            })
        );
        assert!(h.remote.stored("1").unwrap().geo_json.contains("[2.0,2.0]"));
    }

    #[tokio::test]
    async fn selecting_during_edit_saves_first() {
        let mut h = harness();
        let a = saved(&mut h, "A", 0.0).await;
        let b = saved(&mut h, "B", 5.0).await;

        h.session.edit_shape(&a).unwrap().await.unwrap();
        h.session.remove_vertex(3).unwrap();
        h.session.select(Some(&b)).unwrap().await.unwrap();

        assert!(h.session.interaction().is_idle());
        assert_eq!(h.session.polygon(&a).unwrap().vertex_count(), 3);
        assert_eq!(h.session.selected_id(), Some(b));
    }

    async fn clear_all_with(count: usize) {
        let mut h = harness();
        for i in 0..count {
            saved(&mut h, &format!("P{i}"), i as f64 * 0.01).await;
        }
        assert_eq!(h.session.polygons().len(), count);

        h.session.clear_all().await.unwrap();

        assert!(h.session.polygons().is_empty());
        assert!(h.remote.stored_ids().is_empty());
        let deletes: Vec<_> = h
            .remote
            .calls()
            .into_iter()
            .filter(|c| matches!(c, RemoteCall::Delete { .. } | RemoteCall::DeleteAll))
            .collect();
        assert_eq!(deletes, vec![RemoteCall::DeleteAll]);
    }

    #[tokio::test]
    async fn clear_all_issues_one_bulk_delete() {
        for count in [0, 1, 1000] {
            clear_all_with(count).await;
        }
    }

    #[tokio::test]
    async fn save_while_create_is_pending_sends_one_create() {
        let mut h = harness();
        let create = h
            .session
            .create_polygon(PolygonDraft::new(square(0.0)).named("A"))
            .unwrap();
        let pending = h.session.polygons()[0].id.clone();

        // Neither task has been polled yet.
        let retry = h.session.save(&pending).unwrap();
        let again = h.session.save(&pending).unwrap();
        let (a, b, c) = tokio::join!(create, retry, again);
        assert_eq!((a, b, c), (Ok(()), Ok(()), Ok(())));

        assert_eq!(
            h.remote.calls(),
            vec![RemoteCall::Create { name: "A".into() }]
        );
        assert_eq!(h.session.polygons()[0].id, PolygonId::confirmed("1"));
    }

    #[tokio::test]
    async fn dropped_create_task_can_be_retried() {
        let mut h = harness();
        let create = h
            .session
            .create_polygon(PolygonDraft::new(square(0.0)).named("A"))
            .unwrap();
        let pending = h.session.polygons()[0].id.clone();
        drop(create);

        h.session.save(&pending).unwrap().await.unwrap();
        assert_eq!(
            h.remote.calls(),
            vec![RemoteCall::Create { name: "A".into() }]
        );
        assert_eq!(h.session.polygons()[0].id, PolygonId::confirmed("1"));
    }

    #[tokio::test]
    async fn edits_during_create_are_resent() {
        let mut h = harness();
        let create = h
            .session
            .create_polygon(PolygonDraft::new(square(0.0)).named("Draft"))
            .unwrap();
        let pending = h.session.polygons()[0].id.clone();

        // Still pending: applied locally, carried by the create's follow-up.
        h.session.rename(&pending, "Renamed").unwrap().await.unwrap();
        assert!(h.remote.calls().is_empty());

        create.await.unwrap();
        assert_eq!(
            h.remote.calls(),
            vec![
                RemoteCall::Create {
                    name: "Draft".into()
                },
                RemoteCall::Update {
                    server_id: "1".into()
                },
            ]
        );
        assert_eq!(h.remote.stored("1").unwrap().name, "Renamed");
    }

    #[tokio::test]
    async fn polygon_deleted_during_create_is_removed_remotely() {
        let mut h = harness();
        let create = h
            .session
            .create_polygon(PolygonDraft::new(square(0.0)).named("Gone"))
            .unwrap();
        let pending = h.session.polygons()[0].id.clone();
        h.session.delete_polygon(&pending).unwrap().await.unwrap();

        create.await.unwrap();
        assert!(h.session.polygons().is_empty());
        assert!(h.remote.stored_ids().is_empty());
        assert_eq!(
            h.remote.calls().last(),
            Some(&RemoteCall::Delete {
                server_id: "1".into()
            })
        );
    }

    #[tokio::test]
    async fn failed_write_keeps_local_state_and_can_be_retried() {
        let mut h = harness();
        h.remote.fail_next(RemoteError::Network("offline".into()));
        let result = h
            .session
            .create_polygon(PolygonDraft::new(square(0.0)).named("A"))
            .unwrap()
            .await;

        assert_eq!(
            result,
            Err(SessionError::Remote(RemoteError::Network("offline".into())))
        );
        let local = h.session.polygons();
        assert_eq!(local.len(), 1);
        assert!(local[0].id.is_pending());
        let notice = h.session.notices().last().cloned().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.ends_with("(use save to retry)"));

        h.session.save(&local[0].id).unwrap().await.unwrap();
        assert_eq!(h.session.polygons()[0].id, PolygonId::confirmed("1"));
    }

    #[tokio::test]
    async fn bootstrap_prefers_cache() {
        let remote = MemoryPolygonRemote::new();
        let cached = cached_snapshot();
        let mut h = harness_with(remote, InMemoryCatalogStore::with_snapshot(cached));

        h.session.bootstrap().await.unwrap();
        assert_eq!(h.session.polygons().len(), 1);
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_falls_back_to_server() {
        let seeded = Polygon {
            id: PolygonId::confirmed("x"),
            name: "Server field".into(),
            crop: None,
            coordinates: square(0.0),
            color: 0,
            revision: 0,
        };
        let remote = MemoryPolygonRemote::with_polygons(&[seeded]);
        let mut h = harness_with(remote, InMemoryCatalogStore::with_snapshot("[]"));

        h.session.bootstrap().await.unwrap();
        assert_eq!(h.remote.calls(), vec![RemoteCall::FetchAll]);
        let polygons = h.session.polygons();
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].name, "Server field");
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_with_index_layer_fetches_overlay() {
        let mut h = harness();
        let id = saved(&mut h, "A", 0.0).await;

        h.session.set_layer("3_NDVI").unwrap();
        h.session.select(Some(&id)).unwrap().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(matches!(h.session.overlay(), OverlayState::Ready(_)));
        assert_eq!(
            *h.indices.raster_calls.lock(),
            vec![("1".to_string(), "3_NDVI".to_string())]
        );

        h.session.start_drawing().unwrap().await.unwrap();
        assert_eq!(h.session.overlay(), OverlayState::Idle);
    }

    #[tokio::test]
    async fn connected_session_uses_configured_backend() {
        let config = SessionConfig {
            api_url: "http://127.0.0.1:9".into(),
            ..SessionConfig::default()
        };
        let mut session = FieldSession::connect(&config, Arc::new(Credentials::default()));

        // No token: the server is never contacted and no snapshot exists.
        let err = session.bootstrap().await.unwrap_err();
        assert_eq!(err, SessionError::Remote(RemoteError::Auth));
        assert!(err.is_precondition());
        assert!(session.polygons().is_empty());
    }

    #[tokio::test]
    async fn unknown_layer_is_rejected() {
        let mut h = harness();
        assert_eq!(
            h.session.set_layer("nope"),
            Err(SessionError::UnknownLayer("nope".into()))
        );
        assert_eq!(h.session.active_layer().id, streaming::OSM_LAYER_ID);
        assert!(h.session.wms_params().is_none());
    }

    fn cached_snapshot() -> String {
        r#"[{"id":{"state":"confirmed","value":"7"},"name":"Cached","crop":null,
             "coordinates":[[0.0,0.0],[0.0,1.0],[1.0,1.0],[0.0,0.0]],"color":120}]"#
            .to_string()
    }
}
