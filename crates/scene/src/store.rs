use std::collections::BTreeMap;

use catalog::{CatalogError, CatalogStore, load_typed, save_typed};
use foundation::{PolygonId, Ring, close_ring, open_vertices, random_hue};

use crate::entity::{Polygon, PolygonDraft, PolygonPatch, default_field_name};
use crate::selection::Selection;

/// Minimum distinct vertices of a stored polygon.
pub const MIN_VERTICES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    NotFound(PolygonId),
    Validation(String),
    Cache(CatalogError),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "polygon {id} not found"),
            StoreError::Validation(msg) => write!(f, "{msg}"),
            StoreError::Cache(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Cache(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CatalogError> for StoreError {
    fn from(value: CatalogError) -> Self {
        StoreError::Cache(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub polygon: Polygon,
    /// A field the remote store keeps (name, crop, coordinates) changed.
    pub remote_changed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    pub polygon: Polygon,
    pub was_selected: bool,
}

/// Result of swapping a pending id for the server-assigned one.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// `resend` is set when the polygon changed after its create was sent.
    Confirmed { polygon: Polygon, resend: bool },
    /// The pending polygon was deleted while its create was in flight; the
    /// server copy has no local counterpart.
    Orphaned { server_id: String },
    /// A polygon with this server id is already present; the pending
    /// duplicate was dropped.
    Merged { polygon: Polygon },
}

/// Sole authority over the polygon collection and the selection.
///
/// Every collection change rewrites the cache snapshot. Cache write failures
/// are logged and never undo the in-memory change.
#[derive(Debug)]
pub struct PolygonStore<C> {
    polygons: Vec<Polygon>,
    selection: Selection,
    cache: C,
}

impl<C: CatalogStore> PolygonStore<C> {
    pub fn new(cache: C) -> Self {
        Self {
            polygons: Vec::new(),
            selection: Selection::new(),
            cache,
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Insertion order.
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn get(&self, id: &PolygonId) -> Option<&Polygon> {
        self.polygons.iter().find(|p| &p.id == id)
    }

    pub fn selected_id(&self) -> Option<&PolygonId> {
        self.selection.get()
    }

    pub fn selected(&self) -> Option<&Polygon> {
        self.selection.get().and_then(|id| self.get(id))
    }

    pub fn create(&mut self, draft: PolygonDraft) -> Result<Polygon, StoreError> {
        let coordinates = validated_ring(draft.coordinates)?;
        let name = match draft.name {
            Some(name) => validated_name(&name)?,
            None => default_field_name(),
        };

        let polygon = Polygon {
            id: PolygonId::new_pending(),
            name,
            crop: normalized_crop(draft.crop),
            coordinates,
            color: random_hue(),
            revision: 0,
        };
        tracing::debug!(id = %polygon.id, vertices = polygon.vertex_count(), "polygon created");
        self.polygons.push(polygon.clone());
        self.persist();
        Ok(polygon)
    }

    pub fn update(&mut self, id: &PolygonId, patch: PolygonPatch) -> Result<UpdateOutcome, StoreError> {
        let idx = self.index_of(id)?;

        // Validate everything before touching the record.
        let name = patch.name.as_deref().map(validated_name).transpose()?;
        let coordinates = patch.coordinates.map(validated_ring).transpose()?;
        let crop = patch.crop.map(normalized_crop);

        let polygon = &mut self.polygons[idx];
        let mut remote_changed = false;
        let mut changed = false;

        if let Some(name) = name {
            if polygon.name != name {
                polygon.name = name;
                remote_changed = true;
            }
        }
        if let Some(crop) = crop {
            if polygon.crop != crop {
                polygon.crop = crop;
                remote_changed = true;
            }
        }
        if let Some(coordinates) = coordinates {
            if polygon.coordinates != coordinates {
                polygon.coordinates = coordinates;
                remote_changed = true;
            }
        }
        if let Some(color) = patch.color {
            if polygon.color != color {
                polygon.color = color;
                changed = true;
            }
        }

        if remote_changed || changed {
            polygon.revision += 1;
        }
        let polygon = polygon.clone();
        if remote_changed || changed {
            self.persist();
        }
        Ok(UpdateOutcome {
            polygon,
            remote_changed,
        })
    }

    pub fn remove(&mut self, id: &PolygonId) -> Result<Removal, StoreError> {
        let idx = self.index_of(id)?;
        let polygon = self.polygons.remove(idx);
        let was_selected = self.selection.clear_if(id);
        tracing::debug!(id = %polygon.id, was_selected, "polygon removed");
        self.persist();
        Ok(Removal {
            polygon,
            was_selected,
        })
    }

    /// Empties the collection and the cache. Returns how many were removed.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.polygons.len();
        self.polygons.clear();
        self.selection.clear();
        if let Err(e) = self.cache.clear() {
            tracing::warn!("failed to clear polygon cache: {e}");
        }
        removed
    }

    /// Returns the previous selection.
    pub fn select(&mut self, id: Option<&PolygonId>) -> Result<Option<PolygonId>, StoreError> {
        if let Some(id) = id {
            self.index_of(id)?;
        }
        Ok(self.selection.set(id.cloned()))
    }

    pub fn confirm(&mut self, temp: &PolygonId, server_id: &str, sent_revision: u64) -> Reconciliation {
        let confirmed = PolygonId::confirmed(server_id);

        if let Some(existing) = self.get(&confirmed).cloned() {
            if let Some(idx) = self.polygons.iter().position(|p| &p.id == temp) {
                self.polygons.remove(idx);
                self.selection.rename(temp, &confirmed);
                self.persist();
            }
            tracing::debug!(%temp, server_id, "pending polygon merged into existing record");
            return Reconciliation::Merged { polygon: existing };
        }

        let Some(polygon) = self.polygons.iter_mut().find(|p| &p.id == temp) else {
            tracing::debug!(%temp, server_id, "pending polygon deleted before confirmation");
            return Reconciliation::Orphaned {
                server_id: server_id.to_string(),
            };
        };

        polygon.id = confirmed.clone();
        let resend = polygon.revision != sent_revision;
        let polygon = polygon.clone();
        self.selection.rename(temp, &confirmed);
        self.persist();
        Reconciliation::Confirmed { polygon, resend }
    }

    /// Installs a fetched collection. Records with fewer than three vertices
    /// are dropped; the selection is cleared.
    pub fn replace_all(&mut self, polygons: Vec<Polygon>) -> usize {
        self.polygons = polygons
            .into_iter()
            .filter(|p| p.vertex_count() >= MIN_VERTICES)
            .collect();
        self.selection.clear();
        self.persist();
        self.polygons.len()
    }

    /// Startup read of the cache snapshot.
    ///
    /// Returns the number of polygons loaded, or `None` when the cache is
    /// absent, holds no polygons, or is unusable. An unusable snapshot is
    /// removed.
    pub fn load_from_cache(&mut self) -> Result<Option<usize>, StoreError> {
        let loaded = match load_typed::<Vec<Polygon>, _>(&self.cache) {
            Ok(loaded) => loaded,
            Err(CatalogError::Corrupt(msg)) => {
                tracing::warn!("discarding corrupt polygon cache: {msg}");
                self.cache.clear()?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(polygons) = loaded.filter(|p: &Vec<Polygon>| !p.is_empty()) else {
            return Ok(None);
        };
        if polygons.iter().any(|p| p.vertex_count() < MIN_VERTICES) {
            tracing::warn!("discarding polygon cache with degenerate rings");
            self.cache.clear()?;
            return Ok(None);
        }

        self.polygons = polygons;
        self.selection.clear();
        Ok(Some(self.polygons.len()))
    }

    /// Local-only crop reset. Returns how many polygons had a crop.
    pub fn clear_all_crops(&mut self) -> usize {
        let mut cleared = 0;
        for p in self.polygons.iter_mut().filter(|p| p.crop.is_some()) {
            p.crop = None;
            cleared += 1;
        }
        if cleared > 0 {
            self.persist();
        }
        cleared
    }

    /// Total geodesic area per crop string, ordered by crop. Polygons without
    /// a crop are left out.
    pub fn crop_area_summary(&self) -> Vec<(String, f64)> {
        let mut acc: BTreeMap<&str, f64> = BTreeMap::new();
        for p in &self.polygons {
            if let Some(crop) = p.crop.as_deref() {
                *acc.entry(crop).or_default() += p.area_m2();
            }
        }
        acc.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    pub fn total_area_m2(&self) -> f64 {
        self.polygons.iter().map(Polygon::area_m2).sum()
    }

    fn index_of(&self, id: &PolygonId) -> Result<usize, StoreError> {
        self.polygons
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn persist(&mut self) {
        if let Err(e) = save_typed(&mut self.cache, &self.polygons) {
            tracing::warn!("failed to write polygon cache: {e}");
        }
    }
}

fn validated_name(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation("polygon name must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

fn validated_ring(mut ring: Ring) -> Result<Ring, StoreError> {
    close_ring(&mut ring);
    let distinct = open_vertices(&ring).len();
    if distinct < MIN_VERTICES {
        return Err(StoreError::Validation(format!(
            "a polygon needs at least {MIN_VERTICES} points, got {distinct}"
        )));
    }
    Ok(ring)
}

fn normalized_crop(crop: Option<String>) -> Option<String> {
    crop.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
}
