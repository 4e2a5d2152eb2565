use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;
use runtime::BoxFuture;
use scene::Polygon;

use crate::error::RemoteError;
use crate::remote::{PolygonRemote, require_server_id};
use crate::wire::{FetchReport, PolygonBody};

/// A call observed by [`MemoryPolygonRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Create { name: String },
    Update { server_id: String },
    Delete { server_id: String },
    DeleteAll,
    FetchAll,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    records: BTreeMap<u64, PolygonBody>,
    calls: Vec<RemoteCall>,
    failures: VecDeque<RemoteError>,
}

/// In-process polygon backend with numeric ids.
///
/// Bodies go through the same validation as the HTTP client, so geometry
/// errors surface identically.
#[derive(Debug, Default)]
pub struct MemoryPolygonRemote {
    state: Mutex<MemoryState>,
}

impl MemoryPolygonRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed stored records; ids are assigned from 1 in slice order.
    pub fn with_polygons(polygons: &[Polygon]) -> Self {
        let remote = Self::new();
        {
            let mut state = remote.state.lock();
            for p in polygons {
                if let Ok(body) = PolygonBody::from_polygon(p) {
                    state.next_id += 1;
                    let id = state.next_id;
                    state.records.insert(id, body);
                }
            }
        }
        remote
    }

    /// Make the next call fail with `error`. Queued failures apply in order.
    pub fn fail_next(&self, error: RemoteError) {
        self.state.lock().failures.push_back(error);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    pub fn stored_ids(&self) -> Vec<String> {
        self.state.lock().records.keys().map(u64::to_string).collect()
    }

    pub fn stored(&self, server_id: &str) -> Option<PolygonBody> {
        let id = server_id.parse::<u64>().ok()?;
        self.state.lock().records.get(&id).cloned()
    }

    fn begin(&self, call: RemoteCall) -> Result<parking_lot::MutexGuard<'_, MemoryState>, RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

fn parse_id(server_id: &str) -> Result<u64, RemoteError> {
    server_id.parse().map_err(|_| RemoteError::Request {
        status: 404,
        message: format!("polygon {server_id} not found"),
    })
}

impl PolygonRemote for MemoryPolygonRemote {
    fn create_remote<'a>(&'a self, polygon: &'a Polygon) -> BoxFuture<'a, Result<String, RemoteError>> {
        Box::pin(async move {
            let body = PolygonBody::from_polygon(polygon)?;
            let mut state = self.begin(RemoteCall::Create {
                name: body.name.clone(),
            })?;
            state.next_id += 1;
            let id = state.next_id;
            state.records.insert(id, body);
            Ok(id.to_string())
        })
    }

    fn update_remote<'a>(&'a self, polygon: &'a Polygon) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(async move {
            let server_id = require_server_id(polygon)?;
            let body = PolygonBody::from_polygon(polygon)?;
            let id = parse_id(server_id)?;
            let mut state = self.begin(RemoteCall::Update {
                server_id: server_id.to_string(),
            })?;
            match state.records.get_mut(&id) {
                Some(slot) => {
                    *slot = body;
                    Ok(())
                }
                None => Err(RemoteError::Request {
                    status: 404,
                    message: format!("polygon {server_id} not found"),
                }),
            }
        })
    }

    fn delete_remote<'a>(&'a self, server_id: &'a str) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(async move {
            let id = parse_id(server_id)?;
            let mut state = self.begin(RemoteCall::Delete {
                server_id: server_id.to_string(),
            })?;
            state.records.remove(&id).map(|_| ()).ok_or_else(|| RemoteError::Request {
                status: 404,
                message: format!("polygon {server_id} not found"),
            })
        })
    }

    fn delete_all_remote(&self) -> BoxFuture<'_, Result<(), RemoteError>> {
        Box::pin(async move {
            let mut state = self.begin(RemoteCall::DeleteAll)?;
            state.records.clear();
            Ok(())
        })
    }

    fn fetch_all(&self) -> BoxFuture<'_, Result<FetchReport, RemoteError>> {
        Box::pin(async move {
            let state = self.begin(RemoteCall::FetchAll)?;
            let mut report = FetchReport::default();
            for (id, body) in &state.records {
                let record = crate::wire::RemotePolygon {
                    id: serde_json::Value::from(*id),
                    name: Some(body.name.clone()),
                    crop: body.crop.clone(),
                    geo_json: Some(body.geo_json.clone()),
                };
                match record.into_polygon() {
                    Some(p) => report.polygons.push(p),
                    None => report.discarded += 1,
                }
            }
            Ok(report)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation::{LatLng, PolygonId};
    use pretty_assertions::assert_eq;

    fn polygon(id: PolygonId, name: &str) -> Polygon {
        Polygon {
            id,
            name: name.into(),
            crop: Some("Wheat".into()),
            coordinates: vec![
                LatLng::new(0.0, 0.0),
                LatLng::new(0.0, 1.0),
                LatLng::new(1.0, 1.0),
                LatLng::new(0.0, 0.0),
            ],
            color: 0,
            revision: 0,
        }
    }

    #[tokio::test]
    async fn create_update_delete_cycle() {
        let remote = MemoryPolygonRemote::new();
        let id = remote
            .create_remote(&polygon(PolygonId::new_pending(), "A"))
            .await
            .unwrap();
        assert_eq!(id, "1");

        remote
            .update_remote(&polygon(PolygonId::confirmed(id.clone()), "B"))
            .await
            .unwrap();
        assert_eq!(remote.stored(&id).unwrap().name, "B");

        remote.delete_remote(&id).await.unwrap();
        assert!(remote.stored_ids().is_empty());
        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::Create { name: "A".into() },
                RemoteCall::Update { server_id: "1".into() },
                RemoteCall::Delete { server_id: "1".into() },
            ]
        );
    }

    #[tokio::test]
    async fn invalid_geometry_never_reaches_the_backend() {
        let remote = MemoryPolygonRemote::new();
        let mut p = polygon(PolygonId::new_pending(), "A");
        p.coordinates.truncate(2);
        assert_eq!(remote.create_remote(&p).await, Err(RemoteError::InvalidGeometry));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn queued_failures_are_consumed_in_order() {
        let remote = MemoryPolygonRemote::with_polygons(&[polygon(PolygonId::confirmed("x"), "A")]);
        remote.fail_next(RemoteError::Network("down".into()));

        assert_eq!(remote.delete_all_remote().await, Err(RemoteError::Network("down".into())));
        assert_eq!(remote.stored_ids(), vec!["1".to_string()]);

        let report = remote.fetch_all().await.unwrap();
        assert_eq!(report.polygons.len(), 1);
        assert_eq!(report.polygons[0].id, PolygonId::confirmed("1"));
        assert_eq!(report.polygons[0].crop.as_deref(), Some("Wheat"));
    }

    #[tokio::test]
    async fn deleting_unknown_id_is_not_found() {
        let remote = MemoryPolygonRemote::new();
        assert!(matches!(
            remote.delete_remote("99").await,
            Err(RemoteError::Request { status: 404, .. })
        ));
    }
}
