//! Request and response shapes of the polygon API.

use foundation::{PolygonId, random_hue};
use formats::{from_storage_geometry, to_storage_geometry};
use scene::Polygon;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteError;

/// Body of `POST /api/polygons` and `PUT /api/polygons/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolygonBody {
    pub name: String,
    pub crop: Option<String>,
    /// Geometry as a JSON string, not an embedded object.
    #[serde(rename = "geoJson")]
    pub geo_json: String,
}

impl PolygonBody {
    /// Fails with `InvalidGeometry` when the ring does not survive cleaning.
    pub fn from_polygon(polygon: &Polygon) -> Result<Self, RemoteError> {
        let geometry =
            to_storage_geometry(&polygon.coordinates).ok_or(RemoteError::InvalidGeometry)?;
        let name = polygon.name.trim();
        if name.is_empty() {
            return Err(RemoteError::Validation("polygon name must not be empty".into()));
        }
        Ok(Self {
            name: name.to_string(),
            crop: polygon.crop.clone().filter(|c| !c.trim().is_empty()),
            geo_json: geometry.to_json_string(),
        })
    }
}

/// One record of `GET /api/polygons/my`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePolygon {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default, rename = "geoJson")]
    pub geo_json: Option<String>,
}

impl RemotePolygon {
    /// Map the record onto an entity, or `None` when its geometry is unusable.
    pub fn into_polygon(self) -> Option<Polygon> {
        let id = id_string(&self.id)?;
        let coordinates = from_storage_geometry(self.geo_json.as_deref()?)?;
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Loaded polygon {id}"));
        Some(Polygon {
            id: PolygonId::confirmed(id),
            name,
            crop: self.crop.filter(|c| !c.is_empty()),
            coordinates,
            color: random_hue(),
            revision: 0,
        })
    }
}

/// Result of a full fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    pub polygons: Vec<Polygon>,
    /// Records dropped for missing ids or undecodable geometry.
    pub discarded: usize,
}

/// Decode the `/api/polygons/my` payload, keeping what decodes.
pub fn decode_polygon_list(body: &str) -> Result<FetchReport, RemoteError> {
    let records: Vec<Value> =
        serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))?;

    let mut report = FetchReport::default();
    for raw in records {
        let decoded = serde_json::from_value::<RemotePolygon>(raw)
            .ok()
            .and_then(RemotePolygon::into_polygon);
        match decoded {
            Some(p) => report.polygons.push(p),
            None => report.discarded += 1,
        }
    }
    if report.discarded > 0 {
        tracing::warn!(discarded = report.discarded, "skipped undecodable polygon records");
    }
    Ok(report)
}

fn id_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Server id from a create response: `{"id": 7}`, `{"id": "7"}` or bare `7`.
pub fn parse_created_id(body: &str) -> Result<String, RemoteError> {
    let trimmed = body.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map
            .get("id")
            .and_then(id_string)
            .ok_or_else(|| RemoteError::Decode("create response has no id".into())),
        Ok(other) => {
            id_string(&other).ok_or_else(|| RemoteError::Decode(format!("bad id: {trimmed}")))
        }
        Err(_) if !trimmed.is_empty() => Ok(trimmed.trim_matches('"').to_string()),
        Err(_) => Err(RemoteError::Decode("empty create response".into())),
    }
}

/// Human-readable failure reason: JSON `message`, then `error`, then the raw
/// body, then the status line.
pub fn extract_error_message(status_text: &str, body: &str) -> String {
    error_message_from(status_text, body, &["message", "error"])
}

/// Like [`extract_error_message`] with an explicit field precedence.
pub fn error_message_from(status_text: &str, body: &str, fields: &[&str]) -> String {
    let trimmed = body.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        let found = fields
            .iter()
            .filter_map(|field| map.get(*field).and_then(Value::as_str))
            .find(|msg| !msg.is_empty());
        return found.unwrap_or(status_text).to_string();
    }
    if trimmed.is_empty() {
        status_text.to_string()
    } else {
        trimmed.to_string()
    }
}
