use serde::{Deserialize, Serialize};

const TEMP_PREFIX: &str = "temp-";

/// Two-phase polygon identity.
///
/// A polygon is `Pending` from the moment it is drawn until the remote store
/// acknowledges it, at which point the entity store swaps the id in place for
/// the server-assigned `Confirmed` one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum PolygonId {
    Pending(String),
    Confirmed(String),
}

impl PolygonId {
    /// Fresh temporary token, never equal to any server id.
    pub fn new_pending() -> Self {
        PolygonId::Pending(format!("{TEMP_PREFIX}{}", uuid::Uuid::new_v4().simple()))
    }

    /// Server ids are the string form of the backend's numeric identity.
    pub fn confirmed(server_id: impl Into<String>) -> Self {
        PolygonId::Confirmed(server_id.into())
    }

    /// Classify a raw id string, e.g. one read from an older cache snapshot.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with(TEMP_PREFIX) {
            PolygonId::Pending(raw.to_string())
        } else {
            PolygonId::Confirmed(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PolygonId::Pending(s) | PolygonId::Confirmed(s) => s,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PolygonId::Pending(_))
    }

    /// Server id, if the polygon has been persisted.
    pub fn server_id(&self) -> Option<&str> {
        match self {
            PolygonId::Confirmed(s) => Some(s),
            PolygonId::Pending(_) => None,
        }
    }
}

impl std::fmt::Display for PolygonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
