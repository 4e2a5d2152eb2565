use std::collections::BTreeMap;

use bytes::Bytes;

use crate::request::Request;
use crate::residency::ResidencyState;

/// What a raster was fetched for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RasterKey {
    pub polygon_id: String,
    pub layer_id: String,
}

impl RasterKey {
    pub fn new(polygon_id: impl Into<String>, layer_id: impl Into<String>) -> Self {
        Self {
            polygon_id: polygon_id.into(),
            layer_id: layer_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    UnknownRequest(Request),
    AlreadyReleased(Request),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::UnknownRequest(r) => write!(f, "unknown raster request {r}"),
            CacheError::AlreadyReleased(r) => write!(f, "raster {r} already released"),
        }
    }
}

impl std::error::Error for CacheError {}

#[derive(Debug, Clone)]
struct RasterEntry {
    key: RasterKey,
    state: ResidencyState,
    bytes: Option<Bytes>,
}

/// Bookkeeping for raster handles handed to the map.
///
/// Every image the fetcher produces gets a handle here and must be released
/// exactly once: when replaced, cleared, dropped as stale, or on shutdown.
/// Only live handles are stored; releasing one forgets it.
#[derive(Debug, Default)]
pub struct RasterCache {
    next_request: u64,
    entries: BTreeMap<Request, RasterEntry>,
    used_bytes: usize,
}

impl RasterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, key: RasterKey) -> Request {
        self.next_request += 1;
        let req = Request(self.next_request);
        self.entries.insert(
            req,
            RasterEntry {
                key,
                state: ResidencyState::Requested,
                bytes: None,
            },
        );
        req
    }

    pub fn mark_resident(&mut self, req: Request, bytes: Bytes) -> Result<(), CacheError> {
        let Some(entry) = self.entries.get_mut(&req) else {
            return Err(if req.0 <= self.next_request {
                CacheError::AlreadyReleased(req)
            } else {
                CacheError::UnknownRequest(req)
            });
        };
        if let Some(old) = entry.bytes.replace(bytes) {
            self.used_bytes -= old.len();
        }
        self.used_bytes += entry.bytes.as_ref().map_or(0, Bytes::len);
        entry.state = ResidencyState::Resident;
        Ok(())
    }

    /// Returns `true` if the handle was live.
    pub fn release(&mut self, req: Request) -> bool {
        let Some(entry) = self.entries.remove(&req) else {
            return false;
        };
        if let Some(old) = entry.bytes {
            self.used_bytes -= old.len();
        }
        tracing::trace!(%req, polygon = %entry.key.polygon_id, "raster released");
        true
    }

    /// Releases every live handle; returns how many were live.
    pub fn release_all(&mut self) -> usize {
        let released = self.entries.len();
        self.entries.clear();
        self.used_bytes = 0;
        released
    }

    pub fn state(&self, req: Request) -> Option<ResidencyState> {
        self.entries.get(&req).map(|e| e.state)
    }

    pub fn key(&self, req: Request) -> Option<&RasterKey> {
        self.entries.get(&req).map(|e| &e.key)
    }

    pub fn bytes(&self, req: Request) -> Option<&Bytes> {
        self.entries.get(&req).and_then(|e| e.bytes.as_ref())
    }

    /// Handles that are requested or resident.
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }
}
