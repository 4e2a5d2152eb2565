use serde::Serialize;
use serde::de::DeserializeOwned;

/// Storage key the polygon snapshot lives under.
pub const DEFAULT_SNAPSHOT_KEY: &str = "savedPolygons";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    StorageUnavailable,
    Corrupt(String),
    Io(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::StorageUnavailable => write!(f, "browser storage unavailable"),
            CatalogError::Corrupt(msg) => write!(f, "cached snapshot corrupt: {msg}"),
            CatalogError::Io(msg) => write!(f, "cache storage error: {msg}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// A single-key snapshot mirror of the polygon collection.
///
/// Every collection change overwrites the whole snapshot; there are no
/// per-entry writes.
pub trait CatalogStore: Send {
    fn load_snapshot(&self) -> Result<Option<String>, CatalogError>;
    fn save_snapshot(&mut self, raw: &str) -> Result<(), CatalogError>;
    fn clear(&mut self) -> Result<(), CatalogError>;
}

/// Read and deserialize the snapshot. Blank values count as absent.
pub fn load_typed<T, S>(store: &S) -> Result<Option<T>, CatalogError>
where
    T: DeserializeOwned,
    S: CatalogStore + ?Sized,
{
    let Some(raw) = store.load_snapshot()? else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| CatalogError::Corrupt(e.to_string()))
}

pub fn save_typed<T, S>(store: &mut S, value: &T) -> Result<(), CatalogError>
where
    T: Serialize + ?Sized,
    S: CatalogStore + ?Sized,
{
    let raw = serde_json::to_string(value).map_err(|e| CatalogError::Io(e.to_string()))?;
    tracing::trace!(bytes = raw.len(), "writing cache snapshot");
    store.save_snapshot(&raw)
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalogStore {
    snapshot: Option<String>,
    writes: usize,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with raw contents, as if left behind by an earlier session.
    pub fn with_snapshot(raw: impl Into<String>) -> Self {
        Self {
            snapshot: Some(raw.into()),
            writes: 0,
        }
    }

    pub fn raw(&self) -> Option<&str> {
        self.snapshot.as_deref()
    }

    /// Number of snapshot writes and clears since creation.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn load_snapshot(&self) -> Result<Option<String>, CatalogError> {
        Ok(self.snapshot.clone())
    }

    fn save_snapshot(&mut self, raw: &str) -> Result<(), CatalogError> {
        self.snapshot = Some(raw.to_string());
        self.writes += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CatalogError> {
        self.snapshot = None;
        self.writes += 1;
        Ok(())
    }
}

impl<S: CatalogStore + ?Sized> CatalogStore for Box<S> {
    fn load_snapshot(&self) -> Result<Option<String>, CatalogError> {
        (**self).load_snapshot()
    }

    fn save_snapshot(&mut self, raw: &str) -> Result<(), CatalogError> {
        (**self).save_snapshot(raw)
    }

    fn clear(&mut self) -> Result<(), CatalogError> {
        (**self).clear()
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_storage {
    use super::{CatalogError, CatalogStore};

    #[derive(Debug)]
    pub struct LocalStorageCatalogStore {
        key: String,
    }

    impl LocalStorageCatalogStore {
        pub fn new(key: impl Into<String>) -> Result<Self, CatalogError> {
            // Fail early when storage is disabled (private mode, sandboxed iframes).
            window_local_storage()?;
            Ok(Self { key: key.into() })
        }

        pub fn key(&self) -> &str {
            &self.key
        }
    }

    impl CatalogStore for LocalStorageCatalogStore {
        fn load_snapshot(&self) -> Result<Option<String>, CatalogError> {
            window_local_storage()?
                .get_item(&self.key)
                .map_err(|e| CatalogError::Io(format!("get_item failed: {:?}", e)))
        }

        fn save_snapshot(&mut self, raw: &str) -> Result<(), CatalogError> {
            window_local_storage()?
                .set_item(&self.key, raw)
                .map_err(|e| CatalogError::Io(format!("set_item failed: {:?}", e)))
        }

        fn clear(&mut self) -> Result<(), CatalogError> {
            window_local_storage()?
                .remove_item(&self.key)
                .map_err(|e| CatalogError::Io(format!("remove_item failed: {:?}", e)))
        }
    }

    fn window_local_storage() -> Result<web_sys::Storage, CatalogError> {
        let win = web_sys::window().ok_or(CatalogError::StorageUnavailable)?;
        win.local_storage()
            .map_err(|e| CatalogError::Io(format!("localStorage error: {:?}", e)))?
            .ok_or(CatalogError::StorageUnavailable)
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_storage::LocalStorageCatalogStore;

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct LocalStorageCatalogStore;

#[cfg(not(target_arch = "wasm32"))]
impl LocalStorageCatalogStore {
    pub fn new(_key: impl Into<String>) -> Result<Self, CatalogError> {
        Err(CatalogError::StorageUnavailable)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl CatalogStore for LocalStorageCatalogStore {
    fn load_snapshot(&self) -> Result<Option<String>, CatalogError> {
        Err(CatalogError::StorageUnavailable)
    }

    fn save_snapshot(&mut self, _raw: &str) -> Result<(), CatalogError> {
        Err(CatalogError::StorageUnavailable)
    }

    fn clear(&mut self) -> Result<(), CatalogError> {
        Err(CatalogError::StorageUnavailable)
    }
}
