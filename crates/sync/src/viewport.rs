use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const KEY_LNG: &str = "map.lng";
pub const KEY_LAT: &str = "map.lat";
pub const KEY_ZOOM: &str = "map.zoom";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("browser storage unavailable")]
    Unavailable,
    #[error("storage error: {0}")]
    Io(String),
}

/// String key/value storage that survives reloads.
pub trait ViewportStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub lng: f64,
    pub lat: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            lng: -74.5,
            lat: 40.0,
            zoom: 9.0,
        }
    }
}

impl Viewport {
    /// Reads the stored viewport. Each component falls back to `fallback`
    /// on its own when missing, unparsable or unreadable.
    pub fn restore(store: &dyn ViewportStore, fallback: Viewport) -> Viewport {
        let read = |key: &str, default: f64| -> f64 {
            match store.get(key) {
                Ok(Some(raw)) => match raw.trim().parse::<f64>() {
                    Ok(v) if v.is_finite() => v,
                    _ => {
                        warn!(key, raw = %raw, "ignoring unparsable stored viewport value");
                        default
                    }
                },
                Ok(None) => default,
                Err(err) => {
                    warn!(key, %err, "viewport storage read failed");
                    default
                }
            }
        };
        Viewport {
            lng: read(KEY_LNG, fallback.lng),
            lat: read(KEY_LAT, fallback.lat),
            zoom: read(KEY_ZOOM, fallback.zoom),
        }
    }

    /// Writes all three components with four decimals.
    pub fn persist(&self, store: &mut dyn ViewportStore) -> Result<(), StorageError> {
        store.set(KEY_LNG, &format!("{:.4}", self.lng))?;
        store.set(KEY_LAT, &format!("{:.4}", self.lat))?;
        store.set(KEY_ZOOM, &format!("{:.4}", self.zoom))
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryViewportStore {
    entries: BTreeMap<String, String>,
}

impl InMemoryViewportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewportStore for InMemoryViewportStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_storage {
    use super::{StorageError, ViewportStore};

    /// `window.localStorage`, looked up on every access.
    #[derive(Debug, Default)]
    pub struct LocalStorageViewportStore;

    impl LocalStorageViewportStore {
        pub fn new() -> Result<Self, StorageError> {
            window_local_storage()?;
            Ok(Self)
        }
    }

    impl ViewportStore for LocalStorageViewportStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            window_local_storage()?
                .get_item(key)
                .map_err(|e| StorageError::Io(format!("localStorage error: {e:?}")))
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            window_local_storage()?
                .set_item(key, value)
                .map_err(|e| StorageError::Io(format!("localStorage error: {e:?}")))
        }
    }

    fn window_local_storage() -> Result<web_sys::Storage, StorageError> {
        let win = web_sys::window().ok_or(StorageError::Unavailable)?;
        win.local_storage()
            .map_err(|e| StorageError::Io(format!("localStorage error: {e:?}")))?
            .ok_or(StorageError::Unavailable)
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_storage::LocalStorageViewportStore;

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct LocalStorageViewportStore;

#[cfg(not(target_arch = "wasm32"))]
impl LocalStorageViewportStore {
    pub fn new() -> Result<Self, StorageError> {
        Err(StorageError::Unavailable)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ViewportStore for LocalStorageViewportStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }
}
