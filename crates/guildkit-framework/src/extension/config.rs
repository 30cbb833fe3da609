//! Typed per-extension configuration blobs.
//!
//! Each extension owns one JSON file, `<dir>/<name>.json`.  The blob is
//! decoded once, on first load, into the extension's own type and cached as
//! an `Arc<T>`.  Later lookups are a map read plus a downcast.
//!
//! The store provides no per-extension locking.  An extension that mutates
//! its configuration from concurrent handlers wraps the mutable parts itself.

use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::store::write_atomically;

type Blob = Arc<dyn Any + Send + Sync>;

/// Loads and saves typed configuration keyed by extension name.
#[derive(Debug)]
pub struct ExtensionConfigStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Blob>>,
}

impl ExtensionConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing the blob for `extension`.
    pub fn path_for(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{extension}.json"))
    }

    /// Returns the configuration for `extension`, decoding it on first use.
    ///
    /// A missing file yields `T::default()`.  A malformed file is an error,
    /// as is asking for a different `T` than the first caller did.
    pub fn load<T>(&self, extension: &str) -> StoreResult<Arc<T>>
    where
        T: DeserializeOwned + Default + Send + Sync + 'static,
    {
        if let Some(blob) = self.cache.read().get(extension) {
            return downcast(extension, Arc::clone(blob));
        }

        let path = self.path_for(extension);
        let value: T = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(extension, path = %path.display(), "No configuration file, using defaults");
                T::default()
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        // A concurrent first load may have won; keep whichever landed first.
        let blob = Arc::clone(
            self.cache
                .write()
                .entry(extension.to_string())
                .or_insert_with(|| Arc::new(value)),
        );
        downcast(extension, blob)
    }

    /// Returns the cached configuration without touching the disk.
    pub fn get<T: Send + Sync + 'static>(&self, extension: &str) -> Option<Arc<T>> {
        let blob = self.cache.read().get(extension).cloned()?;
        blob.downcast().ok()
    }

    /// Writes `value` to the extension's file and replaces the cached copy.
    pub async fn save<T>(&self, extension: &str, value: T) -> StoreResult<Arc<T>>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let bytes = serde_json::to_vec_pretty(&value)?;
        let path = self.path_for(extension);
        write_atomically(&path, &bytes).await?;

        let value = Arc::new(value);
        self.cache
            .write()
            .insert(extension.to_string(), Arc::clone(&value) as Blob);
        info!(extension, path = %path.display(), "Extension configuration saved");
        Ok(value)
    }

    /// Drops every cached blob.  The next load re-reads from disk.
    pub fn clear(&self) {
        self.cache.write().clear();
    }
}

fn downcast<T: Send + Sync + 'static>(extension: &str, blob: Blob) -> StoreResult<Arc<T>> {
    blob.downcast().map_err(|_| StoreError::TypeMismatch {
        extension: extension.to_string(),
    })
}
