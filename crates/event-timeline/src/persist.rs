//! Durable key-value storage backends.
//!
//! This module provides:
//! - [`DurableStore`] — Abstract trait for durable key-value stores
//! - [`MemoryStore`] — In-process store, useful for tests and embedding
//! - [`FileStore`] — One JSON file per key inside a base directory
//!
//! The [`Timeline`](crate::Timeline) writes the most recent window of entries
//! under a single key after each accepted mutation and reads it back on
//! startup. Stores are called from a blocking thread pool, so implementations
//! may perform synchronous I/O.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Result, TimelineError};

/// Trait for durable key-value stores.
pub trait DurableStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn write(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the key exists but cannot be removed.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Shared durable store handle.
pub type SharedStore = Arc<dyn DurableStore>;

/// In-memory [`DurableStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl DurableStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

/// File-backed [`DurableStore`].
///
/// Each key maps to `<base_dir>/<sanitized key>.json`. Writes go to a
/// temporary sibling first and are renamed into place, so readers never see
/// a torn file.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `base_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the file holding `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_dir.join(format!("{name}.json"))
    }
}

impl DurableStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TimelineError::Persistence(format!("read '{key}': {e}"))),
        }
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp)
            .map_err(|e| TimelineError::Persistence(format!("write '{key}': {e}")))?;
        file.write_all(value)
            .and_then(|()| file.sync_all())
            .map_err(|e| TimelineError::Persistence(format!("write '{key}': {e}")))?;
        fs::rename(&tmp, &path)
            .map_err(|e| TimelineError::Persistence(format!("write '{key}': {e}")))?;

        debug!(path = %path.display(), bytes = value.len(), "wrote durable value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TimelineError::Persistence(format!("remove '{key}': {e}"))),
        }
    }
}
