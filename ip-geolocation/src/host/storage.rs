//! Flat key/value storage for device settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use super::error::StorageError;

/// Persistent key/value storage scoped to a single device.
///
/// Values are plain strings with no schema. Readers are expected to parse
/// what they need and fall back to a default when a value doesn't parse.
pub trait Storage: Send + Sync {
    /// Read a value, `None` if the key was never written.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory storage, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        let guard = self.items.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.items.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage persisted as one JSON object on disk.
///
/// The whole map is loaded on open and rewritten on every `set_item`, so
/// the file is always authoritative. A failed write leaves the in-memory
/// map unchanged.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: RwLock<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open storage backed by `path`.
    ///
    /// A missing file opens empty; it is created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let items = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| StorageError::Malformed {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        Ok(Self {
            path,
            items: RwLock::new(items),
        })
    }

    /// Get the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        // Create parent directories if needed
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(items).map_err(|e| StorageError::Malformed {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        std::fs::write(&self.path, json).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        let guard = self.items.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let previous = guard.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist(&guard) {
            match previous {
                Some(previous) => guard.insert(key.to_string(), previous),
                None => guard.remove(key),
            };
            return Err(e);
        }

        Ok(())
    }
}
