//! File-backed item storage for the shoplist server.
//!
//! All items live in a single JSON array:
//! ```text
//! <DATA_DIR>/
//!   items.json
//! ```
//!
//! The array is loaded once on open and rewritten atomically after every
//! change. Items keep their insertion order.

use shoplist_core::{ItemId, RemoteItem};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const ITEMS_FILE: &str = "items.json";

/// Errors that can occur during server storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// Items file exists but is not a valid item array.
    ParseError(PathBuf, serde_json::Error),
    /// No item with this id.
    NotFound(ItemId),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            StorageError::ParseError(path, e) => {
                write!(f, "Failed to parse items file {}: {}", path.display(), e)
            }
            StorageError::NotFound(id) => write!(f, "Item not found: {}", id),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(_, e) => Some(e),
            StorageError::ParseError(_, e) => Some(e),
            StorageError::NotFound(_) => None,
        }
    }
}

/// Server-side storage for shopping list items.
#[derive(Debug)]
pub struct ItemStorage {
    path: PathBuf,
    items: Mutex<Vec<RemoteItem>>,
}

impl ItemStorage {
    /// Opens the storage in `data_dir`, creating the directory if needed.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .map_err(|e| StorageError::IoError(data_dir.to_path_buf(), e))?;

        let path = data_dir.join(ITEMS_FILE);
        let items = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::ParseError(path.clone(), e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StorageError::IoError(path, e)),
        };

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RemoteItem>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn list(&self) -> Vec<RemoteItem> {
        self.lock().clone()
    }

    pub fn get(&self, id: &ItemId) -> Option<RemoteItem> {
        self.lock().iter().find(|item| &item.id == id).cloned()
    }

    /// Inserts the item, or replaces the one with the same id in place.
    pub fn upsert(&self, item: RemoteItem) -> Result<RemoteItem, StorageError> {
        let mut items = self.lock();
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        self.persist(&items)?;
        Ok(item)
    }

    /// Replaces an existing item.
    pub fn update(&self, item: RemoteItem) -> Result<RemoteItem, StorageError> {
        let mut items = self.lock();
        let existing = items
            .iter_mut()
            .find(|existing| existing.id == item.id)
            .ok_or_else(|| StorageError::NotFound(item.id.clone()))?;
        *existing = item.clone();
        self.persist(&items)?;
        Ok(item)
    }

    pub fn delete(&self, id: &ItemId) -> Result<(), StorageError> {
        let mut items = self.lock();
        let index = items
            .iter()
            .position(|item| &item.id == id)
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;
        items.remove(index);
        self.persist(&items)
    }

    // Write atomically using temp file + rename
    fn persist(&self, items: &[RemoteItem]) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(items)
            .map_err(|e| StorageError::ParseError(self.path.clone(), e))?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = File::create(&temp_path)
            .map_err(|e| StorageError::IoError(temp_path.clone(), e))?;
        file.write_all(&bytes)
            .map_err(|e| StorageError::IoError(temp_path.clone(), e))?;
        file.sync_all()
            .map_err(|e| StorageError::IoError(temp_path.clone(), e))?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| StorageError::IoError(self.path.clone(), e))
    }
}
