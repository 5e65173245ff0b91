use std::collections::BTreeMap;
use std::io::ErrorKind;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::error::PersistenceError;
use crate::storage::StorageAdapter;

/// Storage persisted as a single JSON object on disk
///
/// Every mutation rewrites the whole file through a temporary sibling that is
/// then renamed over the original
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: Utf8PathBuf,
    items: BTreeMap<String, String>,
}

impl JsonFileStorage {
    /// Opens the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let items = match std::fs::read_to_string(&path) {
            Ok(source) => serde_json::from_str(&source)?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(%path, records = items.len(), "Opened storage file");
        Ok(Self { path, items })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&self.items)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StorageAdapter for JsonFileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.items.insert(key.to_string(), value);
        self.flush()
    }

    fn remove_item(&mut self, key: &str) -> Result<(), PersistenceError> {
        if self.items.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.items.keys().nth(index).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}
