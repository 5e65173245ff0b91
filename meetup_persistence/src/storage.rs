use std::fmt::{Debug, Display, Formatter};

use crate::error::PersistenceError;
use crate::EntityId;

pub use file::JsonFileStorage;
pub use memory::InMemoryStorage;

pub mod file;
pub mod memory;

/// Key-value store shaped after the browser's `localStorage`
///
/// All registries share one adapter and are told apart only by key prefix
pub trait StorageAdapter: Debug {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&mut self, key: &str, value: String) -> Result<(), PersistenceError>;

    /// Removing an absent key is not an error
    fn remove_item(&mut self, key: &str) -> Result<(), PersistenceError>;

    fn len(&self) -> usize;

    fn key(&self, index: usize) -> Option<String>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn keys(&self) -> Vec<String> {
        (0..self.len()).filter_map(|i| self.key(i)).collect()
    }
}

impl<S: StorageAdapter + ?Sized> StorageAdapter for Box<S> {
    fn get_item(&self, key: &str) -> Option<String> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<(), PersistenceError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), PersistenceError> {
        (**self).remove_item(key)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn key(&self, index: usize) -> Option<String> {
        (**self).key(index)
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }
}

/// Parsed form of `<prefix><ClassName>.<id>`
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct StorageKey {
    pub class_name: String,
    pub id: EntityId,
}

impl StorageKey {
    pub fn new(class_name: impl Into<String>, id: EntityId) -> Self {
        Self {
            class_name: class_name.into(),
            id,
        }
    }

    pub fn format(&self, prefix: &str) -> String {
        format!("{prefix}{self}")
    }

    /// Returns None for keys outside the prefix or not ending in an integer id
    /// written the way [StorageKey::format] writes it, so `Event.007` is not
    /// an alias of `Event.7`
    pub fn parse(prefix: &str, key: &str) -> Option<Self> {
        let rest = key.strip_prefix(prefix)?;
        let (class_name, id) = rest.rsplit_once('.')?;
        if class_name.is_empty() || id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let raw: u64 = id.parse().ok()?;
        if raw.to_string() != id {
            return None;
        }
        Some(Self::new(class_name, EntityId::new(raw)))
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.class_name, self.id)
    }
}
