use std::collections::BTreeMap;

use crate::error::PersistenceError;
use crate::storage::StorageAdapter;

/// Process-local storage, forgotten when dropped
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    items: BTreeMap<String, String>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageAdapter for InMemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.items.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.items.remove(key);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumeration_covers_every_key() {
        let mut storage = InMemoryStorage::new();
        storage.set_item("b", "2".to_string()).unwrap();
        storage.set_item("a", "1".to_string()).unwrap();

        assert_eq!(storage.len(), 2);
        assert_eq!(storage.key(0).as_deref(), Some("a"));
        assert_eq!(storage.key(2), None);
        assert_eq!(storage.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn removing_absent_key_is_tolerated() {
        let mut storage = InMemoryStorage::new();
        storage.remove_item("missing").unwrap();
        assert!(storage.is_empty());
    }
}
