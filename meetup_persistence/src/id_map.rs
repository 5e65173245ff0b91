use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::ops::Index;

use itertools::Itertools;
use nohash_hasher::NoHashHasher;

use crate::EntityId;

/// Map from caller-assigned entity IDs to values
///
/// Unlike a slab, IDs are never handed out by the map itself, so gaps left by
/// removed items are never filled
#[derive(Debug, Clone)]
pub struct IdMap<V> {
    items: HashMap<EntityId, V, BuildHasherDefault<NoHashHasher<EntityId>>>,
}

#[derive(Debug)]
pub struct IdMapDuplicateError<V>(pub EntityId, pub V);

impl<V> IdMap<V> {
    /// Inserts a value under a vacant ID, handing the value back if the ID
    /// is taken
    pub fn insert_new(&mut self, id: EntityId, value: V) -> Result<(), IdMapDuplicateError<V>> {
        match self.items.entry(id) {
            Entry::Occupied(_) => Err(IdMapDuplicateError(id, value)),
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, id: EntityId) -> Option<V> {
        self.items.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&V> {
        self.items.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear()
    }

    /// IDs in ascending order
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.items.keys().copied().sorted()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.items.values()
    }

    /// Entries in ascending ID order
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &V)> {
        self.items
            .iter()
            .map(|(id, value)| (*id, value))
            .sorted_by_key(|(id, _)| *id)
    }
}

impl<V> Index<EntityId> for IdMap<V> {
    type Output = V;

    fn index(&self, index: EntityId) -> &Self::Output {
        &self.items[&index]
    }
}

impl<V> Default for IdMap<V> {
    fn default() -> Self {
        Self {
            items: Default::default(),
        }
    }
}
