use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub use entity::Entity;
pub use error::PersistenceError;
pub use id_map::{IdMap, IdMapDuplicateError};
pub use preferences::Preferences;
pub use reference::{Placeholder, Reference};
pub use registry::{Registry, RegistryHolder, RegistryRecord, StorageContext};
pub use storage::{InMemoryStorage, JsonFileStorage, StorageAdapter, StorageKey};

pub mod entity;
pub mod error;
pub mod id_map;
pub mod preferences;
pub mod reference;
pub mod registry;
pub mod storage;

#[cfg(test)]
mod test;

/// Live instance of an entity, shared between its registry and every entity
/// referencing it
pub type Live<T> = Rc<RefCell<T>>;

pub type ClassName = &'static str;

/// Identity of an entity within its class
///
/// Issued once by the owning [Registry] and never reused, even after the
/// entity is removed
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl nohash_hasher::IsEnabled for EntityId {}

pub fn live<T>(value: T) -> Live<T> {
    Rc::new(RefCell::new(value))
}
