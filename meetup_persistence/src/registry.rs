use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::entity::Entity;
use crate::error::PersistenceError;
use crate::id_map::{IdMap, IdMapDuplicateError};
use crate::preferences::Preferences;
use crate::reference::Placeholder;
use crate::storage::{StorageAdapter, StorageKey};
use crate::{ClassName, EntityId, Live};

/// Class tag of registry records
pub const REGISTRY_CLASS_NAME: ClassName = "ObjectRegistry";

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(0);

/// Storage and preferences shared by every registry of an application
pub trait StorageContext {
    fn storage(&self) -> &RefCell<Box<dyn StorageAdapter>>;

    fn preferences(&self) -> Ref<'_, Preferences>;

    /// Whether records of `class_name` can be decoded by this context
    fn is_known_class(&self, class_name: &str) -> bool;

    fn storage_key(&self, class_name: &str, id: EntityId) -> String {
        StorageKey::new(class_name, id).format(&self.preferences().storage_prefix)
    }

    fn ensure_storage_allowed(&self) -> Result<(), PersistenceError> {
        if self.preferences().is_local_storage_allowed() {
            Ok(())
        } else {
            Err(PersistenceError::PermissionDenied)
        }
    }
}

pub trait RegistryHolder<T>: StorageContext {
    fn registry(&self) -> &Registry<T>;
}

/// In-memory catalogue of every live instance of one entity class
///
/// Issues IDs from a watermark that only ever grows: removed IDs are never
/// handed out again, and registering an entity with an explicit ID moves the
/// watermark past it
pub struct Registry<T> {
    id: EntityId,
    object_count: Cell<u64>,
    objects: RefCell<IdMap<Live<T>>>,
}

/// Stored form of a registry: placeholders only, object bodies live under
/// their own keys
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    #[serde(rename = "_className")]
    pub class_name: String,
    #[serde(rename = "_id")]
    pub id: EntityId,
    #[serde(rename = "_objectClassName")]
    pub object_class_name: String,
    #[serde(rename = "_objectCount")]
    pub object_count: u64,
    #[serde(rename = "_objectList")]
    pub object_list: BTreeMap<EntityId, Placeholder>,
}

impl<T: Entity> Registry<T> {
    pub fn new() -> Self {
        Self {
            id: EntityId::new(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed)),
            object_count: Cell::new(0),
            objects: Default::default(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn object_class_name(&self) -> ClassName {
        T::CLASS_NAME
    }

    /// Next ID to be issued
    pub fn object_count(&self) -> u64 {
        self.object_count.get()
    }

    /// Fails once the watermark has reached `u64::MAX`, since that ID may
    /// already be registered
    pub fn next_id(&self) -> Result<EntityId, PersistenceError> {
        let id = self.object_count.get();
        let next = id
            .checked_add(1)
            .ok_or(PersistenceError::IdSpaceExhausted {
                class: T::CLASS_NAME,
            })?;
        self.object_count.set(next);
        Ok(EntityId::new(id))
    }

    /// Registers an entity under its own ID
    ///
    /// Registering an ID twice is an error and leaves the registry unchanged
    pub fn add(&self, object: Live<T>) -> Result<(), PersistenceError> {
        let id = object.borrow().id();
        self.objects
            .borrow_mut()
            .insert_new(id, object)
            .map_err(|IdMapDuplicateError(id, _)| PersistenceError::DuplicateId {
                class: T::CLASS_NAME,
                id,
            })?;
        self.raise_watermark(id.raw().saturating_add(1));
        Ok(())
    }

    pub fn remove(&self, id: EntityId) -> Option<Live<T>> {
        self.objects.borrow_mut().remove(id)
    }

    pub fn get(&self, id: EntityId) -> Option<Live<T>> {
        self.objects.borrow().get(id).cloned()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.objects.borrow().contains(id)
    }

    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.borrow().is_empty()
    }

    /// Read-only view of the registered objects
    pub fn objects(&self) -> Ref<'_, IdMap<Live<T>>> {
        self.objects.borrow()
    }

    /// Handles to all registered objects, ordered by ID
    pub fn snapshot(&self) -> Vec<Live<T>> {
        self.objects
            .borrow()
            .iter()
            .map(|(_, object)| object.clone())
            .collect()
    }

    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<Live<T>> {
        self.snapshot()
            .into_iter()
            .find(|object| predicate(&object.borrow()))
    }

    /// First object, by ID, whose attribute `name` equals `value`
    ///
    /// `id` and `className` read the identity accessors, any other name reads
    /// the field of the object's JSON projection. Comparison is strict JSON
    /// equality, `1` does not match `"1"`
    pub fn find_by_attribute(
        &self,
        name: &str,
        value: &Value,
    ) -> Result<Option<Live<T>>, PersistenceError> {
        for object in self.snapshot() {
            let found = attribute(&*object.borrow(), name)?;
            if found.as_ref() == Some(value) {
                return Ok(Some(object));
            }
        }
        Ok(None)
    }

    /// Forgets all registered objects; the ID watermark is kept
    pub fn clear(&self) {
        self.objects.borrow_mut().clear()
    }

    pub fn to_record(&self) -> RegistryRecord {
        RegistryRecord {
            class_name: REGISTRY_CLASS_NAME.to_string(),
            id: self.id,
            object_class_name: T::CLASS_NAME.to_string(),
            object_count: self.object_count.get(),
            object_list: self
                .objects
                .borrow()
                .ids()
                .map(|id| (id, Placeholder::new(T::CLASS_NAME, id)))
                .collect(),
        }
    }

    /// Saves the registry record, then every registered object
    pub fn write_object(&self, ctx: &T::Context) -> Result<(), PersistenceError> {
        ctx.ensure_storage_allowed()?;
        let key = ctx.storage_key(REGISTRY_CLASS_NAME, self.id);
        let json = serde_json::to_string(&self.to_record())?;
        ctx.storage().borrow_mut().set_item(&key, json)?;
        debug!(key, "Wrote registry record");

        let objects = self.snapshot();
        for object in &objects {
            object.borrow().write_object(ctx)?;
        }
        info!(class = T::CLASS_NAME, count = objects.len(), "Saved registry");
        Ok(())
    }

    /// Reloads the registry from every record of this class found in storage
    ///
    /// The whole store is scanned rather than trusting the saved registry
    /// record, so objects saved one by one after the last registry save are
    /// picked up too. References stay unresolved until
    /// [Registry::on_deserialized] runs. Returns the number of objects loaded
    pub fn read_objects(&self, ctx: &T::Context) -> Result<usize, PersistenceError> {
        ctx.ensure_storage_allowed()?;
        self.clear();
        let prefix = ctx.preferences().storage_prefix.clone();
        let ids = ctx
            .storage()
            .borrow()
            .keys()
            .iter()
            .filter_map(|key| StorageKey::parse(&prefix, key))
            .filter(|key| key.class_name == T::CLASS_NAME)
            .map(|key| key.id)
            .sorted()
            .dedup()
            .collect_vec();
        for id in &ids {
            T::from_storage(ctx, *id)?;
        }
        info!(class = T::CLASS_NAME, count = ids.len(), "Loaded registry");
        Ok(ids.len())
    }

    /// Raises the ID watermark to what stored registry records of this class
    /// say, so IDs burned in earlier sessions stay burned
    pub fn restore_watermark(&self, ctx: &T::Context) -> Result<(), PersistenceError> {
        ctx.ensure_storage_allowed()?;
        let prefix = ctx.preferences().storage_prefix.clone();
        let storage = ctx.storage().borrow();
        for key in storage.keys() {
            let Some(parsed) = StorageKey::parse(&prefix, &key) else {
                continue;
            };
            if parsed.class_name != REGISTRY_CLASS_NAME {
                continue;
            }
            let Some(raw) = storage.get_item(&key) else {
                continue;
            };
            let record: RegistryRecord = serde_json::from_str(&raw)?;
            if record.object_class_name != T::CLASS_NAME {
                continue;
            }
            let highest = record
                .object_list
                .keys()
                .map(|id| id.raw().saturating_add(1))
                .max()
                .unwrap_or(0);
            self.raise_watermark(record.object_count.max(highest));
        }
        Ok(())
    }

    /// Resolves the references of every registered object
    pub fn on_deserialized(&self, ctx: &T::Context) {
        for object in self.snapshot() {
            object.borrow_mut().on_deserialized(ctx);
        }
    }

    fn raise_watermark(&self, count: u64) {
        self.object_count.set(self.object_count.get().max(count));
    }
}

fn attribute<T: Entity>(object: &T, name: &str) -> Result<Option<Value>, PersistenceError> {
    Ok(match name {
        "id" | "_id" => Some(Value::from(object.id().raw())),
        "className" | "_className" => Some(Value::from(object.class_name())),
        _ => match serde_json::to_value(object.to_record())? {
            Value::Object(mut fields) => fields.remove(name),
            _ => None,
        },
    })
}

impl<T: Entity> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Debug for Registry<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("id", &self.id)
            .field("object_class_name", &T::CLASS_NAME)
            .field("object_count", &self.object_count.get())
            .field("ids", &self.objects.borrow().ids().collect_vec())
            .finish()
    }
}
