use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::error::PersistenceError;
use crate::registry::{RegistryHolder, StorageContext};
use crate::{live, ClassName, EntityId, Live};

/// Storage protocol shared by every model class
///
/// Implementors describe their JSON projection ([Entity::Record], where every
/// reference is a [Placeholder](crate::Placeholder)) and how to rebuild
/// themselves from it. Saving, loading, removal and registration come for free.
pub trait Entity: Sized + 'static {
    /// Stable class tag written into every record
    const CLASS_NAME: ClassName;

    /// Storage projection of the entity, without the `_className`/`_id` envelope
    type Record: Serialize + DeserializeOwned;

    /// Context holding the registries this entity registers in and resolves
    /// references against
    type Context: RegistryHolder<Self>;

    fn id(&self) -> EntityId;

    fn class_name(&self) -> ClassName {
        Self::CLASS_NAME
    }

    fn to_record(&self) -> Self::Record;

    /// Binds scalar fields straight from a record that already passed
    /// validation once; reference fields stay as placeholders
    fn from_record(id: EntityId, record: Self::Record) -> Self;

    /// Second phase of loading: swap placeholders for live objects
    ///
    /// Only meaningful once every related registry has been populated
    fn on_deserialized(&mut self, _ctx: &Self::Context) {}

    fn storage_key(&self, ctx: &Self::Context) -> String {
        ctx.storage_key(Self::CLASS_NAME, self.id())
    }

    fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(&Envelope {
            class_name: Self::CLASS_NAME,
            id: self.id(),
            record: self.to_record(),
        })?)
    }

    fn write_object(&self, ctx: &Self::Context) -> Result<(), PersistenceError> {
        ctx.ensure_storage_allowed()?;
        if !ctx.is_known_class(Self::CLASS_NAME) {
            return Err(PersistenceError::UnknownClass(Self::CLASS_NAME.to_string()));
        }
        let key = self.storage_key(ctx);
        let json = self.to_json()?;
        ctx.storage().borrow_mut().set_item(&key, json)?;
        debug!(key, "Wrote record");
        Ok(())
    }

    /// Reads the record stored for `id` without registering it anywhere
    fn read_object(ctx: &Self::Context, id: EntityId) -> Result<Self, PersistenceError> {
        ctx.ensure_storage_allowed()?;
        let key = ctx.storage_key(Self::CLASS_NAME, id);
        let Some(raw) = ctx.storage().borrow().get_item(&key) else {
            return Err(PersistenceError::NotFound { key });
        };
        let value: Value = serde_json::from_str(&raw)?;
        let stored_id = check_envelope(&key, &value, Self::CLASS_NAME)?;
        if stored_id != id {
            return Err(PersistenceError::IdMismatch {
                key,
                expected: id,
                found: stored_id,
            });
        }
        let record = serde_json::from_value(value)?;
        debug!(key, "Read record");
        Ok(Self::from_record(id, record))
    }

    /// Deletes the stored record; absent records count as removed
    fn remove_object(&self, ctx: &Self::Context) -> Result<bool, PersistenceError> {
        let key = self.storage_key(ctx);
        ctx.storage().borrow_mut().remove_item(&key)?;
        debug!(key, "Removed record");
        Ok(true)
    }

    /// Loads the entity stored under `id` and registers it
    ///
    /// Nothing is registered when reading fails. References stay unresolved
    /// until [Entity::on_deserialized] runs
    fn from_storage(ctx: &Self::Context, id: EntityId) -> Result<Live<Self>, PersistenceError> {
        let entity = live(Self::read_object(ctx, id)?);
        ctx.registry().add(entity.clone())?;
        Ok(entity)
    }

    /// Builds a new entity under a freshly issued ID and registers it
    ///
    /// The entity is only registered if `build` succeeds; the issued ID is
    /// burned either way
    fn create<E: From<PersistenceError>>(
        ctx: &Self::Context,
        build: impl FnOnce(EntityId) -> Result<Self, E>,
    ) -> Result<Live<Self>, E> {
        let id = ctx.registry().next_id()?;
        let entity = live(build(id)?);
        ctx.registry().add(entity.clone())?;
        Ok(entity)
    }

    /// Evicts the entity from both its registry and storage
    ///
    /// Entities that were never registered or stored are tolerated
    fn delete(this: &Live<Self>, ctx: &Self::Context) -> Result<(), PersistenceError> {
        let id = this.borrow().id();
        ctx.registry().remove(id);
        this.borrow().remove_object(ctx)?;
        Ok(())
    }

    /// Applies a mutation, then saves the entity if storage use is granted
    fn update<R, E: From<PersistenceError>>(
        this: &Live<Self>,
        ctx: &Self::Context,
        mutate: impl FnOnce(&mut Self) -> Result<R, E>,
    ) -> Result<R, E> {
        let out = mutate(&mut this.borrow_mut())?;
        if ctx.preferences().is_local_storage_allowed() {
            this.borrow().write_object(ctx)?;
        }
        Ok(out)
    }
}

struct Envelope<R> {
    class_name: ClassName,
    id: EntityId,
    record: R,
}

impl<R: Serialize> Serialize for Envelope<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Flat<'a, R> {
            #[serde(rename = "_className")]
            class_name: ClassName,
            #[serde(rename = "_id")]
            id: EntityId,
            #[serde(flatten)]
            record: &'a R,
        }

        Flat {
            class_name: self.class_name,
            id: self.id,
            record: &self.record,
        }
        .serialize(serializer)
    }
}

/// Validates the `_className`/`_id` envelope of a stored record, returning
/// the stored ID
pub(crate) fn check_envelope(
    key: &str,
    value: &Value,
    expected: ClassName,
) -> Result<EntityId, PersistenceError> {
    let Some(object) = value.as_object() else {
        return Err(PersistenceError::MalformedRecord {
            key: key.to_string(),
        });
    };
    let class_name = object.get("_className").and_then(Value::as_str);
    if class_name != Some(expected) {
        return Err(PersistenceError::wrong_class(key, expected, class_name));
    }
    parse_id(key, object.get("_id"))
}

pub(crate) fn parse_id(key: &str, value: Option<&Value>) -> Result<EntityId, PersistenceError> {
    let value = match value {
        None | Some(Value::Null) => {
            return Err(PersistenceError::MissingId {
                key: key.to_string(),
            })
        }
        Some(value) => value,
    };
    if let Some(raw) = value.as_u64() {
        return Ok(EntityId::new(raw));
    }
    let negative = || PersistenceError::NegativeId {
        key: key.to_string(),
        value: value.to_string(),
    };
    if value.is_i64() {
        return Err(negative());
    }
    if let Some(float) = value.as_f64() {
        if float.is_finite() && float.fract() == 0.0 {
            if float < 0.0 {
                return Err(negative());
            }
            if float < u64::MAX as f64 {
                return Ok(EntityId::new(float as u64));
            }
        }
    }
    Err(PersistenceError::NonIntegerId {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn id_of(value: Value) -> Result<EntityId, PersistenceError> {
        check_envelope("k", &value, "Event")
    }

    #[test]
    fn envelope_accepts_integral_ids() {
        assert_eq!(
            id_of(json!({"_className": "Event", "_id": 7})).unwrap(),
            EntityId::new(7)
        );
        assert_eq!(
            id_of(json!({"_className": "Event", "_id": 7.0})).unwrap(),
            EntityId::new(7)
        );
    }

    #[test]
    fn envelope_errors_are_specific() {
        assert!(matches!(
            id_of(json!({"_className": "Bogus", "_id": 7})),
            Err(PersistenceError::WrongClass { found, .. }) if found == "Bogus"
        ));
        assert!(matches!(
            id_of(json!({"_className": "Event"})),
            Err(PersistenceError::MissingId { .. })
        ));
        assert!(matches!(
            id_of(json!({"_className": "Event", "_id": null})),
            Err(PersistenceError::MissingId { .. })
        ));
        assert!(matches!(
            id_of(json!({"_className": "Event", "_id": 1.5})),
            Err(PersistenceError::NonIntegerId { .. })
        ));
        assert!(matches!(
            id_of(json!({"_className": "Event", "_id": "3"})),
            Err(PersistenceError::NonIntegerId { .. })
        ));
        assert!(matches!(
            id_of(json!({"_className": "Event", "_id": -2})),
            Err(PersistenceError::NegativeId { .. })
        ));
        assert!(matches!(
            id_of(json!({"_className": "Event", "_id": -2.0})),
            Err(PersistenceError::NegativeId { .. })
        ));
        assert!(matches!(
            id_of(json!({"_className": "Event", "_id": 18446744073709551616.0})),
            Err(PersistenceError::NonIntegerId { .. })
        ));
        assert!(matches!(
            id_of(json!([1, 2])),
            Err(PersistenceError::MalformedRecord { .. })
        ));
    }
}
