use std::cell::{Ref, RefCell};
use std::fmt::{Debug, Formatter};

use duplicate::duplicate_item;
use paste::paste;
use rustc_hash::FxHashMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use meetup_persistence::registry::REGISTRY_CLASS_NAME;
use meetup_persistence::{
    ClassName, Entity, EntityId, Live, PersistenceError, Placeholder, Preferences, Reference,
    Registry, RegistryHolder, StorageAdapter, StorageContext, StorageKey,
};

use crate::model::organization::Organization;
use crate::model::person::Person;

pub mod account;
pub mod email;
pub mod event;
pub mod organization;
pub mod password;
pub mod person;

/// Anything that can host an event
pub trait Host {
    fn host_name(&self) -> &str;
}

#[duplicate_item(ty; [Person]; [Organization])]
impl Host for ty {
    fn host_name(&self) -> &str {
        self.name()
    }
}

/// Event host, either a person or an organization
#[derive(Debug, Clone)]
pub enum HostRef {
    Person(Reference<Person>),
    Organization(Reference<Organization>),
}

impl HostRef {
    pub fn person(person: &Live<Person>) -> Self {
        HostRef::Person(Reference::to(person))
    }

    pub fn organization(organization: &Live<Organization>) -> Self {
        HostRef::Organization(Reference::to(organization))
    }

    pub fn placeholder(&self) -> Placeholder {
        match self {
            HostRef::Person(host) => host.placeholder(),
            HostRef::Organization(host) => host.placeholder(),
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            HostRef::Person(host) => host.id(),
            HostRef::Organization(host) => host.id(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            HostRef::Person(host) => host.is_resolved(),
            HostRef::Organization(host) => host.is_resolved(),
        }
    }

    pub fn resolve(&mut self, repo: &Repository) -> bool {
        match self {
            HostRef::Person(host) => host.resolve(&repo.person),
            HostRef::Organization(host) => host.resolve(&repo.organization),
        }
    }

    /// Name of the host, once resolved
    pub fn host_name(&self) -> Option<String> {
        fn name_of<T: Host>(host: &Reference<T>) -> Option<String>
        where
            T: Entity,
        {
            host.get().map(|host| host.borrow().host_name().to_string())
        }

        match self {
            HostRef::Person(host) => name_of(host),
            HostRef::Organization(host) => name_of(host),
        }
    }
}

impl Serialize for HostRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.placeholder().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for HostRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let placeholder = Placeholder::deserialize(deserializer)?;
        if placeholder.class_name == Person::CLASS_NAME {
            Ok(HostRef::Person(Reference::Placeholder(placeholder)))
        } else if placeholder.class_name == Organization::CLASS_NAME {
            Ok(HostRef::Organization(Reference::Placeholder(placeholder)))
        } else {
            Err(D::Error::custom(format!(
                "`{}` cannot host an event",
                placeholder.class_name
            )))
        }
    }
}

type Decoder = fn(&Repository, EntityId) -> Result<EntityHandle, PersistenceError>;

macro_rules! repository {
    ($($name:ident: $ty:ty),*$(,)?) => {
        paste! {
            /// Live handle to an entity of any model class
            #[derive(Debug, Clone)]
            pub enum EntityHandle {
                $(
                    [< $name:camel >](Live<$ty>),
                )*
            }

            impl EntityHandle {
                pub fn id(&self) -> EntityId {
                    match self {
                        $(
                            Self::[<$name:camel>](e) => e.borrow().id(),
                        )*
                    }
                }

                pub fn class_name(&self) -> ClassName {
                    match self {
                        $(
                            Self::[<$name:camel>](_) => <$ty as Entity>::CLASS_NAME,
                        )*
                    }
                }

                pub fn to_json(&self) -> Result<String, PersistenceError> {
                    match self {
                        $(
                            Self::[<$name:camel>](e) => e.borrow().to_json(),
                        )*
                    }
                }

                pub fn delete(&self, repo: &Repository) -> Result<(), PersistenceError> {
                    match self {
                        $(
                            Self::[<$name:camel>](e) => <$ty as Entity>::delete(e, repo),
                        )*
                    }
                }
            }

            $(
                impl From<Live<$ty>> for EntityHandle {
                    fn from(value: Live<$ty>) -> Self {
                        Self::[<$name:camel>](value)
                    }
                }
            )*

            /// Application context: one registry per model class on top of a
            /// shared storage adapter
            pub struct Repository {
                storage: RefCell<Box<dyn StorageAdapter>>,
                preferences: RefCell<Preferences>,
                decoders: FxHashMap<ClassName, Decoder>,
                $(
                    pub $name: Registry<$ty>,
                )*
            }

            $(
                impl RegistryHolder<$ty> for Repository {
                    fn registry(&self) -> &Registry<$ty> {
                        &self.$name
                    }
                }
            )*

            impl Repository {
                pub fn new(storage: impl StorageAdapter + 'static, preferences: Preferences) -> Self {
                    let mut decoders = FxHashMap::<ClassName, Decoder>::default();
                    $(
                        decoders.insert(<$ty as Entity>::CLASS_NAME, |repo, id| {
                            <$ty as Entity>::from_storage(repo, id).map(EntityHandle::from)
                        });
                    )*
                    Self {
                        storage: RefCell::new(Box::new(storage)),
                        preferences: RefCell::new(preferences),
                        decoders,
                        $(
                            $name: Registry::new(),
                        )*
                    }
                }

                /// Looks up a registered entity by class name
                pub fn get(
                    &self,
                    class_name: &str,
                    id: EntityId,
                ) -> Result<Option<EntityHandle>, PersistenceError> {
                    $(
                        if class_name == <$ty as Entity>::CLASS_NAME {
                            return Ok(self.$name.get(id).map(EntityHandle::from));
                        }
                    )*
                    Err(PersistenceError::UnknownClass(class_name.to_string()))
                }

                /// Reloads every registry from storage, then resolves all
                /// references. Returns the number of entities loaded
                pub fn load_all(&self) -> Result<usize, PersistenceError> {
                    let mut count = 0;
                    $(
                        self.$name.restore_watermark(self)?;
                        count += self.$name.read_objects(self)?;
                    )*
                    self.resolve_all();
                    info!(count, "Loaded repository");
                    Ok(count)
                }

                /// Resolves the references of every registered entity
                pub fn resolve_all(&self) {
                    $(
                        self.$name.on_deserialized(self);
                    )*
                }

                pub fn save_all(&self) -> Result<(), PersistenceError> {
                    $(
                        self.$name.write_object(self)?;
                    )*
                    Ok(())
                }

                pub fn clear_all(&self) {
                    $(
                        self.$name.clear();
                    )*
                }

                /// Total number of registered entities
                pub fn len(&self) -> usize {
                    0 $( + self.$name.len() )*
                }

                pub fn is_empty(&self) -> bool {
                    self.len() == 0
                }
            }

            impl Debug for Repository {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    f.debug_struct("Repository")
                        .field("storage", &self.storage)
                        .field("preferences", &self.preferences)
                        $(
                            .field(stringify!($name), &self.$name)
                        )*
                        .finish()
                }
            }
        }
    };
}

impl Repository {
    pub fn in_memory(preferences: Preferences) -> Self {
        Self::new(meetup_persistence::InMemoryStorage::new(), preferences)
    }

    /// Hands the storage back, e.g. to reopen it in a fresh repository
    pub fn into_storage(self) -> Box<dyn StorageAdapter> {
        self.storage.into_inner()
    }

    pub fn set_local_storage_allowed(&self, allowed: bool) {
        self.preferences.borrow_mut().local_storage_allowed = allowed;
    }

    /// Decodes and registers the record stored under a full storage key
    ///
    /// References of the loaded entity stay unresolved
    pub fn load_key(&self, key: &str) -> Result<EntityHandle, PersistenceError> {
        let prefix = self.preferences.borrow().storage_prefix.clone();
        let Some(parsed) = StorageKey::parse(&prefix, key) else {
            return Err(PersistenceError::NotFound {
                key: key.to_string(),
            });
        };
        let Some(decoder) = self.decoders.get(parsed.class_name.as_str()) else {
            return Err(PersistenceError::UnknownClass(parsed.class_name));
        };
        decoder(self, parsed.id)
    }
}

impl StorageContext for Repository {
    fn storage(&self) -> &RefCell<Box<dyn StorageAdapter>> {
        &self.storage
    }

    fn preferences(&self) -> Ref<'_, Preferences> {
        self.preferences.borrow()
    }

    fn is_known_class(&self, class_name: &str) -> bool {
        class_name == REGISTRY_CLASS_NAME || self.decoders.contains_key(class_name)
    }
}

#[macro_export]
macro_rules! call_with_all_models {
    ($macro_name:ident) => {
        $macro_name!(
            organization: $crate::model::organization::Organization,
            person: $crate::model::person::Person,
            password: $crate::model::password::Password,
            event: $crate::model::event::Event,
            account: $crate::model::account::Account,
        );
    };
}

call_with_all_models!(repository);
