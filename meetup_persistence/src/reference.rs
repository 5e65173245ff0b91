use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::entity::Entity;
use crate::registry::Registry;
use crate::{EntityId, Live};

/// Stand-in for an object reference as it appears in storage
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Placeholder {
    #[serde(rename = "_className")]
    pub class_name: String,
    #[serde(rename = "_id")]
    pub id: EntityId,
}

impl Placeholder {
    pub fn new(class_name: impl Into<String>, id: EntityId) -> Self {
        Self {
            class_name: class_name.into(),
            id,
        }
    }

    pub fn of<T: Entity>(entity: &T) -> Self {
        Self::new(T::CLASS_NAME, entity.id())
    }
}

/// Reference field of an entity
///
/// Freshly read records only carry placeholders; they turn into live objects
/// once [Reference::resolve] finds the target in its registry
pub enum Reference<T> {
    Resolved(Live<T>),
    Placeholder(Placeholder),
}

impl<T: Entity> Reference<T> {
    pub fn to(target: &Live<T>) -> Self {
        Reference::Resolved(target.clone())
    }

    pub fn id(&self) -> EntityId {
        match self {
            Reference::Resolved(target) => target.borrow().id(),
            Reference::Placeholder(placeholder) => placeholder.id,
        }
    }

    pub fn placeholder(&self) -> Placeholder {
        match self {
            Reference::Resolved(target) => Placeholder::of(&*target.borrow()),
            Reference::Placeholder(placeholder) => placeholder.clone(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved(_))
    }

    pub fn get(&self) -> Option<&Live<T>> {
        match self {
            Reference::Resolved(target) => Some(target),
            Reference::Placeholder(_) => None,
        }
    }

    /// Swaps a placeholder of the target class for the live object
    ///
    /// Returns whether the reference is resolved afterwards. Placeholders
    /// naming another class or an ID missing from the registry are kept
    pub fn resolve(&mut self, registry: &Registry<T>) -> bool {
        let Reference::Placeholder(placeholder) = self else {
            return true;
        };
        if placeholder.class_name != T::CLASS_NAME {
            warn!(
                expected = T::CLASS_NAME,
                found = %placeholder.class_name,
                id = %placeholder.id,
                "Placeholder names an unexpected class"
            );
            return false;
        }
        match registry.get(placeholder.id) {
            Some(target) => {
                *self = Reference::Resolved(target);
                true
            }
            None => {
                warn!(class = T::CLASS_NAME, id = %placeholder.id, "Dangling reference");
                false
            }
        }
    }

    /// Whether both references point at the same object
    pub fn same_target(&self, other: &Self) -> bool {
        match (self, other) {
            (Reference::Resolved(a), Reference::Resolved(b)) => Rc::ptr_eq(a, b),
            _ => self.placeholder() == other.placeholder(),
        }
    }
}

impl<T> Clone for Reference<T> {
    fn clone(&self) -> Self {
        match self {
            Reference::Resolved(target) => Reference::Resolved(target.clone()),
            Reference::Placeholder(placeholder) => Reference::Placeholder(placeholder.clone()),
        }
    }
}

impl<T> Debug for Reference<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            // Targets may reference back, so never descend into them
            Reference::Resolved(target) => f
                .debug_tuple("Resolved")
                .field(&Rc::as_ptr(target))
                .finish(),
            Reference::Placeholder(placeholder) => {
                f.debug_tuple("Placeholder").field(placeholder).finish()
            }
        }
    }
}

impl<T: Entity> Serialize for Reference<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.placeholder().serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Reference<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Placeholder::deserialize(deserializer).map(Reference::Placeholder)
    }
}
