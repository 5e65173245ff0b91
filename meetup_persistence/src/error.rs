use thiserror::Error;

use crate::{ClassName, EntityId};

#[derive(Debug, Error)]
#[cfg_attr(feature = "miette", derive(miette::Diagnostic))]
pub enum PersistenceError {
    #[error("{}({}) is already registered", .class, .id)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::registry::duplicate_id)))]
    DuplicateId { class: ClassName, id: EntityId },
    #[error("No {} ids are left to issue", .class)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::registry::id_space_exhausted)))]
    IdSpaceExhausted { class: ClassName },
    #[error("Class `{}` is not known to the repository", .0)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::registry::unknown_class)))]
    UnknownClass(String),
    #[error("Local storage use has not been granted")]
    #[cfg_attr(
        feature = "miette",
        diagnostic(
            code(meetup::storage::permission_denied),
            help("set `local_storage_allowed = true` in the preferences")
        )
    )]
    PermissionDenied,
    #[error("No record is stored under `{}`", .key)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::storage::not_found)))]
    NotFound { key: String },
    #[error("Record `{}` holds the wrong class, expected {} but found {}", .key, .expected, .found)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::storage::wrong_class)))]
    WrongClass {
        key: String,
        expected: ClassName,
        found: String,
    },
    #[error("Record `{}` has no id", .key)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::storage::missing_id)))]
    MissingId { key: String },
    #[error("Record `{}` has a non-integer id `{}`", .key, .value)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::storage::non_integer_id)))]
    NonIntegerId { key: String, value: String },
    #[error("Record `{}` has a negative id `{}`", .key, .value)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::storage::negative_id)))]
    NegativeId { key: String, value: String },
    #[error("Record `{}` has id {} where {} is expected", .key, .found, .expected)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::storage::id_mismatch)))]
    IdMismatch {
        key: String,
        expected: EntityId,
        found: EntityId,
    },
    #[error("Record `{}` is not a JSON object", .key)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::storage::malformed_record)))]
    MalformedRecord { key: String },
    #[error("Failed to (de)serialize a record: {}", .0)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::serialization)))]
    Json(#[from] serde_json::Error),
    #[error("Storage I/O failed: {}", .0)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::storage::io)))]
    Io(#[from] std::io::Error),
    #[error("Invalid preferences: {}", .0)]
    #[cfg_attr(feature = "miette", diagnostic(code(meetup::preferences)))]
    Preferences(#[from] toml::de::Error),
}

impl PersistenceError {
    pub(crate) fn wrong_class(key: &str, expected: ClassName, found: Option<&str>) -> Self {
        PersistenceError::WrongClass {
            key: key.to_string(),
            expected,
            found: found.unwrap_or("nothing").to_string(),
        }
    }
}
