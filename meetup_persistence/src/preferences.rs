use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

pub const DEFAULT_STORAGE_PREFIX: &str = "dk.example.meetup-app.";

/// Application preferences consulted by the persistence layer
///
/// The storage prefix must stay stable for as long as stored data should be
/// readable
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub storage_prefix: String,
    pub local_storage_allowed: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            local_storage_allowed: false,
        }
    }
}

impl Preferences {
    /// Default preferences with the storage permission already granted
    pub fn allowing_local_storage() -> Self {
        Self {
            local_storage_allowed: true,
            ..Default::default()
        }
    }

    pub fn is_local_storage_allowed(&self) -> bool {
        self.local_storage_allowed
    }

    pub fn from_toml_str(source: &str) -> Result<Self, PersistenceError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Utf8Path) -> Result<Self, PersistenceError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}
