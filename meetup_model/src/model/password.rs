use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};

use meetup_persistence::{Entity, EntityId, Live};

use crate::error::{ModelError, ValidationError};
use crate::model::Repository;

pub struct Password {
    id: EntityId,
    value: String,
}

#[derive(Serialize, Deserialize)]
pub struct PasswordRecord {
    value: String,
}

impl Password {
    pub const MIN_LENGTH: usize = 8;

    pub fn new(id: EntityId, value: &str) -> Result<Self, ValidationError> {
        let mut password = Password {
            id,
            value: String::new(),
        };
        password.set(value)?;
        Ok(password)
    }

    pub fn create(repo: &Repository, value: &str) -> Result<Live<Self>, ModelError> {
        <Self as Entity>::create(repo, |id| Ok(Self::new(id, value)?))
    }

    pub fn set(&mut self, value: &str) -> Result<(), ValidationError> {
        if value.chars().count() < Self::MIN_LENGTH {
            return Err(ValidationError::PasswordTooShort(Self::MIN_LENGTH));
        }
        if !value.chars().any(|c| c.is_ascii_digit()) {
            return Err(ValidationError::PasswordWithoutDigit);
        }
        self.value = value.to_string();
        Ok(())
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.value == candidate
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("id", &self.id)
            .field("value", &"<redacted>")
            .finish()
    }
}

impl Entity for Password {
    const CLASS_NAME: &'static str = "Password";
    type Record = PasswordRecord;
    type Context = Repository;

    fn id(&self) -> EntityId {
        self.id
    }

    fn to_record(&self) -> Self::Record {
        PasswordRecord {
            value: self.value.clone(),
        }
    }

    fn from_record(id: EntityId, record: Self::Record) -> Self {
        Password {
            id,
            value: record.value,
        }
    }
}
