use serde::{Deserialize, Serialize};

use meetup_persistence::{Entity, EntityId, Live};

use crate::error::{ModelError, ValidationError};
use crate::model::email::Email;
use crate::model::Repository;

#[derive(Debug)]
pub struct Organization {
    id: EntityId,
    name: String,
    email: Option<Email>,
}

#[derive(Debug, Clone, Default)]
pub struct NewOrganization {
    pub name: String,
    pub email: Option<Email>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRecord {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<Email>,
}

impl Organization {
    pub fn new(id: EntityId, fields: NewOrganization) -> Result<Self, ValidationError> {
        let mut organization = Organization {
            id,
            name: String::new(),
            email: None,
        };
        organization.set_name(fields.name)?;
        organization.set_email(fields.email);
        Ok(organization)
    }

    pub fn create(repo: &Repository, fields: NewOrganization) -> Result<Live<Self>, ModelError> {
        <Self as Entity>::create(repo, |id| Ok(Self::new(id, fields)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        self.name = non_empty("name", name.into())?;
        Ok(())
    }

    pub fn email(&self) -> Option<&Email> {
        self.email.as_ref()
    }

    pub fn set_email(&mut self, email: Option<Email>) {
        self.email = email;
    }
}

impl Entity for Organization {
    const CLASS_NAME: &'static str = "Organization";
    type Record = OrganizationRecord;
    type Context = Repository;

    fn id(&self) -> EntityId {
        self.id
    }

    fn to_record(&self) -> Self::Record {
        OrganizationRecord {
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    fn from_record(id: EntityId, record: Self::Record) -> Self {
        Organization {
            id,
            name: record.name,
            email: record.email,
        }
    }
}

/// Trims `value`, rejecting it if nothing is left
pub(crate) fn non_empty(field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(trimmed.to_string())
}
