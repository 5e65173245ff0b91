use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use meetup_persistence::{Entity, EntityId, Live, Reference};

use crate::error::{ModelError, ValidationError};
use crate::model::email::Email;
use crate::model::organization::{non_empty, Organization};
use crate::model::Repository;

#[derive(Debug)]
pub struct Person {
    id: EntityId,
    name: String,
    email: Option<Email>,
    employer: Option<Reference<Organization>>,
    job_title: Option<String>,
    birthday: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPerson {
    pub name: String,
    pub email: Option<Email>,
    pub employer: Option<Live<Organization>>,
    pub job_title: Option<String>,
    pub birthday: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<Email>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    employer: Option<Reference<Organization>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    birthday: Option<NaiveDate>,
}

impl Person {
    pub fn new(id: EntityId, fields: NewPerson) -> Result<Self, ValidationError> {
        let mut person = Person {
            id,
            name: String::new(),
            email: None,
            employer: None,
            job_title: None,
            birthday: None,
        };
        person.set_name(fields.name)?;
        person.set_email(fields.email);
        person.set_employer(fields.employer.as_ref());
        person.set_job_title(fields.job_title)?;
        person.set_birthday(fields.birthday);
        Ok(person)
    }

    pub fn create(repo: &Repository, fields: NewPerson) -> Result<Live<Self>, ModelError> {
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

    pub fn employer(&self) -> Option<&Reference<Organization>> {
        self.employer.as_ref()
    }

    pub fn set_employer(&mut self, employer: Option<&Live<Organization>>) {
        self.employer = employer.map(Reference::to);
    }

    pub fn job_title(&self) -> Option<&str> {
        self.job_title.as_deref()
    }

    pub fn set_job_title(&mut self, job_title: Option<String>) -> Result<(), ValidationError> {
        self.job_title = job_title
            .map(|title| non_empty("job_title", title))
            .transpose()?;
        Ok(())
    }

    pub fn birthday(&self) -> Option<NaiveDate> {
        self.birthday
    }

    pub fn set_birthday(&mut self, birthday: Option<NaiveDate>) {
        self.birthday = birthday;
    }
}

impl Entity for Person {
    const CLASS_NAME: &'static str = "Person";
    type Record = PersonRecord;
    type Context = Repository;

    fn id(&self) -> EntityId {
        self.id
    }

    fn to_record(&self) -> Self::Record {
        PersonRecord {
            name: self.name.clone(),
            email: self.email.clone(),
            employer: self.employer.clone(),
            job_title: self.job_title.clone(),
            birthday: self.birthday,
        }
    }

    fn from_record(id: EntityId, record: Self::Record) -> Self {
        Person {
            id,
            name: record.name,
            email: record.email,
            employer: record.employer,
            job_title: record.job_title,
            birthday: record.birthday,
        }
    }

    fn on_deserialized(&mut self, ctx: &Self::Context) {
        if let Some(employer) = &mut self.employer {
            employer.resolve(&ctx.organization);
        }
    }
}
