use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use meetup_persistence::{Entity, EntityId, Live, Reference};

use crate::error::{ModelError, ValidationError};
use crate::model::email::Email;
use crate::model::event::Event;
use crate::model::password::Password;
use crate::model::person::Person;
use crate::model::Repository;

#[derive(Debug)]
pub struct Account {
    id: EntityId,
    email: Email,
    holder: Reference<Person>,
    password: Reference<Password>,
    events: BTreeMap<EntityId, Reference<Event>>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: Email,
    pub holder: Live<Person>,
    pub password: Live<Password>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    email: Email,
    account_holder: Reference<Person>,
    password: Reference<Password>,
    #[serde(default)]
    events: BTreeMap<EntityId, Reference<Event>>,
}

impl Account {
    pub fn new(id: EntityId, fields: NewAccount) -> Account {
        Account {
            id,
            email: fields.email,
            holder: Reference::to(&fields.holder),
            password: Reference::to(&fields.password),
            events: BTreeMap::new(),
        }
    }

    pub fn create(repo: &Repository, fields: NewAccount) -> Result<Live<Self>, ModelError> {
        <Self as Entity>::create(repo, |id| Ok(Self::new(id, fields)))
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn set_email(&mut self, email: Email) {
        self.email = email;
    }

    pub fn holder(&self) -> &Reference<Person> {
        &self.holder
    }

    pub fn set_holder(&mut self, holder: &Live<Person>) {
        self.holder = Reference::to(holder);
    }

    pub fn password(&self) -> &Reference<Password> {
        &self.password
    }

    pub fn set_password(&mut self, password: &Live<Password>) {
        self.password = Reference::to(password);
    }

    /// None while the password reference is unresolved
    pub fn verify_password(&self, candidate: &str) -> Option<bool> {
        self.password
            .get()
            .map(|password| password.borrow().matches(candidate))
    }

    pub fn events(&self) -> impl Iterator<Item = &Reference<Event>> {
        self.events.values()
    }

    pub fn has_event(&self, id: EntityId) -> bool {
        self.events.contains_key(&id)
    }

    pub fn add_event(&mut self, event: &Live<Event>) -> Result<(), ValidationError> {
        let id = event.borrow().id();
        if self.events.contains_key(&id) {
            return Err(ValidationError::DuplicateEvent(id));
        }
        self.events.insert(id, Reference::to(event));
        Ok(())
    }

    pub fn remove_event(&mut self, id: EntityId) -> Option<Reference<Event>> {
        self.events.remove(&id)
    }
}

impl Entity for Account {
    const CLASS_NAME: &'static str = "Account";
    type Record = AccountRecord;
    type Context = Repository;

    fn id(&self) -> EntityId {
        self.id
    }

    fn to_record(&self) -> Self::Record {
        AccountRecord {
            email: self.email.clone(),
            account_holder: self.holder.clone(),
            password: self.password.clone(),
            events: self.events.clone(),
        }
    }

    fn from_record(id: EntityId, record: Self::Record) -> Self {
        Account {
            id,
            email: record.email,
            holder: record.account_holder,
            password: record.password,
            events: record.events,
        }
    }

    fn on_deserialized(&mut self, ctx: &Self::Context) {
        self.holder.resolve(&ctx.person);
        self.password.resolve(&ctx.password);
        for event in self.events.values_mut() {
            event.resolve(&ctx.event);
        }
    }
}
