use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use meetup_persistence::{Entity, EntityId, Live, Reference};

use crate::error::{ModelError, ValidationError};
use crate::model::organization::non_empty;
use crate::model::person::Person;
use crate::model::{HostRef, Repository};

#[derive(Debug)]
pub struct Event {
    id: EntityId,
    name: String,
    event_type: String,
    host: Option<HostRef>,
    start: NaiveDateTime,
    end: NaiveDateTime,
    capacity: u32,
    location: String,
    guests: Vec<Reference<Person>>,
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub event_type: String,
    pub host: Option<HostRef>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub capacity: u32,
    pub location: String,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    name: String,
    event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host: Option<HostRef>,
    start: NaiveDateTime,
    end: NaiveDateTime,
    capacity: u32,
    location: String,
    #[serde(default)]
    guests: Vec<Reference<Person>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl Event {
    pub fn new(id: EntityId, fields: NewEvent) -> Result<Self, ValidationError> {
        let mut event = Event {
            id,
            name: String::new(),
            event_type: String::new(),
            host: None,
            start: fields.start,
            end: fields.start,
            capacity: 0,
            location: String::new(),
            guests: Vec::new(),
            message: None,
        };
        event.set_name(fields.name)?;
        event.set_event_type(fields.event_type)?;
        event.set_host(fields.host);
        event.set_period(fields.start, fields.end)?;
        event.set_capacity(fields.capacity)?;
        event.set_location(fields.location)?;
        event.set_message(fields.message);
        Ok(event)
    }

    pub fn create(repo: &Repository, fields: NewEvent) -> Result<Live<Self>, ModelError> {
        <Self as Entity>::create(repo, |id| Ok(Self::new(id, fields)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        self.name = non_empty("name", name.into())?;
        Ok(())
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn set_event_type(&mut self, event_type: impl Into<String>) -> Result<(), ValidationError> {
        self.event_type = non_empty("event_type", event_type.into())?;
        Ok(())
    }

    pub fn host(&self) -> Option<&HostRef> {
        self.host.as_ref()
    }

    pub fn set_host(&mut self, host: Option<HostRef>) {
        self.host = host;
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Sets both ends of the event at once so they are never observed out of
    /// order
    pub fn set_period(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<(), ValidationError> {
        if end < start {
            return Err(ValidationError::EndBeforeStart { start, end });
        }
        self.start = start;
        self.end = end;
        Ok(())
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: u32) -> Result<(), ValidationError> {
        if (capacity as usize) < self.guests.len() {
            return Err(ValidationError::CapacityBelowGuests {
                capacity,
                guests: self.guests.len(),
            });
        }
        self.capacity = capacity;
        Ok(())
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn set_location(&mut self, location: impl Into<String>) -> Result<(), ValidationError> {
        self.location = non_empty("location", location.into())?;
        Ok(())
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn set_message(&mut self, message: Option<String>) {
        self.message = message.filter(|message| !message.trim().is_empty());
    }

    pub fn guests(&self) -> &[Reference<Person>] {
        &self.guests
    }

    pub fn is_full(&self) -> bool {
        self.guests.len() >= self.capacity as usize
    }

    pub fn add_guest(&mut self, person: &Live<Person>) -> Result<(), ValidationError> {
        if self.is_full() {
            return Err(ValidationError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        let id = person.borrow().id();
        if self.guests.iter().any(|guest| guest.id() == id) {
            return Err(ValidationError::DuplicateGuest(id));
        }
        self.guests.push(Reference::to(person));
        Ok(())
    }

    /// Returns whether the person was on the guest list
    pub fn remove_guest(&mut self, id: EntityId) -> bool {
        let before = self.guests.len();
        self.guests.retain(|guest| guest.id() != id);
        self.guests.len() != before
    }
}

impl Entity for Event {
    const CLASS_NAME: &'static str = "Event";
    type Record = EventRecord;
    type Context = Repository;

    fn id(&self) -> EntityId {
        self.id
    }

    fn to_record(&self) -> Self::Record {
        EventRecord {
            name: self.name.clone(),
            event_type: self.event_type.clone(),
            host: self.host.clone(),
            start: self.start,
            end: self.end,
            capacity: self.capacity,
            location: self.location.clone(),
            guests: self.guests.clone(),
            message: self.message.clone(),
        }
    }

    fn from_record(id: EntityId, record: Self::Record) -> Self {
        Event {
            id,
            name: record.name,
            event_type: record.event_type,
            host: record.host,
            start: record.start,
            end: record.end,
            capacity: record.capacity,
            location: record.location,
            guests: record.guests,
            message: record.message,
        }
    }

    fn on_deserialized(&mut self, ctx: &Self::Context) {
        if let Some(host) = &mut self.host {
            host.resolve(ctx);
        }
        for guest in &mut self.guests {
            guest.resolve(&ctx.person);
        }
    }
}
