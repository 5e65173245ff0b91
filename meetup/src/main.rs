use std::path::PathBuf;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use miette::{IntoDiagnostic, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use meetup_model::{
    Account, Email, Event, HostRef, NewAccount, NewEvent, NewOrganization, NewPerson,
    Organization, Password, Person, Repository,
};
use meetup_persistence::{
    Entity, EntityId, JsonFileStorage, PersistenceError, Preferences, StorageContext,
};

use crate::flags::MeetupCmd;

mod flags;

const DEFAULT_STORE: &str = "meetup.json";

fn main() -> Result<()> {
    color_backtrace::install();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let flags = flags::Meetup::from_env().into_diagnostic()?;
    let mut preferences = match flags.config {
        Some(path) => Preferences::load(&utf8(path)?)?,
        None => Preferences::default(),
    };
    if flags.allow_storage {
        preferences.local_storage_allowed = true;
    }
    let store = match flags.store {
        Some(path) => utf8(path)?,
        None => Utf8PathBuf::from(DEFAULT_STORE),
    };
    let repo = Repository::new(JsonFileStorage::open(store)?, preferences);

    match flags.subcommand {
        MeetupCmd::Seed(_) => seed(&repo),
        MeetupCmd::List(_) => list(&repo),
        MeetupCmd::Delete(cmd) => delete(&repo, &cmd.class, EntityId::new(cmd.id)),
    }
}

fn utf8(path: PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path).into_diagnostic()
}

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn seed(repo: &Repository) -> Result<()> {
    // Continue numbering after whatever is already stored
    repo.load_all()?;

    let organization = Organization::create(
        repo,
        NewOrganization {
            name: "Aarhus Rustaceans".to_string(),
            email: Some(Email::parse("hello@rustaceans.example")?),
        },
    )?;
    let host = Person::create(
        repo,
        NewPerson {
            name: "Ada Lovelace".to_string(),
            email: Some(Email::parse("ada@example.org")?),
            employer: Some(organization.clone()),
            job_title: Some("Analyst".to_string()),
            birthday: date(1815, 12, 10),
        },
    )?;
    let guests = ["Grace Hopper", "Barbara Liskov"]
        .into_iter()
        .map(|name| {
            Person::create(
                repo,
                NewPerson {
                    name: name.to_string(),
                    ..Default::default()
                },
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let start = date(2024, 10, 3)
        .and_then(|day| day.and_hms_opt(17, 30, 0))
        .ok_or_else(|| miette::miette!("invalid event start"))?;
    let event = Event::create(
        repo,
        NewEvent {
            name: "Ownership in practice".to_string(),
            event_type: "Meetup".to_string(),
            host: Some(HostRef::organization(&organization)),
            start,
            end: start + chrono::Duration::hours(3),
            capacity: 30,
            location: "Aarhus".to_string(),
            message: Some("Pizza is on the house".to_string()),
        },
    )?;
    for guest in &guests {
        event.borrow_mut().add_guest(guest)?;
    }

    let password = Password::create(repo, "hunter2hunter2")?;
    let account = Account::create(
        repo,
        NewAccount {
            email: Email::parse("ada@example.org")?,
            holder: host,
            password,
        },
    )?;
    account.borrow_mut().add_event(&event)?;

    repo.save_all()?;
    info!(entities = repo.len(), "Seeded store");
    Ok(())
}

fn list(repo: &Repository) -> Result<()> {
    repo.load_all()?;
    for event in repo.event.snapshot() {
        let event = event.borrow();
        let host = event
            .host()
            .and_then(HostRef::host_name)
            .unwrap_or_else(|| "nobody".to_string());
        println!(
            "#{} {} ({}) hosted by {host}",
            event.id(),
            event.name(),
            event.event_type()
        );
        println!(
            "    {} to {} at {}",
            event.start(),
            event.end(),
            event.location()
        );
        if let Some(message) = event.message() {
            println!("    {message}");
        }
        println!("    {}/{} guests", event.guests().len(), event.capacity());
        for guest in event.guests() {
            match guest.get() {
                Some(person) => println!("    - {}", person.borrow().name()),
                None => println!("    - missing person #{}", guest.id()),
            }
        }
    }
    Ok(())
}

fn delete(repo: &Repository, class_name: &str, id: EntityId) -> Result<()> {
    repo.load_all()?;
    let Some(handle) = repo.get(class_name, id)? else {
        return Err(PersistenceError::NotFound {
            key: repo.storage_key(class_name, id),
        }
        .into());
    };
    handle.delete(repo)?;
    // Refresh the registry records so the stored object lists stay accurate
    repo.save_all()?;
    info!(class_name, %id, "Deleted entity");
    Ok(())
}
