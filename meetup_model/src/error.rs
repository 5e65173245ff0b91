use chrono::NaiveDateTime;
use meetup_persistence::{EntityId, PersistenceError};
use thiserror::Error;

/// Rejected field value; entities never hold a value that failed validation
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "miette", derive(miette::Diagnostic))]
pub enum ValidationError {
    #[error("Field `{}` must not be empty", .0)]
    Empty(&'static str),
    #[error("`{}` is not a valid email address", .0)]
    InvalidEmail(String),
    #[error("Password must be at least {} characters long", .0)]
    PasswordTooShort(usize),
    #[error("Password must contain at least one digit")]
    PasswordWithoutDigit,
    #[error("Event cannot end at {} before it starts at {}", .end, .start)]
    EndBeforeStart {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("Cannot add guests beyond capacity")]
    CapacityExceeded { capacity: u32 },
    #[error("Capacity {} is below the {} guests already invited", .capacity, .guests)]
    CapacityBelowGuests { capacity: u32, guests: usize },
    #[error("Person {} is already a guest", .0)]
    DuplicateGuest(EntityId),
    #[error("Event {} is already attached to the account", .0)]
    DuplicateEvent(EntityId),
}

#[derive(Debug, Error)]
#[cfg_attr(feature = "miette", derive(miette::Diagnostic))]
pub enum ModelError {
    #[error(transparent)]
    #[cfg_attr(feature = "miette", diagnostic(transparent))]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    #[cfg_attr(feature = "miette", diagnostic(transparent))]
    Persistence(#[from] PersistenceError),
}
