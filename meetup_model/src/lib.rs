pub use error::{ModelError, ValidationError};
pub use model::account::{Account, NewAccount};
pub use model::email::Email;
pub use model::event::{Event, NewEvent};
pub use model::organization::{NewOrganization, Organization};
pub use model::password::Password;
pub use model::person::{NewPerson, Person};
pub use model::{EntityHandle, Host, HostRef, Repository};

pub mod error;
pub mod model;
