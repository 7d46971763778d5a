//! Domain models for identity records

mod account;
mod record;
mod update;

pub use account::RemoteAccount;
pub use record::{Credential, Metadata, PasswordHasher, Record, RecordId};
pub use update::{AccountUpdate, UsernameRewrite};
