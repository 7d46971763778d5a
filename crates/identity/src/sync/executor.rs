//! One remote mutation per record

use std::fmt;
use std::time::Duration;

use crate::models::{AccountUpdate, Record};
use crate::provider::{ErrorClass, IdentityProvider, ProviderError};

/// The mutation a run applies to every record
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create,
    /// Partial update; fields absent from the payload are left untouched
    Update(AccountUpdate),
    Delete,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update(_) => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a single attempt
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Success,
    /// The account already exists; benign for idempotent migrations
    Conflict(String),
    /// Transient; carries the provider's retry hint if it sent one
    RateLimited(Option<Duration>),
    Fatal(ProviderError),
}

impl From<ProviderError> for OperationOutcome {
    fn from(error: ProviderError) -> Self {
        match error.class() {
            ErrorClass::Conflict => Self::Conflict(error.to_string()),
            ErrorClass::RateLimited => Self::RateLimited(error.retry_after()),
            ErrorClass::Fatal => Self::Fatal(error),
        }
    }
}

/// Invokes exactly one provider mutation per call
///
/// Credential material is handed to the provider as-is; the executor never
/// hashes anything. A delete of an already-deleted account comes back from
/// the provider as a failure and is reported unchanged.
pub struct Executor<'a> {
    provider: &'a dyn IdentityProvider,
}

impl<'a> Executor<'a> {
    pub fn new(provider: &'a dyn IdentityProvider) -> Self {
        Self { provider }
    }

    pub fn execute(&self, record: &Record, operation: &Operation) -> OperationOutcome {
        let result = match operation {
            Operation::Create => self.provider.create_account(record).map(drop),
            Operation::Update(update) => self
                .provider
                .update_account(record.id.as_str(), &update.for_account(record.username.as_deref()))
                .map(drop),
            Operation::Delete => self.provider.delete_account(record.id.as_str()),
        };

        match result {
            Ok(()) => OperationOutcome::Success,
            Err(error) => error.into(),
        }
    }
}
