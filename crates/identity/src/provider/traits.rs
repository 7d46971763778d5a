//! Provider trait definitions

use super::ProviderError;
use crate::models::{AccountUpdate, Record, RemoteAccount};

/// One page of a cursor-based account listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum accounts to return
    pub limit: usize,
    /// Only return accounts whose id sorts strictly after this one
    pub after: Option<String>,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { limit, after: None }
    }

    pub fn after(limit: usize, cursor: impl Into<String>) -> Self {
        Self {
            limit,
            after: Some(cursor.into()),
        }
    }
}

/// Trait for the remote identity provider
///
/// Abstracts over the real HTTP API and the in-memory provider. Each mutating
/// method issues exactly one remote mutation and keeps no state between calls.
pub trait IdentityProvider: Send + Sync {
    /// Create an account from a record
    fn create_account(&self, record: &Record) -> Result<RemoteAccount, ProviderError>;

    /// Apply a partial update to an existing account
    fn update_account(&self, id: &str, update: &AccountUpdate) -> Result<RemoteAccount, ProviderError>;

    /// Delete an account
    fn delete_account(&self, id: &str) -> Result<(), ProviderError>;

    /// List accounts ordered by id, starting after the page cursor
    fn list_accounts(&self, page: &PageRequest) -> Result<Vec<RemoteAccount>, ProviderError>;

    /// Count all accounts
    fn count_accounts(&self) -> Result<u64, ProviderError>;
}
