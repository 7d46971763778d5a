//! In-memory provider implementation
//!
//! Behaves like the real provider for the parts the sync engine relies on:
//! external ids are unique (422 on reuse), unknown ids are 404, listings are
//! ordered by id and honor the page cursor. Failures can be scripted per key
//! and every call is recorded, which makes it the backbone of the engine
//! tests and of `--dry-run`.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{IdentityProvider, PageRequest, ProviderError};
use crate::models::{AccountUpdate, Record, RemoteAccount};

/// A call made against the in-memory provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Create { external_id: String },
    Update { id: String },
    Delete { id: String },
    List { limit: usize, after: Option<String> },
    Count,
}

#[derive(Default)]
struct State {
    accounts: BTreeMap<String, RemoteAccount>,
    external_ids: HashSet<String>,
    next_id: u64,
    /// Errors to return before the next real attempt, keyed by record or account id
    scripted: HashMap<String, VecDeque<ProviderError>>,
    scripted_list: VecDeque<ProviderError>,
    calls: Vec<ProviderCall>,
}

impl State {
    fn take_scripted(&mut self, key: &str) -> Option<ProviderError> {
        self.scripted.get_mut(key).and_then(VecDeque::pop_front)
    }

    fn insert(&mut self, mut account: RemoteAccount) -> RemoteAccount {
        if account.id.is_empty() {
            self.next_id += 1;
            account.id = format!("user_{:06}", self.next_id);
        }
        if let Some(external_id) = &account.external_id {
            self.external_ids.insert(external_id.clone());
        }
        self.accounts.insert(account.id.clone(), account.clone());
        account
    }
}

/// Deterministic in-process identity provider
#[derive(Default)]
pub struct InMemoryProvider {
    state: Mutex<State>,
}

impl InMemoryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider holding `count` accounts with sequential ids
    pub fn with_accounts(count: usize) -> Self {
        let provider = Self::new();
        for n in 1..=count {
            let mut account = RemoteAccount::new("");
            account.email_addresses = vec![format!("seed{n}@example.com")];
            provider.insert_account(account);
        }
        provider
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an account directly, bypassing scripting and call recording
    ///
    /// An empty id is replaced with the next generated one.
    pub fn insert_account(&self, account: RemoteAccount) -> RemoteAccount {
        self.state().insert(account)
    }

    /// Queue errors returned, in order, by the next calls addressing `key`
    ///
    /// `key` is the external id for creates and the account id for updates
    /// and deletes. Once the queue drains the call proceeds normally.
    pub fn script_errors(&self, key: impl Into<String>, errors: impl IntoIterator<Item = ProviderError>) {
        self.state()
            .scripted
            .entry(key.into())
            .or_default()
            .extend(errors);
    }

    /// Queue errors returned by the next listing calls
    pub fn script_list_errors(&self, errors: impl IntoIterator<Item = ProviderError>) {
        self.state().scripted_list.extend(errors);
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.clone()
    }

    /// Listing calls made so far
    pub fn list_calls(&self) -> Vec<PageRequest> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                ProviderCall::List { limit, after } => Some(PageRequest {
                    limit: *limit,
                    after: after.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Snapshot of the stored accounts, ordered by id
    pub fn accounts(&self) -> Vec<RemoteAccount> {
        self.state().accounts.values().cloned().collect()
    }

    pub fn account(&self, id: &str) -> Option<RemoteAccount> {
        self.state().accounts.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityProvider for InMemoryProvider {
    fn create_account(&self, record: &Record) -> Result<RemoteAccount, ProviderError> {
        let mut state = self.state();
        let external_id = record.id.as_str().to_string();
        state.calls.push(ProviderCall::Create {
            external_id: external_id.clone(),
        });

        if let Some(error) = state.take_scripted(&external_id) {
            return Err(error);
        }
        if state.external_ids.contains(&external_id) {
            return Err(ProviderError::already_exists(format!(
                "An account with external id {external_id} already exists"
            )));
        }

        let mut account = RemoteAccount::new("");
        account.external_id = Some(external_id);
        account.username = record.username.clone();
        account.email_addresses = record.emails.clone();
        Ok(state.insert(account))
    }

    fn update_account(&self, id: &str, update: &AccountUpdate) -> Result<RemoteAccount, ProviderError> {
        let mut state = self.state();
        state.calls.push(ProviderCall::Update { id: id.to_string() });

        if let Some(error) = state.take_scripted(id) {
            return Err(error);
        }

        let account = state
            .accounts
            .get_mut(id)
            .ok_or_else(|| ProviderError::status(404, format!("No account with id {id}")))?;
        if let Some(username) = &update.username {
            account.username = Some(username.clone());
        }
        if let Some(emails) = &update.email_address {
            account.email_addresses = emails.clone();
        }
        Ok(account.clone())
    }

    fn delete_account(&self, id: &str) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.calls.push(ProviderCall::Delete { id: id.to_string() });

        if let Some(error) = state.take_scripted(id) {
            return Err(error);
        }

        let account = state
            .accounts
            .remove(id)
            .ok_or_else(|| ProviderError::status(404, format!("No account with id {id}")))?;
        if let Some(external_id) = &account.external_id {
            state.external_ids.remove(external_id);
        }
        Ok(())
    }

    fn list_accounts(&self, page: &PageRequest) -> Result<Vec<RemoteAccount>, ProviderError> {
        let mut state = self.state();
        state.calls.push(ProviderCall::List {
            limit: page.limit,
            after: page.after.clone(),
        });

        if let Some(error) = state.scripted_list.pop_front() {
            return Err(error);
        }

        let accounts = match &page.after {
            Some(cursor) => state
                .accounts
                .range::<String, _>((
                    std::ops::Bound::Excluded(cursor.clone()),
                    std::ops::Bound::Unbounded,
                ))
                .map(|(_, a)| a.clone())
                .take(page.limit)
                .collect(),
            None => state.accounts.values().take(page.limit).cloned().collect(),
        };
        Ok(accounts)
    }

    fn count_accounts(&self) -> Result<u64, ProviderError> {
        let mut state = self.state();
        state.calls.push(ProviderCall::Count);
        Ok(state.accounts.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_conflict() {
        let provider = InMemoryProvider::new();
        let record = Record::new("legacy-1", "a@example.com");

        let created = provider.create_account(&record).unwrap();
        assert_eq!(created.external_id.as_deref(), Some("legacy-1"));

        let again = provider.create_account(&record).unwrap_err();
        assert_eq!(again.status_code(), Some(422));
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn test_scripted_errors_drain_in_order() {
        let provider = InMemoryProvider::new();
        provider.script_errors(
            "legacy-1",
            [ProviderError::rate_limited(None), ProviderError::status(500, "boom")],
        );
        let record = Record::new("legacy-1", "a@example.com");

        assert_eq!(provider.create_account(&record).unwrap_err().status_code(), Some(429));
        assert_eq!(provider.create_account(&record).unwrap_err().status_code(), Some(500));
        assert!(provider.create_account(&record).is_ok());
        assert_eq!(provider.calls().len(), 3);
    }

    #[test]
    fn test_list_honors_cursor_and_limit() {
        let provider = InMemoryProvider::with_accounts(5);

        let first = provider.list_accounts(&PageRequest::first(2)).unwrap();
        assert_eq!(first.len(), 2);

        let cursor = first[1].id.clone();
        let second = provider.list_accounts(&PageRequest::after(10, &cursor)).unwrap();
        assert_eq!(second.len(), 3);
        assert!(second.iter().all(|a| a.id > cursor));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let provider = InMemoryProvider::with_accounts(1);
        let id = provider.accounts()[0].id.clone();

        provider.delete_account(&id).unwrap();
        let error = provider.delete_account(&id).unwrap_err();
        assert_eq!(error.status_code(), Some(404));
        assert_eq!(provider.count_accounts().unwrap(), 0);
    }

    #[test]
    fn test_update_leaves_absent_fields() {
        let provider = InMemoryProvider::new();
        let mut seeded = RemoteAccount::new("user_a");
        seeded.username = Some("before".to_string());
        seeded.email_addresses = vec!["keep@example.com".to_string()];
        provider.insert_account(seeded);

        let update = AccountUpdate {
            username: Some("after".to_string()),
            ..Default::default()
        };
        let updated = provider.update_account("user_a", &update).unwrap();

        assert_eq!(updated.username.as_deref(), Some("after"));
        assert_eq!(updated.email_addresses, vec!["keep@example.com"]);
    }
}
