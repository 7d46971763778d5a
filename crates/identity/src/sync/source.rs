//! Record sources: a loaded dataset or a paginated provider listing

use anyhow::Result;
use log::debug;
use std::collections::VecDeque;

use super::checkpoint::CursorCheckpoint;
use crate::models::{Record, RemoteAccount};
use crate::provider::{IdentityProvider, PageRequest};

/// Supplies the ordered records of a run
pub trait RecordSource {
    /// Next record, or `None` at end of sequence
    ///
    /// Provider failures are returned as [`ProviderError`](crate::provider::ProviderError)
    /// inside the `anyhow::Error` so callers can tell rate limits apart.
    fn next_record(&mut self) -> Result<Option<Record>>;

    /// Called once after the source reported end of sequence
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A pre-loaded, already validated dataset
pub struct FiniteSource {
    records: std::vec::IntoIter<Record>,
}

impl FiniteSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into_iter(),
        }
    }

    /// Records not yet handed out
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl RecordSource for FiniteSource {
    fn next_record(&mut self) -> Result<Option<Record>> {
        Ok(self.records.next())
    }
}

/// Streams accounts from the provider page by page
///
/// Each request asks for accounts strictly after the last consumed id, so
/// pages never overlap. A short page is not the end; only an empty page is.
pub struct PagedSource<'a> {
    provider: &'a dyn IdentityProvider,
    page_size: usize,
    /// Id of the last account handed out
    cursor: Option<String>,
    buffer: VecDeque<RemoteAccount>,
    exhausted: bool,
    pages_fetched: usize,
    checkpoint: Option<CursorCheckpoint>,
}

impl<'a> PagedSource<'a> {
    pub const DEFAULT_PAGE_SIZE: usize = 50;

    pub fn new(provider: &'a dyn IdentityProvider, page_size: usize) -> Self {
        Self {
            provider,
            page_size: page_size.max(1),
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
            pages_fetched: 0,
            checkpoint: None,
        }
    }

    /// Persist the cursor at every page boundary, resuming from a saved one
    pub fn with_checkpoint(mut self, checkpoint: CursorCheckpoint) -> Result<Self> {
        if let Some(cursor) = checkpoint.load()? {
            debug!("Resuming listing after {} from {}", cursor, checkpoint.path().display());
            self.cursor = Some(cursor);
        }
        self.checkpoint = Some(checkpoint);
        Ok(self)
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Page requests that returned successfully, including the final empty one
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn fetch_page(&mut self) -> Result<()> {
        if let (Some(checkpoint), Some(cursor)) = (&self.checkpoint, &self.cursor) {
            checkpoint.save(cursor)?;
        }

        let request = match &self.cursor {
            Some(cursor) => PageRequest::after(self.page_size, cursor),
            None => PageRequest::first(self.page_size),
        };
        let page = self.provider.list_accounts(&request)?;
        self.pages_fetched += 1;
        debug!(
            "Fetched page {} ({} accounts) after {:?}",
            self.pages_fetched,
            page.len(),
            request.after
        );

        if page.is_empty() {
            self.exhausted = true;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl RecordSource for PagedSource<'_> {
    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(account) = self.buffer.pop_front() {
                self.cursor = Some(account.id.clone());
                return Ok(Some(account.into_record()));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page()?;
        }
    }

    fn finish(&mut self) -> Result<()> {
        match &self.checkpoint {
            Some(checkpoint) => checkpoint.clear(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{InMemoryProvider, ProviderError};
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn drain(source: &mut dyn RecordSource) -> Vec<String> {
        let mut ids = Vec::new();
        while let Some(record) = source.next_record().unwrap() {
            ids.push(record.id.to_string());
        }
        ids
    }

    #[test]
    fn test_finite_source() {
        let mut source = FiniteSource::new(vec![
            Record::new("1", "a@example.com"),
            Record::new("2", "b@example.com"),
        ]);
        assert_eq!(source.remaining(), 2);
        assert_eq!(drain(&mut source), vec!["1", "2"]);
        assert!(source.next_record().unwrap().is_none());
    }

    #[test]
    fn test_paged_source_requests() {
        let provider = InMemoryProvider::with_accounts(7);
        let mut source = PagedSource::new(&provider, 3);

        let ids = drain(&mut source);

        assert_eq!(ids.len(), 7);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 7);

        // ceil(7/3) = 3 non-empty pages plus one empty page
        let requests = provider.list_calls();
        assert_eq!(requests.len(), 4);
        assert_eq!(source.pages_fetched(), 4);
        assert_eq!(requests[0].after, None);
        assert_eq!(requests[1].after.as_deref(), Some(ids[2].as_str()));
        assert_eq!(requests[2].after.as_deref(), Some(ids[5].as_str()));
        assert_eq!(requests[3].after.as_deref(), Some(ids[6].as_str()));
    }

    #[test]
    fn test_short_page_is_not_the_end() {
        let provider = InMemoryProvider::with_accounts(4);
        let mut source = PagedSource::new(&provider, 10);

        assert_eq!(drain(&mut source).len(), 4);
        // the short first page is followed by one more request
        assert_eq!(provider.list_calls().len(), 2);
    }

    #[test]
    fn test_list_error_keeps_cursor() {
        let provider = InMemoryProvider::with_accounts(2);
        let mut source = PagedSource::new(&provider, 1);

        let first = source.next_record().unwrap().unwrap();
        provider.script_list_errors([ProviderError::rate_limited(None)]);

        let error = source.next_record().unwrap_err();
        assert!(error.downcast_ref::<ProviderError>().is_some());
        assert_eq!(source.cursor(), Some(first.id.as_str()));

        let second = source.next_record().unwrap().unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_checkpoint_resume() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cursor.json");
        let provider = InMemoryProvider::with_accounts(6);

        let mut first_run = PagedSource::new(&provider, 2)
            .with_checkpoint(CursorCheckpoint::new(&path))
            .unwrap();
        let consumed: Vec<String> = (0..3)
            .map(|_| first_run.next_record().unwrap().unwrap().id.to_string())
            .collect();
        // third record came from the second page, so the first page boundary was saved
        let saved = CursorCheckpoint::new(&path).load().unwrap();
        assert_eq!(saved.as_deref(), Some(consumed[1].as_str()));

        let mut resumed = PagedSource::new(&provider, 2)
            .with_checkpoint(CursorCheckpoint::new(&path))
            .unwrap();
        let rest = drain(&mut resumed);
        assert_eq!(rest.len(), 4);
        assert_eq!(rest[0], consumed[2]);

        resumed.finish().unwrap();
        assert!(!path.exists());
    }
}
