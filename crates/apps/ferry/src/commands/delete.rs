use std::path::Path;

use anyhow::{Context, Result};
use identity::sync::{
    BatchDriver, CursorCheckpoint, Executor, Operation, OutcomeSink, PagedSource, RetryController, RunSummary,
    SyncOptions,
};
use identity::IdentityProvider;
use log::info;

use super::{RunContext, report, run_log_path};

/// Delete up to `limit` accounts, paging `batch_size` at a time
pub fn execute(ctx: &RunContext, limit: usize, batch_size: Option<usize>, checkpoint: Option<&Path>) -> Result<()> {
    let provider = ctx.provider();
    let batch_size = ctx.page_size(batch_size, PagedSource::DEFAULT_PAGE_SIZE);
    let summary = run(
        ctx,
        provider.as_ref(),
        limit,
        batch_size,
        checkpoint,
        &run_log_path("delete"),
    )?;
    report(&summary);
    Ok(())
}

pub fn run(
    ctx: &RunContext,
    provider: &dyn IdentityProvider,
    limit: usize,
    batch_size: usize,
    checkpoint: Option<&Path>,
    log: &Path,
) -> Result<RunSummary> {
    let total = provider
        .count_accounts()
        .context("Failed to count accounts before deleting")?;
    info!(
        "{} accounts on the provider; deleting up to {} in pages of {}",
        total, limit, batch_size
    );

    let controller = RetryController::new(Executor::new(provider), ctx.policy.clone(), &ctx.sleeper);
    let options = SyncOptions {
        limit: Some(limit),
        ..Default::default()
    };
    let driver = BatchDriver::new(controller, OutcomeSink::to_file(log)?, options);

    let mut source = PagedSource::new(provider, batch_size);
    if let Some(path) = checkpoint {
        source = source.with_checkpoint(CursorCheckpoint::new(path))?;
    }

    driver.run(&mut source, &Operation::Delete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::test_context;
    use identity::{InMemoryProvider, ProviderError, read_failure_log};
    use tempfile::TempDir;

    #[test]
    fn test_failed_deletes_are_logged_to_file() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("delete-log.jsonl");
        let provider = InMemoryProvider::with_accounts(2);
        let failing = provider.accounts()[0].id.clone();
        provider.script_errors(failing.as_str(), [ProviderError::status(500, "internal error")]);

        let summary = run(&test_context(None), &provider, 200, 50, None, &log).unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failure_log.as_deref(), Some(log.as_path()));
        let logged = read_failure_log(&log).unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].record_id.as_str(), failing);
    }

    #[test]
    fn test_zero_limit_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("delete-log.jsonl");
        let provider = InMemoryProvider::with_accounts(3);

        let summary = run(&test_context(None), &provider, 0, 50, None, &log).unwrap();

        assert_eq!(summary.processed, 0);
        assert_eq!(provider.len(), 3);
        assert!(!log.exists());
    }

    #[test]
    fn test_clean_run_leaves_no_log() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("delete-log.jsonl");
        let provider = InMemoryProvider::with_accounts(5);

        let summary = run(&test_context(Some(2)), &provider, 4, 2, None, &log).unwrap();

        assert_eq!(summary.succeeded, 4);
        assert_eq!(provider.len(), 1);
        assert!(summary.failure_log.is_none());
        assert!(!log.exists());
    }
}
