use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use identity::sync::{
    BatchDriver, Executor, FiniteSource, Operation, OutcomeSink, RetryController, RunSummary, SyncOptions,
};
use identity::{IdentityProvider, Record, dataset, read_failure_log};
use log::{error, info};

use super::{RunContext, report};

/// Create one account per dataset record
///
/// The whole dataset is validated before the first request; a single bad
/// record rejects the run.
pub fn execute(
    ctx: &RunContext,
    dataset_path: &Path,
    errors: &Path,
    failure_log: Option<&Path>,
    only_failed: Option<&Path>,
) -> Result<()> {
    let mut records = match dataset::load(dataset_path) {
        Ok(records) => records,
        Err(e) => {
            for issue in e.issues() {
                error!("{}", issue);
            }
            return Err(e).with_context(|| format!("Failed to load dataset {}", dataset_path.display()));
        }
    };
    info!("Loaded {} records from {}", records.len(), dataset_path.display());

    if let Some(previous) = only_failed {
        let failures = read_failure_log(previous)?;
        records = dataset::retain_failed(records, &failures);
        info!("Retrying {} records listed in {}", records.len(), previous.display());
    }

    let log = failure_log.map_or_else(|| default_failure_log(errors), Path::to_path_buf);
    let provider = ctx.provider();
    let summary = run(ctx, provider.as_ref(), records, errors, &log)?;
    report(&summary);
    Ok(())
}

/// Create `records`, appending failures to `log` and exporting them to `errors`
pub fn run(
    ctx: &RunContext,
    provider: &dyn IdentityProvider,
    records: Vec<Record>,
    errors: &Path,
    log: &Path,
) -> Result<RunSummary> {
    let sink = OutcomeSink::to_file(log)?.with_export(errors);
    let controller = RetryController::new(Executor::new(provider), ctx.policy.clone(), &ctx.sleeper);
    let driver = BatchDriver::new(controller, sink, SyncOptions::default());

    driver.run(&mut FiniteSource::new(records), &Operation::Create)
}

/// JSON-lines log kept next to the errors export, e.g. `errors.jsonl`
fn default_failure_log(errors: &Path) -> PathBuf {
    let log = errors.with_extension("jsonl");
    if log == errors {
        errors.with_extension("failures.jsonl")
    } else {
        log
    }
}
