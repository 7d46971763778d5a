use std::path::Path;

use anyhow::{Context, Result, bail};
use identity::sync::{
    BatchDriver, CursorCheckpoint, Executor, Operation, OutcomeSink, PagedSource, RetryController, RunSummary,
    SyncOptions,
};
use identity::{AccountUpdate, IdentityProvider, RemoteAccount, UsernameRewrite, dataset};
use log::info;

use super::{RunContext, report, run_log_path};

/// Accounts per listing request unless configured otherwise
const DEFAULT_BATCH_SIZE: usize = 200;

/// Where the accounts to update come from
pub enum Target<'a> {
    /// Every account, paged
    All {
        batch_size: usize,
        checkpoint: Option<&'a Path>,
    },
    /// One account by provider id
    Single(&'a str),
}

/// Apply a partial update to every account, or to a single one
pub fn execute(
    ctx: &RunContext,
    patch: Option<&Path>,
    rewrite: Option<UsernameRewrite>,
    user: Option<&str>,
    batch_size: Option<usize>,
    checkpoint: Option<&Path>,
) -> Result<()> {
    let update = build_update(patch, rewrite)?;
    let target = match user {
        Some(id) => Target::Single(id),
        None => Target::All {
            batch_size: ctx.page_size(batch_size, DEFAULT_BATCH_SIZE),
            checkpoint,
        },
    };

    let provider = ctx.provider();
    let summary = run(ctx, provider.as_ref(), update, target, &run_log_path("update"))?;
    report(&summary);
    Ok(())
}

pub fn run(
    ctx: &RunContext,
    provider: &dyn IdentityProvider,
    update: AccountUpdate,
    target: Target<'_>,
    log: &Path,
) -> Result<RunSummary> {
    let operation = Operation::Update(update);
    let controller = RetryController::new(Executor::new(provider), ctx.policy.clone(), &ctx.sleeper);
    let driver = BatchDriver::new(controller, OutcomeSink::to_file(log)?, SyncOptions::default());

    match target {
        Target::Single(id) => driver.run_single(&RemoteAccount::new(id).into_record(), &operation),
        Target::All {
            batch_size,
            checkpoint,
        } => {
            let mut source = PagedSource::new(provider, batch_size);
            if let Some(path) = checkpoint {
                source = source.with_checkpoint(CursorCheckpoint::new(path))?;
            }
            driver.run(&mut source, &operation)
        }
    }
}

/// Combine the patch file and username rewrite; an empty update is refused
fn build_update(patch: Option<&Path>, rewrite: Option<UsernameRewrite>) -> Result<AccountUpdate> {
    let mut update = match patch {
        Some(path) => {
            let update: AccountUpdate = config::load_json_file(path)
                .with_context(|| format!("Failed to load update payload {}", path.display()))?;
            info!("Loaded update payload from {}", path.display());
            update
        }
        None if rewrite.is_some() => AccountUpdate::default(),
        None => bail!("No update given; pass --patch <file.json> or --rewrite-username"),
    };
    update.username_rewrite = rewrite;

    if update.is_empty() {
        bail!("Update sets no fields");
    }
    dataset::validate_update(&update)?;
    Ok(update)
}
