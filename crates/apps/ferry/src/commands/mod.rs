pub mod count;
pub mod create;
pub mod delete;
pub mod update;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use identity::sync::{RunSummary, ThreadSleeper};
use identity::{IdentityProvider, InMemoryProvider, RetryPolicy, Settings};
use log::{info, warn};

use crate::GlobalArgs;

/// Everything a command needs to talk to the provider
pub struct RunContext {
    pub settings: Settings,
    pub policy: RetryPolicy,
    pub dry_run: bool,
    pub sleeper: ThreadSleeper,
}

impl RunContext {
    /// Resolve settings and apply command-line overrides on top
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let mut settings = if args.dry_run {
            Settings::load_offline()?
        } else {
            Settings::load()?
        };
        if let Some(ms) = args.delay_ms {
            settings.delay = Duration::from_millis(ms);
        }
        if let Some(ms) = args.retry_delay_ms {
            settings.retry_delay = Duration::from_millis(ms);
        }

        let policy = RetryPolicy {
            max_attempts: args.max_attempts,
            ..settings.retry_policy()
        };

        Ok(Self {
            settings,
            policy,
            dry_run: args.dry_run,
            sleeper: ThreadSleeper,
        })
    }

    /// HTTP client, or an empty in-memory provider for dry runs
    pub fn provider(&self) -> Box<dyn IdentityProvider> {
        if self.dry_run {
            warn!("Dry run: no requests will reach {}", self.settings.api_url);
            Box::new(InMemoryProvider::new())
        } else {
            Box::new(self.settings.provider())
        }
    }

    /// Page size from the command line, else the settings file, else `default`
    pub fn page_size(&self, flag: Option<usize>, default: usize) -> usize {
        flag.filter(|&size| size > 0)
            .or(self.settings.page_size)
            .unwrap_or(default)
    }
}

/// Timestamped per-run failure log in the working directory
pub fn run_log_path(kind: &str) -> PathBuf {
    PathBuf::from(format!("{}-log-{}.jsonl", kind, Utc::now().format("%Y%m%dT%H%M%S%.3fZ")))
}

/// Print the final counters of a run
pub fn report(summary: &RunSummary) {
    println!(
        "{} succeeded, {} already existed, {} failed ({} processed in {} ms)",
        summary.succeeded, summary.conflicted, summary.failed, summary.processed, summary.duration_ms
    );
    if summary.failed > 0
        && let Some(path) = &summary.failure_log
    {
        info!("Failed records are listed in {}", path.display());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use identity::settings::{EnvOverrides, SettingsFile};

    /// Context with no pacing, as used by command tests
    pub(crate) fn test_context(page_size: Option<usize>) -> RunContext {
        let file = SettingsFile {
            page_size,
            ..Default::default()
        };
        let env = EnvOverrides {
            secret_key: Some("sk_test".to_string()),
            ..Default::default()
        };
        RunContext {
            settings: Settings::from_parts(file, env).unwrap(),
            policy: RetryPolicy {
                pacing: None,
                ..Default::default()
            },
            dry_run: true,
            sleeper: ThreadSleeper,
        }
    }

    #[test]
    fn test_page_size_precedence() {
        let ctx = test_context(None);
        assert_eq!(ctx.page_size(None, 50), 50);
        assert_eq!(ctx.page_size(Some(10), 50), 10);
        assert_eq!(ctx.page_size(Some(0), 50), 50);

        let ctx = test_context(Some(120));
        assert_eq!(ctx.page_size(None, 50), 120);
        assert_eq!(ctx.page_size(Some(10), 50), 10);
    }

    #[test]
    fn test_run_log_name() {
        let name = run_log_path("delete").to_string_lossy().into_owned();
        assert!(name.starts_with("delete-log-"));
        assert!(name.ends_with(".jsonl"));
    }
}
