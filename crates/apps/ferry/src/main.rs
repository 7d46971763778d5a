//! Ferry - bulk account synchronization against an identity provider
//!
//! Creates accounts from a dataset file, or pages through the provider's
//! existing accounts to update or delete them.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use identity::UsernameRewrite;

use commands::RunContext;

#[derive(Parser, Debug)]
#[command(
    name = "ferry",
    version,
    about = "Bulk create, update and delete identity-provider accounts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Pause between records in milliseconds (overrides DELAY_MS)
    #[arg(long, global = true)]
    pub delay_ms: Option<u64>,

    /// Cooldown after a rate limit in milliseconds (overrides RETRY_DELAY_MS)
    #[arg(long, global = true)]
    pub retry_delay_ms: Option<u64>,

    /// Give up on a record after this many rate-limited attempts
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// Run against an in-memory provider instead of the real API
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create accounts from a dataset file
    Create {
        /// JSON array of records
        dataset: PathBuf,
        /// Where to write all failures as one JSON array at the end of the run
        #[arg(long, default_value = "errors.json")]
        errors: PathBuf,
        /// Append failures to this JSON-lines file as they happen
        #[arg(long)]
        failure_log: Option<PathBuf>,
        /// Only process records listed in a previous failure log
        #[arg(long)]
        only_failed: Option<PathBuf>,
    },
    /// Apply a partial update to every account, or to one
    Update {
        /// JSON object with the fields to change
        #[arg(long)]
        patch: Option<PathBuf>,
        /// Rewrite each account's username prefix, e.g. `sc:u` turns `sam` into `uam`
        #[arg(long, value_name = "PREFIXES:REPLACEMENT")]
        rewrite_username: Option<UsernameRewrite>,
        /// Update only this account id
        #[arg(long)]
        user: Option<String>,
        /// Accounts per listing request [default: settings page_size, else 200]
        #[arg(long)]
        batch_size: Option<usize>,
        /// Save the listing cursor here and resume from it
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
    /// Delete accounts, oldest first
    Delete {
        /// Maximum number of accounts to delete
        #[arg(default_value_t = 200)]
        limit: usize,
        /// Accounts per listing request [default: settings page_size, else 50]
        batch_size: Option<usize>,
        /// Save the listing cursor here and resume from it
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
    /// Print the number of accounts on the provider
    Count,
}

fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables take precedence
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.global.log_level))
        .format_timestamp_millis()
        .init();

    let ctx = RunContext::from_args(&cli.global)?;

    match cli.command {
        Commands::Create {
            dataset,
            errors,
            failure_log,
            only_failed,
        } => commands::create::execute(
            &ctx,
            &dataset,
            &errors,
            failure_log.as_deref(),
            only_failed.as_deref(),
        ),
        Commands::Update {
            patch,
            rewrite_username,
            user,
            batch_size,
            checkpoint,
        } => commands::update::execute(
            &ctx,
            patch.as_deref(),
            rewrite_username,
            user.as_deref(),
            batch_size,
            checkpoint.as_deref(),
        ),
        Commands::Delete {
            limit,
            batch_size,
            checkpoint,
        } => commands::delete::execute(&ctx, limit, batch_size, checkpoint.as_deref()),
        Commands::Count => commands::count::execute(&ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_delete_positional_defaults() {
        let cli = Cli::try_parse_from(["ferry", "delete"]).unwrap();
        match cli.command {
            Commands::Delete {
                limit, batch_size, ..
            } => {
                assert_eq!(limit, 200);
                assert_eq!(batch_size, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_delete_positional_overrides() {
        let cli = Cli::try_parse_from(["ferry", "delete", "10", "5"]).unwrap();
        match cli.command {
            Commands::Delete {
                limit, batch_size, ..
            } => {
                assert_eq!(limit, 10);
                assert_eq!(batch_size, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_create_defaults_and_global_flags() {
        let cli = Cli::try_parse_from([
            "ferry",
            "create",
            "users.json",
            "--dry-run",
            "--retry-delay-ms",
            "500",
        ])
        .unwrap();

        assert!(cli.global.dry_run);
        assert_eq!(cli.global.retry_delay_ms, Some(500));
        assert_eq!(cli.global.log_level, "info");
        match cli.command {
            Commands::Create {
                dataset,
                errors,
                failure_log,
                only_failed,
            } => {
                assert_eq!(dataset, PathBuf::from("users.json"));
                assert_eq!(errors, PathBuf::from("errors.json"));
                assert!(failure_log.is_none());
                assert!(only_failed.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_update_single_user() {
        let cli = Cli::try_parse_from(["ferry", "update", "--user", "user_123"]).unwrap();
        match cli.command {
            Commands::Update {
                user, batch_size, ..
            } => {
                assert_eq!(user.as_deref(), Some("user_123"));
                assert_eq!(batch_size, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_update_username_rewrite() {
        let cli = Cli::try_parse_from(["ferry", "update", "--rewrite-username", "sc:u"]).unwrap();
        match cli.command {
            Commands::Update {
                rewrite_username, ..
            } => {
                let rewrite = rewrite_username.unwrap();
                assert_eq!(rewrite.prefixes, vec!['s', 'c']);
                assert_eq!(rewrite.replacement, "u");
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["ferry", "update", "--rewrite-username", "u"]).is_err());
    }

    #[test]
    fn test_max_attempts_must_be_positive() {
        assert!(Cli::try_parse_from(["ferry", "count", "--max-attempts", "0"]).is_err());

        let cli = Cli::try_parse_from(["ferry", "count", "--max-attempts", "3"]).unwrap();
        assert_eq!(cli.global.max_attempts, Some(3));
    }

    #[test]
    fn test_create_requires_dataset() {
        assert!(Cli::try_parse_from(["ferry", "create"]).is_err());
    }
}
