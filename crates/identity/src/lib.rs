//! Identity crate - bulk synchronization of provider accounts
//!
//! This crate provides:
//! - Domain models (Record, AccountUpdate, RemoteAccount)
//! - Dataset loading with all-or-nothing validation
//! - Identity provider client and an in-memory provider
//! - The batch sync engine (sources, retry/pacing, driver, failure log)
//! - Runtime settings
//!
//! It has no CLI dependencies; the `ferry` binary wires it together.

pub mod dataset;
pub mod models;
pub mod provider;
pub mod settings;
pub mod sync;

pub use dataset::DatasetError;
pub use models::{AccountUpdate, Credential, PasswordHasher, Record, RecordId, RemoteAccount, UsernameRewrite};
pub use provider::{HttpProvider, IdentityProvider, InMemoryProvider, PageRequest, ProviderError};
pub use settings::Settings;
pub use sync::{
    BatchDriver, CursorCheckpoint, Executor, FailureLogEntry, FiniteSource, Operation, OutcomeSink,
    PagedSource, RetryController, RetryPolicy, RunSummary, SyncOptions, ThreadSleeper,
    read_failure_log,
};
