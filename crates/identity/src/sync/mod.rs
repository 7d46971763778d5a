//! Batch synchronization engine
//!
//! Walks a record source, applies one provider mutation per record with
//! rate-limit retry and pacing, and accounts for every outcome.

mod checkpoint;
mod driver;
mod executor;
mod retry;
mod sink;
mod source;

pub use checkpoint::CursorCheckpoint;
pub use driver::{BatchDriver, DriverState, SyncOptions};
pub use executor::{Executor, Operation, OperationOutcome};
pub use retry::{Backoff, Resolution, Resolved, RetryController, RetryPolicy, Sleeper, ThreadSleeper};
pub use sink::{ErrorDetail, FailureLogEntry, OutcomeSink, RunSummary, RunTally, read_failure_log};
pub use source::{FiniteSource, PagedSource, RecordSource};
