//! Batch driver: walks a record source and dispatches one record at a time
//!
//! Records are processed strictly sequentially, including any rate-limit
//! waits, so cooldowns apply to the whole run rather than per worker.

use anyhow::Result;
use log::{debug, info, warn};
use std::time::Instant;

use super::retry::{Resolution, Resolved, RetryController};
use super::sink::{FailureLogEntry, OutcomeSink, RunSummary, RunTally};
use super::executor::Operation;
use super::source::RecordSource;
use crate::models::Record;
use crate::provider::{ErrorClass, ProviderError};

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Fetching,
    Dispatching,
    Draining,
    Done,
}

impl DriverState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: DriverState) -> bool {
        use DriverState::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Dispatching)
                | (Dispatching, Fetching)
                | (Fetching, Draining)
                | (Dispatching, Draining)
                | (Draining, Done)
        )
    }
}

/// Options for a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Stop as soon as this many records succeeded
    pub limit: Option<usize>,
    /// Log a progress line every this many records (0 disables)
    pub progress_every: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            limit: None,
            progress_every: 10,
        }
    }
}

/// Orchestrates one run: source -> retry controller -> sink
///
/// Owns the run's counters; they become an immutable [`RunSummary`] when
/// the run completes, and a driver cannot be reused for another run.
pub struct BatchDriver<'a> {
    controller: RetryController<'a>,
    sink: OutcomeSink,
    options: SyncOptions,
    tally: RunTally,
    state: DriverState,
}

impl<'a> BatchDriver<'a> {
    pub fn new(controller: RetryController<'a>, sink: OutcomeSink, options: SyncOptions) -> Self {
        Self {
            controller,
            sink,
            options,
            tally: RunTally::default(),
            state: DriverState::Idle,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    fn transition(&mut self, next: DriverState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal driver transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Driver {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Process every record from `source` with `operation`
    ///
    /// A record's failure never aborts the run. A rate-limited page fetch
    /// waits one cooldown and asks for the same page again; any other
    /// source failure ends the run with that error once the sink is flushed.
    pub fn run(mut self, source: &mut dyn RecordSource, operation: &Operation) -> Result<RunSummary> {
        let start = Instant::now();
        info!("Starting {} run", operation);
        self.transition(DriverState::Fetching);

        let mut previous: Option<Resolution> = None;
        let mut source_error = None;

        loop {
            if self.limit_reached() {
                info!("Reached limit of {} after {} records", self.tally.succeeded, self.tally.processed);
                break;
            }

            let record = match source.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => {
                    source.finish()?;
                    break;
                }
                Err(error) => {
                    let rate_limit_hint = error
                        .downcast_ref::<ProviderError>()
                        .filter(|e| e.class() == ErrorClass::RateLimited)
                        .map(ProviderError::retry_after);
                    match rate_limit_hint {
                        Some(hint) => {
                            self.controller.cool_down(hint);
                            continue;
                        }
                        None => {
                            source_error = Some(error);
                            break;
                        }
                    }
                }
            };

            self.transition(DriverState::Dispatching);
            if let Some(previous) = &previous {
                self.controller.pace(previous);
            }

            let resolution = self.dispatch(&record, operation)?;
            previous = Some(resolution);
            self.transition(DriverState::Fetching);
        }

        let summary = self.drain(start)?;
        match source_error {
            Some(error) => Err(error.context(format!(
                "Run aborted after {} records while fetching the next one",
                summary.processed
            ))),
            None => Ok(summary),
        }
    }

    /// Dispatch exactly one record, skipping source iteration
    pub fn run_single(mut self, record: &Record, operation: &Operation) -> Result<RunSummary> {
        let start = Instant::now();
        info!("Starting single-record {} for {}", operation, record.id);
        self.transition(DriverState::Fetching);
        self.transition(DriverState::Dispatching);
        self.dispatch(record, operation)?;
        self.drain(start)
    }

    fn limit_reached(&self) -> bool {
        self.options
            .limit
            .is_some_and(|limit| self.tally.succeeded >= limit)
    }

    fn dispatch(&mut self, record: &Record, operation: &Operation) -> Result<Resolution> {
        let resolution = self.controller.run(record, operation);

        self.tally.processed += 1;
        self.tally.rate_limit_waits += u64::from(resolution.rate_limited);
        match &resolution.outcome {
            Resolved::Success => self.tally.succeeded += 1,
            Resolved::Conflict(reason) => {
                debug!("{} already exists: {}", record.id, reason);
                self.tally.conflicted += 1;
            }
            Resolved::Fatal(error) => {
                warn!("Failed to {} {}: {}", operation, record.id, error);
                self.tally.failed += 1;
                self.sink
                    .record_failure(FailureLogEntry::new(record.id.clone(), error))?;
            }
        }

        let every = self.options.progress_every;
        if every > 0 && self.tally.processed % every == 0 {
            info!(
                "Processed {} ({} ok, {} existing, {} failed)",
                self.tally.processed, self.tally.succeeded, self.tally.conflicted, self.tally.failed
            );
        }

        Ok(resolution)
    }

    fn drain(mut self, start: Instant) -> Result<RunSummary> {
        self.transition(DriverState::Draining);
        let sink = std::mem::replace(&mut self.sink, OutcomeSink::in_memory());
        let summary = sink.finalize(std::mem::take(&mut self.tally), start.elapsed())?;
        info!(
            "Run complete: {} succeeded, {} already existed, {} failed ({} processed, {} rate-limit waits, {} ms)",
            summary.succeeded,
            summary.conflicted,
            summary.failed,
            summary.processed,
            summary.rate_limit_waits,
            summary.duration_ms
        );
        self.transition(DriverState::Done);
        Ok(summary)
    }
}
