//! Rate-limit retry and request pacing
//!
//! A rate-limited attempt waits out a cooldown and is retried with the same
//! record and operation. By default there is no attempt cap and no backoff
//! growth: rate limits are assumed to be bursty and a fixed cooldown clears
//! them. A cap and exponential growth can be configured; when the cap is hit
//! the record resolves as a failure instead of being dropped.

use log::{debug, warn};
use std::time::Duration;

use super::executor::{Executor, Operation, OperationOutcome};
use crate::models::Record;
use crate::provider::ProviderError;

/// Blocks the calling flow for a while
///
/// Abstracted so tests can observe cooldowns without waiting for them.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How the cooldown changes across consecutive rate-limited attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Always wait the base cooldown
    Fixed,
    /// Double the cooldown after each rate-limited attempt, up to `max`
    Exponential { max: Duration },
}

/// Retry and pacing configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after a rate-limited attempt
    pub cooldown: Duration,
    /// Wait between distinct records; `None` disables pacing
    pub pacing: Option<Duration>,
    /// Give up after this many rate-limited attempts; `None` retries forever
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            cooldown: Self::DEFAULT_COOLDOWN,
            pacing: Some(Self::DEFAULT_PACING),
            max_attempts: None,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(10_000);
    pub const DEFAULT_PACING: Duration = Duration::from_millis(1_000);

    /// Cooldown before retry number `attempt` (0-based), honoring the hint
    ///
    /// Never shorter than the configured cooldown.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed => self.cooldown,
            Backoff::Exponential { max } => {
                let factor = 2u32.saturating_pow(attempt);
                self.cooldown.saturating_mul(factor).min(max.max(self.cooldown))
            }
        };
        hint.map_or(base, |h| h.max(base))
    }
}

/// Outcome of a record once rate limits are resolved
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Success,
    Conflict(String),
    Fatal(ProviderError),
}

/// What happened to one record, including how often it was throttled
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub outcome: Resolved,
    /// Number of rate-limited attempts waited out for this record
    pub rate_limited: u32,
}

/// Wraps the executor with rate-limit retry and inter-record pacing
pub struct RetryController<'a> {
    executor: Executor<'a>,
    policy: RetryPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> RetryController<'a> {
    pub fn new(executor: Executor<'a>, policy: RetryPolicy, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            executor,
            policy,
            sleeper,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the operation for one record until it resolves
    pub fn run(&self, record: &Record, operation: &Operation) -> Resolution {
        let mut rate_limited: u32 = 0;

        loop {
            let hint = match self.executor.execute(record, operation) {
                OperationOutcome::Success => {
                    if rate_limited > 0 {
                        debug!("{} {} succeeded after {} rate-limited attempt(s)", operation, record.id, rate_limited);
                    }
                    return Resolution {
                        outcome: Resolved::Success,
                        rate_limited,
                    };
                }
                OperationOutcome::Conflict(reason) => {
                    return Resolution {
                        outcome: Resolved::Conflict(reason),
                        rate_limited,
                    };
                }
                OperationOutcome::Fatal(error) => {
                    return Resolution {
                        outcome: Resolved::Fatal(error),
                        rate_limited,
                    };
                }
                OperationOutcome::RateLimited(hint) => hint,
            };

            rate_limited += 1;
            if let Some(max) = self.policy.max_attempts
                && rate_limited >= max
            {
                warn!("{} {} still rate limited after {} attempt(s), giving up", operation, record.id, rate_limited);
                return Resolution {
                    outcome: Resolved::Fatal(ProviderError::Status {
                        status: ProviderError::TOO_MANY_REQUESTS,
                        code: Some("retries_exhausted".to_string()),
                        message: format!("rate limited on {rate_limited} consecutive attempts"),
                        retry_after: hint,
                    }),
                    rate_limited,
                };
            }

            let delay = self.policy.delay_for(rate_limited - 1, hint);
            warn!("Rate limited on {} {}, waiting {} ms before retrying", operation, record.id, delay.as_millis());
            self.sleeper.sleep(delay);
        }
    }

    /// Wait out the rate limit on a non-mutating request (e.g. a page fetch)
    pub fn cool_down(&self, hint: Option<Duration>) {
        let delay = self.policy.delay_for(0, hint);
        warn!("Rate limited while listing, waiting {} ms", delay.as_millis());
        self.sleeper.sleep(delay);
    }

    /// Pace before the next distinct record
    ///
    /// Skipped when the previous record already waited on a rate limit.
    pub fn pace(&self, previous: &Resolution) {
        if previous.rate_limited > 0 {
            return;
        }
        if let Some(pacing) = self.policy.pacing.filter(|p| !p.is_zero()) {
            self.sleeper.sleep(pacing);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::provider::{InMemoryProvider, ProviderCall};
    use std::sync::Mutex;

    /// Records requested sleeps instead of sleeping
    #[derive(Default)]
    pub(crate) struct RecordingSleeper {
        pub(crate) sleeps: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub(crate) fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            cooldown: Duration::from_millis(100),
            pacing: Some(Duration::from_millis(10)),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.cooldown, Duration::from_secs(10));
        assert_eq!(policy.pacing, Some(Duration::from_secs(1)));
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.backoff, Backoff::Fixed);
    }

    #[test]
    fn test_delay_fixed_and_hint() {
        let policy = policy();
        assert_eq!(policy.delay_for(0, None), Duration::from_millis(100));
        assert_eq!(policy.delay_for(7, None), Duration::from_millis(100));
        assert_eq!(policy.delay_for(0, Some(Duration::from_secs(2))), Duration::from_secs(2));
        assert_eq!(policy.delay_for(0, Some(Duration::from_millis(1))), Duration::from_millis(100));
    }

    #[test]
    fn test_delay_exponential_capped() {
        let policy = RetryPolicy {
            backoff: Backoff::Exponential {
                max: Duration::from_millis(500),
            },
            ..policy()
        };
        assert_eq!(policy.delay_for(0, None), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2, None), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3, None), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40, None), Duration::from_millis(500));
    }

    #[test]
    fn test_rate_limited_retries_until_success() {
        let provider = InMemoryProvider::new();
        provider.script_errors("legacy-1", (0..5).map(|_| ProviderError::rate_limited(None)));
        let sleeper = RecordingSleeper::default();
        let controller = RetryController::new(Executor::new(&provider), policy(), &sleeper);

        let resolution = controller.run(&Record::new("legacy-1", "a@example.com"), &Operation::Create);

        assert_eq!(resolution.outcome, Resolved::Success);
        assert_eq!(resolution.rate_limited, 5);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(100); 5]);
        assert_eq!(provider.calls().len(), 6);
    }

    #[test]
    fn test_conflict_and_fatal_return_immediately() {
        let provider = InMemoryProvider::new();
        provider.script_errors("a", [ProviderError::already_exists("taken")]);
        provider.script_errors("b", [ProviderError::status(500, "boom")]);
        let sleeper = RecordingSleeper::default();
        let controller = RetryController::new(Executor::new(&provider), policy(), &sleeper);

        let conflict = controller.run(&Record::new("a", "a@example.com"), &Operation::Create);
        assert!(matches!(conflict.outcome, Resolved::Conflict(_)));

        let fatal = controller.run(&Record::new("b", "b@example.com"), &Operation::Create);
        assert!(matches!(fatal.outcome, Resolved::Fatal(_)));

        assert!(sleeper.sleeps().is_empty());
        assert_eq!(provider.calls().len(), 2);
    }

    #[test]
    fn test_attempt_cap_escalates_to_fatal() {
        let provider = InMemoryProvider::new();
        provider.script_errors("legacy-1", (0..10).map(|_| ProviderError::rate_limited(None)));
        let sleeper = RecordingSleeper::default();
        let capped = RetryPolicy {
            max_attempts: Some(3),
            ..policy()
        };
        let controller = RetryController::new(Executor::new(&provider), capped, &sleeper);

        let resolution = controller.run(&Record::new("legacy-1", "a@example.com"), &Operation::Create);

        match resolution.outcome {
            Resolved::Fatal(error) => assert_eq!(error.status_code(), Some(429)),
            other => panic!("expected Fatal, got {other:?}"),
        }
        assert_eq!(resolution.rate_limited, 3);
        assert_eq!(sleeper.sleeps().len(), 2);
        assert_eq!(
            provider.calls(),
            vec![ProviderCall::Create { external_id: "legacy-1".into() }; 3]
        );
    }

    #[test]
    fn test_pacing_skipped_after_rate_limit() {
        let provider = InMemoryProvider::new();
        let sleeper = RecordingSleeper::default();
        let controller = RetryController::new(Executor::new(&provider), policy(), &sleeper);

        controller.pace(&Resolution {
            outcome: Resolved::Success,
            rate_limited: 0,
        });
        controller.pace(&Resolution {
            outcome: Resolved::Success,
            rate_limited: 2,
        });

        assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(10)]);
    }
}
