// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The retry executor.

use std::future::Future;
use std::time::Duration;

use crate::backoff::Schedule;
use crate::rnd::Rnd;
use crate::{Backoff, Retryable};

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Policy for a [`Retrier`]: attempt budget and delay shape.
#[derive(Clone, Debug)]
pub struct RetryOptions {
    /// Number of *re*-attempts after the first failure; `max_retries: 2`
    /// means at most 3 invocations total.
    pub max_retries: u32,
    /// Shape of the delay sequence (default exponential).
    pub backoff: Backoff,
    /// First delay of the sequence (default 200 ms).
    pub base_delay: Duration,
    /// Cap applied to every delay (default 10 s; `None` disables the cap).
    pub max_delay: Option<Duration>,
    /// Randomize each delay within ±25% (default off, so the delay
    /// sequence is the plain doubling sequence).
    pub jitter: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::default(),
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: Some(DEFAULT_MAX_DELAY),
            jitter: false,
        }
    }
}

/// Terminal result of a retried operation.
///
/// `attempts` counts every invocation, including the first; exhaustion with
/// `max_retries: 2` reports `attempts == 3`.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// The last attempt's result.
    pub result: Result<T, E>,
    /// Total invocations of the operation.
    pub attempts: u32,
}

/// Re-executes failing async operations under a bounded retry policy.
///
/// The retrier is cheap to clone and stateless between calls; every `run`
/// starts a fresh attempt count and delay sequence.
///
/// # Example
///
/// ```
/// use reattempt::{Retrier, RetryOptions};
///
/// # #[derive(Debug)] struct E;
/// # impl reattempt::Retryable for E {
/// #     fn recoverability(&self) -> reattempt::Recoverability { reattempt::Recoverability::Transient }
/// # }
/// # async fn example() {
/// let retrier = Retrier::with_options(RetryOptions {
///     max_retries: 2,
///     ..RetryOptions::default()
/// });
///
/// let outcome = retrier.run(|| async { Ok::<_, E>(42) }).await;
/// assert_eq!(outcome.attempts, 1);
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct Retrier {
    options: RetryOptions,
    rnd: Rnd,
}

impl Retrier {
    /// Creates a retrier with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a retrier with the given options.
    #[must_use]
    pub fn with_options(options: RetryOptions) -> Self {
        Self {
            options,
            rnd: Rnd::default(),
        }
    }

    /// Returns the configured options.
    #[must_use]
    pub const fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Runs `op`, retrying transient failures per the error's own
    /// [`Retryable`] classification.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> RetryOutcome<T, E>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_where(op, |error: &E| error.recoverability().is_transient()).await
    }

    /// Runs `op`, retrying failures the caller's predicate accepts.
    ///
    /// This is the escape hatch for call sites that need a different
    /// classification than the error type's default (for example, treating
    /// every failure of an idempotent read as retryable).
    pub async fn run_where<T, E, F, Fut, P>(&self, mut op: F, retryable: P) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let schedule = Schedule {
            backoff: self.options.backoff,
            base_delay: self.options.base_delay,
            max_delay: self.options.max_delay,
            jitter: self.options.jitter,
            rnd: self.rnd.clone(),
        };
        let mut delays = schedule.delays();
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);
            match op().await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                    };
                }
                Err(error) => {
                    if attempts > self.options.max_retries || !retryable(&error) {
                        return RetryOutcome {
                            result: Err(error),
                            attempts,
                        };
                    }

                    let delay = delays.next().unwrap_or(Duration::ZERO);
                    tracing::event!(
                        name: "reattempt.retry",
                        tracing::Level::WARN,
                        attempt = attempts,
                        retry_delay = delay.as_secs_f32(),
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Recoverability;

    #[derive(Clone, Debug, Eq, PartialEq)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl Retryable for TestError {
        fn recoverability(&self) -> Recoverability {
            match self {
                Self::Transient => Recoverability::Transient,
                Self::Permanent => Recoverability::Permanent,
            }
        }
    }

    fn retrier(max_retries: u32) -> Retrier {
        Retrier::with_options(RetryOptions {
            max_retries,
            base_delay: Duration::from_millis(10),
            ..RetryOptions::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt() {
        let outcome = retrier(3).run(|| async { Ok::<_, TestError>(7) }).await;
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_is_not_retried() {
        let outcome = retrier(3).run(|| async { Err::<i32, _>(TestError::Permanent) }).await;
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.result, Err(TestError::Permanent));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_counts_every_invocation() {
        let outcome = retrier(2).run(|| async { Err::<i32, _>(TestError::Transient) }).await;
        // 1 initial + 2 retries.
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result, Err(TestError::Transient));
    }

    #[tokio::test(start_paused = true)]
    async fn predicate_override_wins_over_classification() {
        let outcome = retrier(2)
            .run_where(|| async { Err::<i32, _>(TestError::Permanent) }, |_| true)
            .await;
        assert_eq!(outcome.attempts, 3);
    }
}
