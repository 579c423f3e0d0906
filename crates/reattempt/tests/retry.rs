// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `Retrier`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use reattempt::{Backoff, Recoverability, Retrier, RetryOptions, Retryable};

#[derive(Clone, Debug, Eq, PartialEq)]
struct Flaky(&'static str);

impl Retryable for Flaky {
    fn recoverability(&self) -> Recoverability {
        Recoverability::Transient
    }
}

fn retrier(max_retries: u32, base_delay: Duration) -> Retrier {
    Retrier::with_options(RetryOptions {
        max_retries,
        backoff: Backoff::Exponential,
        base_delay,
        max_delay: None,
        jitter: false,
    })
}

#[tokio::test(start_paused = true)]
async fn recovers_after_transient_failures() {
    let calls = Arc::new(AtomicU32::new(0));

    let outcome = retrier(5, Duration::from_millis(10))
        .run({
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::AcqRel) < 2 {
                        Err(Flaky("connection reset"))
                    } else {
                        Ok("rows")
                    }
                }
            }
        })
        .await;

    assert_eq!(outcome.result, Ok("rows"));
    assert_eq!(outcome.attempts, 3);
    assert_eq!(calls.load(Ordering::Acquire), 3);
}

#[tokio::test(start_paused = true)]
async fn delays_follow_the_doubling_sequence() {
    let start = tokio::time::Instant::now();

    let outcome = retrier(2, Duration::from_millis(100))
        .run(|| async { Err::<(), _>(Flaky("down")) })
        .await;

    assert_eq!(outcome.attempts, 3);
    // Two sleeps: 100ms then 200ms; paused time advances exactly.
    assert_eq!(start.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn zero_retries_means_single_attempt() {
    let calls = Arc::new(AtomicU32::new(0));

    let outcome = retrier(0, Duration::from_millis(10))
        .run({
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::AcqRel);
                    Err::<(), _>(Flaky("down"))
                }
            }
        })
        .await;

    assert_eq!(outcome.attempts, 1);
    assert_eq!(calls.load(Ordering::Acquire), 1);
}
