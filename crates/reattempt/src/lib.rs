// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recoverability classification and a retry executor.
//!
//! # Why
//!
//! Backend failures split into conditions where trying again can help
//! (network hiccups, service blips) and conditions where it cannot
//! (validation failures, constraint violations). This crate provides a
//! small vocabulary for that split, [`Recoverability`] and the
//! [`Retryable`] trait, plus [`Retrier`], an executor that re-runs a
//! failing async operation under a bounded-attempt, backoff-delayed policy.
//!
//! Delays are cooperative (`tokio::time::sleep`); the executor never blocks
//! a thread between attempts, and dropping the returned future stops the
//! retry loop.
//!
//! # Example
//!
//! ```
//! use reattempt::{Recoverability, Retrier, Retryable};
//!
//! #[derive(Debug)]
//! enum FetchError {
//!     Timeout,
//!     BadRequest,
//! }
//!
//! impl Retryable for FetchError {
//!     fn recoverability(&self) -> Recoverability {
//!         match self {
//!             FetchError::Timeout => Recoverability::Transient,
//!             FetchError::BadRequest => Recoverability::Permanent,
//!         }
//!     }
//! }
//!
//! # async fn example() {
//! let retrier = Retrier::new();
//! let outcome = retrier
//!     .run(|| async { Err::<(), _>(FetchError::BadRequest) })
//!     .await;
//!
//! // Permanent errors are surfaced after a single attempt.
//! assert_eq!(outcome.attempts, 1);
//! assert!(outcome.result.is_err());
//! # }
//! ```

mod backoff;
mod classify;
mod executor;
mod rnd;

pub use backoff::Backoff;
pub use classify::{Recoverability, Retryable};
pub use executor::{Retrier, RetryOptions, RetryOutcome};
