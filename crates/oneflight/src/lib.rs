// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Collapses concurrent identical async requests into a single execution.
//!
//! This crate provides [`FlightGroup`], a registry of in-flight operations
//! keyed by the caller's choice of key. When several tasks request the same
//! work concurrently, only the first registers an execution; the others
//! attach to it and receive a clone of its output, success or failure
//! alike. Once a flight settles its key is deregistered, so a later call
//! with the same key executes fresh.
//!
//! Registration happens synchronously, before the returned future is first
//! polled. Under cooperative single-threaded scheduling this is what makes
//! "first caller wins, the rest attach" race-free: there is no suspension
//! point between checking the registry and claiming the key.
//!
//! # Example
//!
//! ```
//! use oneflight::FlightGroup;
//!
//! # async fn example() {
//! let group: FlightGroup<String, String> = FlightGroup::new();
//!
//! // Concurrent calls with the same key share one execution.
//! let result = group
//!     .fly("user:123".to_string(), || async {
//!         // expensive lookup runs at most once at a time per key
//!         "profile".to_string()
//!     })
//!     .await;
//! # }
//! ```
//!
//! # Cancellation
//!
//! The shared execution is driven by whichever attached caller polls it.
//! If the caller that started a flight is dropped, any remaining caller
//! continues driving the work; the flight is only orphaned when every
//! caller is gone, and an orphaned key is replaced on the next request.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, WeakShared};
use parking_lot::Mutex;

type Flight<T> = Shared<BoxFuture<'static, T>>;

/// A space in which identical units of work are executed with duplicate
/// suppression.
pub struct FlightGroup<K, T> {
    inflight: Arc<Mutex<HashMap<K, WeakShared<BoxFuture<'static, T>>>>>,
}

impl<K, T> Default for FlightGroup<K, T> {
    fn default() -> Self {
        Self {
            inflight: Arc::default(),
        }
    }
}

impl<K, T> Clone for FlightGroup<K, T> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
        }
    }
}

impl<K, T> Debug for FlightGroup<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightGroup").finish_non_exhaustive()
    }
}

impl<K, T> FlightGroup<K, T>
where
    K: Hash + Eq + Clone,
{
    /// Creates a new, empty flight group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys currently in flight.
    ///
    /// Keys whose every caller has gone away are counted until the next
    /// request replaces them.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Executes `make`'s future for `key`, unless an identical request is
    /// already in flight, in which case this call attaches to it.
    ///
    /// Every attached caller observes the same settled value, so `T` is
    /// typically a `Result` whose error is `Clone`. After the flight
    /// settles, the key is free and a subsequent call executes fresh.
    pub async fn fly<F, Fut>(&self, key: K, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Clone + Send,
    {
        let flight = self.join_or_start(&key, make);
        let output = flight.clone().await;
        self.finish(&key, &flight);
        output
    }

    /// Looks up a live flight for `key` or registers a new one.
    ///
    /// Synchronous by construction: the registry lock is held across the
    /// check-then-insert, and `make` only constructs the future.
    fn join_or_start<F, Fut>(&self, key: &K, make: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Clone,
    {
        let mut inflight = self.inflight.lock();
        if let Some(existing) = inflight.get(key).and_then(WeakShared::upgrade) {
            return existing;
        }

        let flight = make().boxed().shared();
        if let Some(weak) = flight.downgrade() {
            inflight.insert(key.clone(), weak);
        }
        flight
    }

    /// Deregisters `key` once its flight has settled.
    ///
    /// Guarded by pointer identity so a newer flight registered under the
    /// same key is left alone.
    fn finish(&self, key: &K, flight: &Flight<T>)
    where
        T: Clone,
    {
        let mut inflight = self.inflight.lock();
        match inflight.get(key).and_then(WeakShared::upgrade) {
            // A newer flight took the key while we were settling; leave it.
            Some(current) if !current.ptr_eq(flight) => {}
            // Our flight, or a settled one that can no longer be joined.
            _ => {
                inflight.remove(key);
            }
        }
    }
}
