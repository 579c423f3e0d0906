// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Background sweeping of expired entries.

use tokio::task::JoinHandle;

use crate::TagCache;

/// Handle to a running sweeper task.
///
/// Dropping the guard aborts the task, so sweeping never outlives the
/// component that started it.
#[derive(Debug)]
pub struct SweepGuard {
    handle: JoinHandle<()>,
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl<V: Clone + Send + 'static> TagCache<V> {
    /// Spawns a task that sweeps expired entries on the configured interval.
    ///
    /// Entries that are written once and never read again would otherwise
    /// linger until capacity pressure; the sweep bounds that growth.
    ///
    /// Must be called from within a tokio runtime. The returned guard stops
    /// the task when dropped.
    #[must_use]
    pub fn spawn_sweeper(&self) -> SweepGuard {
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cache.sweep_interval);
            // The first tick fires immediately; skip it so a fresh cache is
            // not swept before anything can expire.
            interval.tick().await;
            loop {
                interval.tick().await;
                let _ = cache.sweep_now();
            }
        });
        SweepGuard { handle }
    }
}
