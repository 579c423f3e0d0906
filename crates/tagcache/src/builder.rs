// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring a [`TagCache`].

use std::marker::PhantomData;
use std::time::Duration;

use crate::{Clock, TagCache};

const DEFAULT_MAX_SIZE: usize = 500;
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configures and constructs a [`TagCache`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tagcache::TagCache;
///
/// let cache: TagCache<String> = TagCache::builder()
///     .max_size(1000)
///     .default_ttl(Duration::from_secs(120))
///     .build();
/// ```
#[derive(Debug)]
pub struct TagCacheBuilder<V> {
    pub(crate) max_size: usize,
    pub(crate) default_ttl: Duration,
    pub(crate) sweep_interval: Duration,
    pub(crate) clock: Clock,
    _value: PhantomData<fn() -> V>,
}

impl<V> Default for TagCacheBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TagCacheBuilder<V> {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            default_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            clock: Clock::system(),
            _value: PhantomData,
        }
    }

    /// Maximum number of live entries before inserts evict (default 500).
    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    /// TTL applied when an insert does not override it (default 5 minutes).
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Interval between background sweeps of expired entries (default 60 s).
    ///
    /// Only relevant when a sweeper is started via
    /// [`TagCache::spawn_sweeper`].
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Uses the given time source instead of the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the cache.
    #[must_use]
    pub fn build(self) -> TagCache<V>
    where
        V: Clone,
    {
        TagCache::from_builder(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let builder = TagCacheBuilder::<i32>::new();
        assert_eq!(builder.max_size, 500);
        assert_eq!(builder.default_ttl, Duration::from_secs(300));
        assert_eq!(builder.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn max_size_is_at_least_one() {
        let builder = TagCacheBuilder::<i32>::new().max_size(0);
        assert_eq!(builder.max_size, 1);
    }
}
