// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cache store: keyed entries, tag index, stats.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::Clock;
use crate::builder::TagCacheBuilder;

/// Per-insert options: TTL override and tags to register the key under.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tagcache::SetOptions;
///
/// let options = SetOptions::default()
///     .ttl(Duration::from_secs(30))
///     .tag("goals")
///     .tag("dashboard-stats");
/// ```
#[derive(Clone, Debug, Default)]
pub struct SetOptions {
    pub(crate) ttl: Option<Duration>,
    pub(crate) tags: Vec<String>,
}

impl SetOptions {
    /// Overrides the cache's default TTL for this entry.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Registers the entry under an additional tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Registers the entry under all of the given tags.
    #[must_use]
    pub fn tags<I>(mut self, tags: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Running counters since construction or the last [`TagCache::clear`].
///
/// `size` is the live entry count; the remaining fields are totals and are
/// not reset by background sweeps.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CacheStats {
    /// Number of live entries.
    pub size: usize,
    /// Reads that returned a value.
    pub hits: u64,
    /// Reads that found nothing (absent or expired).
    pub misses: u64,
    /// Entries dropped because their TTL elapsed (on read or by sweep).
    pub expired: u64,
    /// Entries dropped to make room at capacity.
    pub evictions: u64,
}

struct Entry<V> {
    value: V,
    inserted_at: SystemTime,
    expires_at: SystemTime,
    tags: Vec<String>,
}

struct State<V> {
    entries: HashMap<String, Entry<V>>,
    /// Inverse index of the entries' tags. Every key in any tag set exists
    /// in `entries`; keys are detached from all of their tags at the
    /// moment they are deleted, expired, or evicted.
    tag_index: HashMap<String, HashSet<String>>,
    hits: u64,
    misses: u64,
    expired: u64,
    evictions: u64,
}

impl<V> State<V> {
    /// Removes `key` from every tag set it was registered under.
    fn detach_tags(&mut self, key: &str, tags: &[String]) {
        for tag in tags {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
    }

    /// Removes an entry and its tag registrations, returning it.
    fn take_entry(&mut self, key: &str) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        let tags = entry.tags.clone();
        self.detach_tags(key, &tags);
        Some(entry)
    }
}

/// A TTL cache with tag-based bulk invalidation.
///
/// Entries expire individually; reads never observe an expired value. At
/// capacity, inserting a new key evicts the entry with the oldest insertion
/// time. Tags group related keys for coordinated invalidation.
///
/// The cache is a cheaply cloneable handle; clones share the same store.
/// All operations are synchronous and take the internal lock briefly, so
/// the cache can sit between the `await` points of async callers without
/// introducing races.
///
/// # Example
///
/// ```
/// use tagcache::{SetOptions, TagCache};
///
/// let cache: TagCache<i32> = TagCache::builder().build();
/// cache.set("answer", 42, SetOptions::default());
/// assert_eq!(cache.get("answer"), Some(42));
/// ```
pub struct TagCache<V> {
    state: Arc<Mutex<State<V>>>,
    clock: Clock,
    max_size: usize,
    default_ttl: Duration,
    pub(crate) sweep_interval: Duration,
}

impl<V> Clone for TagCache<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            clock: self.clock.clone(),
            max_size: self.max_size,
            default_ttl: self.default_ttl,
            sweep_interval: self.sweep_interval,
        }
    }
}

impl<V> Debug for TagCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagCache")
            .field("max_size", &self.max_size)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl<V: Clone> Default for TagCache<V> {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl<V: Clone> TagCache<V> {
    /// Creates a builder for configuring the cache.
    #[must_use]
    pub fn builder() -> TagCacheBuilder<V> {
        TagCacheBuilder::new()
    }

    pub(crate) fn from_builder(builder: TagCacheBuilder<V>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                tag_index: HashMap::new(),
                hits: 0,
                misses: 0,
                expired: 0,
                evictions: 0,
            })),
            clock: builder.clock,
            max_size: builder.max_size,
            default_ttl: builder.default_ttl,
            sweep_interval: builder.sweep_interval,
        }
    }

    /// Returns the cached value for `key`, if present and not expired.
    ///
    /// An entry read past its deadline is deleted immediately (and removed
    /// from every tag set) before `None` is returned.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        enum Read<V> {
            Absent,
            Expired,
            Hit(V),
        }

        let read = match state.entries.get(key) {
            None => Read::Absent,
            Some(entry) if entry.expires_at <= now => Read::Expired,
            Some(entry) => Read::Hit(entry.value.clone()),
        };

        match read {
            Read::Absent => {
                state.misses += 1;
                None
            }
            Read::Expired => {
                state.take_entry(key);
                state.expired += 1;
                state.misses += 1;
                None
            }
            Read::Hit(value) => {
                state.hits += 1;
                Some(value)
            }
        }
    }

    /// Inserts or overwrites an entry.
    ///
    /// A new key inserted at capacity evicts the oldest-inserted entry
    /// first; overwriting an existing key never evicts.
    pub fn set(&self, key: impl Into<String>, value: V, options: SetOptions) {
        let key = key.into();
        let now = self.clock.now();
        let ttl = options.ttl.unwrap_or(self.default_ttl);
        let mut state = self.state.lock();

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_size {
            self.evict_oldest(&mut state);
        }

        // Overwrites must drop the previous tag registrations.
        state.take_entry(&key);

        for tag in &options.tags {
            state.tag_index.entry(tag.clone()).or_default().insert(key.clone());
        }

        state.entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                expires_at: now + ttl,
                tags: options.tags,
            },
        );
    }

    /// Removes an entry, returning whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.state.lock().take_entry(key).is_some()
    }

    /// Removes every entry registered under `tag` and resets the tag.
    ///
    /// Returns the number of entries actually removed; invalidating a tag
    /// with no registrations returns 0.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut state = self.state.lock();
        let Some(keys) = state.tag_index.remove(tag) else {
            return 0;
        };

        let mut removed = 0;
        for key in keys {
            if state.take_entry(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Invalidates several tags, returning the total entries removed.
    ///
    /// Tags may overlap in keys; each entry is only counted once because it
    /// is gone by the time the second tag is processed.
    pub fn invalidate_tags<T: AsRef<str>>(&self, tags: &[T]) -> usize {
        tags.iter().map(|tag| self.invalidate_tag(tag.as_ref())).sum()
    }

    /// Empties the cache and resets all counters.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.tag_index.clear();
        state.hits = 0;
        state.misses = 0;
        state.expired = 0;
        state.evictions = 0;
    }

    /// Drops every expired entry, independent of access.
    ///
    /// Returns the number of entries removed. Called periodically by the
    /// sweeper task (see [`TagCache::spawn_sweeper`]).
    pub fn sweep_now(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let stale: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            state.take_entry(key);
        }
        state.expired += stale.len() as u64;

        if !stale.is_empty() {
            tracing::debug!(removed = stale.len(), "cache sweep dropped expired entries");
        }
        stale.len()
    }

    /// Returns a snapshot of the running counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            size: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
            expired: state.expired,
            evictions: state.evictions,
        }
    }

    fn evict_oldest(&self, state: &mut State<V>) {
        let oldest = state
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            state.take_entry(&key);
            state.evictions += 1;
        }
    }
}
