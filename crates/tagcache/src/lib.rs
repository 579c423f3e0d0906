// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A TTL cache with tag-based bulk invalidation.
//!
//! This crate provides [`TagCache`], a keyed store of previously computed
//! results. Every entry carries an expiry deadline and a set of tags; tags
//! associate related entries so they can be invalidated together (for
//! example, every cached query touching one table).
//!
//! # Semantics
//!
//! - An entry is visible via [`TagCache::get`] only while its TTL has not
//!   elapsed. An entry read after its deadline is removed on the spot, so
//!   stale data is never observable.
//! - Inserting a *new* key at capacity evicts the single entry with the
//!   oldest insertion time. Overwriting an existing key never evicts.
//! - [`TagCache::invalidate_tag`] removes every entry registered under a
//!   tag and resets the tag completely.
//! - A background sweep (see [`TagCache::spawn_sweeper`]) periodically
//!   drops expired entries that are never read again, bounding growth from
//!   write-once keys.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tagcache::{SetOptions, TagCache};
//!
//! let cache: TagCache<String> = TagCache::builder().max_size(100).build();
//!
//! cache.set(
//!     "goals|user_id=u1",
//!     "rows".to_string(),
//!     SetOptions::default().ttl(Duration::from_secs(60)).tag("goals"),
//! );
//!
//! assert_eq!(cache.get("goals|user_id=u1"), Some("rows".to_string()));
//! assert_eq!(cache.invalidate_tag("goals"), 1);
//! assert_eq!(cache.get("goals|user_id=u1"), None);
//! ```

mod builder;
mod cache;
mod clock;
mod sweep;

pub use builder::TagCacheBuilder;
pub use cache::{CacheStats, SetOptions, TagCache};
pub use clock::Clock;
pub use sweep::SweepGuard;
