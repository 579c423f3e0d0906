// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Caching, deduplicating, retrying front for row-oriented data backends.
//!
//! The entry point is [`Client`], which wraps any [`RowStore`] backend
//! and layers on, per call:
//!
//! * a TTL cache with tag invalidation ([`tagcache`]),
//! * collapse of concurrent identical reads ([`oneflight`]),
//! * bounded retries with backoff for transient failures ([`reattempt`]),
//! * optimistic visibility for in-flight mutations ([`overlay`]),
//! * and telemetry for all of it ([`pulse`]).
//!
//! Reads are described by a [`SelectRequest`] with a typed [`Filter`];
//! the request's canonical key drives both caching and deduplication.
//! Mutations go through [`Client::insert`], [`Client::update`], and
//! [`Client::delete`], which stage overlay entries so views reflect the
//! change before the backend confirms it.
//!
//! The `test-util` feature adds [`MemoryStore`], an in-memory backend
//! with scripted failures and latency.

mod client;
mod error;
mod filter;
#[cfg(feature = "test-util")]
mod memory;
mod options;
mod request;
mod store;

pub use client::{Client, ClientBuilder};
pub use error::StoreError;
pub use filter::{Condition, Filter};
#[cfg(feature = "test-util")]
pub use memory::{CallCounts, MemoryStore};
pub use options::{MutationOptions, SelectOptions};
pub use request::{Order, OrderDirection, SelectRequest};
pub use store::RowStore;
