// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The composed data-access client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use oneflight::FlightGroup;
use overlay::{OverlayId, OverlayTracker};
use pulse::{Outcome, Recorder};
use reattempt::Retrier;
use serde_json::Value;
use tagcache::{SetOptions, TagCache};

use crate::error::StoreError;
use crate::filter::Filter;
use crate::options::{MutationOptions, SelectOptions};
use crate::request::SelectRequest;
use crate::store::RowStore;

type Rows = Vec<Value>;

/// Caching, deduplicating, retrying front for a [`RowStore`] backend.
///
/// Reads run through a pipeline: cache lookup, then collapse with any
/// identical in-flight read, then the backend call under a retry policy.
/// A fresh read fills the cache under the table's invalidation tag and
/// drops settled overlay entries for that table, since the backend's
/// answer supersedes them.
///
/// Mutations stage an overlay entry first so views can show the change
/// immediately, then call the backend; success confirms the entry and
/// invalidates the table's cached reads, failure marks the entry failed
/// and leaves the cache alone.
///
/// Every collaborator is injected through the builder, so tests can
/// substitute any of them. Cloning is shallow; clones share all state.
pub struct Client<S> {
    store: Arc<S>,
    cache: TagCache<Rows>,
    flights: FlightGroup<String, Result<Rows, StoreError>>,
    retrier: Retrier,
    overlay: OverlayTracker,
    recorder: Recorder,
}

impl<S> Clone for Client<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
            flights: self.flights.clone(),
            retrier: self.retrier.clone(),
            overlay: self.overlay.clone(),
            recorder: self.recorder.clone(),
        }
    }
}

impl<S> std::fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl<S: RowStore> Client<S> {
    /// Creates a client with default collaborators.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::builder(store).build()
    }

    #[must_use]
    pub fn builder(store: S) -> ClientBuilder<S> {
        ClientBuilder::new(store)
    }

    /// The cache serving this client's reads.
    #[must_use]
    pub fn cache(&self) -> &TagCache<Rows> {
        &self.cache
    }

    /// The overlay tracking optimistic mutations.
    #[must_use]
    pub fn overlay(&self) -> &OverlayTracker {
        &self.overlay
    }

    /// The telemetry recorder fed by this client.
    #[must_use]
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Reads rows with the default options (cache, dedup, retry all on).
    ///
    /// The returned rows have the overlay applied: pending mutations are
    /// visible and flagged `"__optimistic": true`.
    pub async fn select(&self, request: SelectRequest) -> Result<Rows, StoreError> {
        self.select_with(request, SelectOptions::default()).await
    }

    pub async fn select_with(&self, mut request: SelectRequest, options: SelectOptions) -> Result<Rows, StoreError> {
        if request.single {
            request.limit = Some(1);
        }
        let key = request.cache_key();
        let table = request.table.clone();

        if options.cache {
            // Hits record only a cache event; query events track actual
            // backend calls so durations stay interpretable.
            if let Some(rows) = self.cache.get(&key) {
                self.recorder.record_cache(&table, true);
                return Ok(self.overlay.apply(&table, &rows));
            }
            self.recorder.record_cache(&table, false);
        }

        let deduplicate = options.deduplicate;
        let make = {
            let store = Arc::clone(&self.store);
            let cache = self.cache.clone();
            let overlay = self.overlay.clone();
            let recorder = self.recorder.clone();
            let retrier = self.retrier_for(options.retry, options.max_retries);
            let key = key.clone();
            move || {
                // Owned so the execution can be shared between callers
                // and outlive the one that started it.
                async move {
                    let table = request.table.clone();
                    let started = Instant::now();
                    let outcome = {
                        let store = &*store;
                        let request = &request;
                        retrier.run(move || store.select(request)).await
                    };
                    let duration = started.elapsed();

                    match outcome.result {
                        Ok(rows) => {
                            // Authoritative data for this table arrived;
                            // settled overlay entries are superseded.
                            overlay.purge_settled(&table);
                            if options.cache {
                                let set = SetOptions::default().tag(&table).tags(options.cache_tags);
                                let set = match options.cache_ttl {
                                    Some(ttl) => set.ttl(ttl),
                                    None => set,
                                };
                                cache.set(key, rows.clone(), set);
                            }
                            recorder.record_query(&table, duration, Outcome::Success, false);
                            Ok(rows)
                        }
                        Err(error) => {
                            recorder.record_query(&table, duration, Outcome::Error, false);
                            recorder.record_error("select", &error.to_string());
                            Err(error)
                        }
                    }
                }
            }
        };

        let result = if deduplicate {
            // Keyed by the cache key: requests equal enough to share a
            // cache entry are equal enough to share a backend call. The
            // cache fill and the query event belong to the shared
            // execution, so they happen once.
            self.flights.fly(key, make).await
        } else {
            make().await
        };

        result.map(|rows| self.overlay.apply(&table, &rows))
    }

    /// Reads exactly one row; [`StoreError::NotFound`] when none matches.
    pub async fn select_single(&self, request: SelectRequest) -> Result<Value, StoreError> {
        self.select_single_with(request, SelectOptions::default()).await
    }

    pub async fn select_single_with(&self, mut request: SelectRequest, options: SelectOptions) -> Result<Value, StoreError> {
        request.single = true;
        let rows = self.select_with(request, options).await?;
        rows.into_iter().next().ok_or(StoreError::NotFound)
    }

    /// Inserts one row; returns the inserted rows as the backend stored
    /// them.
    pub async fn insert(&self, table: &str, row: Value) -> Result<Rows, StoreError> {
        self.insert_with(table, row, MutationOptions::default()).await
    }

    pub async fn insert_with(&self, table: &str, row: Value, options: MutationOptions) -> Result<Rows, StoreError> {
        let staged = options.optimistic.then(|| self.overlay.stage_insert(table, row.clone()));
        let retrier = self.retrier_for(options.retry, options.max_retries);
        let started = Instant::now();
        let result = {
            let store = &*self.store;
            let row = std::slice::from_ref(&row);
            retrier.run(move || store.insert(table, row)).await.result
        };
        self.settle_mutation(table, "insert", options, staged, started.elapsed(), result)
    }

    /// Updates the rows matched by `filter` with a shallow patch.
    ///
    /// The update is staged optimistically only when the filter is a
    /// single `id` equality; broader updates go straight to the backend.
    pub async fn update(&self, table: &str, filter: Filter, patch: Value) -> Result<Rows, StoreError> {
        self.update_with(table, filter, patch, MutationOptions::default()).await
    }

    pub async fn update_with(
        &self,
        table: &str,
        filter: Filter,
        patch: Value,
        options: MutationOptions,
    ) -> Result<Rows, StoreError> {
        let staged = if options.optimistic {
            filter
                .single_id()
                .map(|id| self.overlay.stage_update(table, id.clone(), patch.clone(), options.original.clone()))
        } else {
            None
        };
        let retrier = self.retrier_for(options.retry, options.max_retries);
        let started = Instant::now();
        let result = {
            let store = &*self.store;
            let filter = &filter;
            let patch = &patch;
            retrier.run(move || store.update(table, filter, patch)).await.result
        };
        self.settle_mutation(table, "update", options, staged, started.elapsed(), result)
    }

    /// Deletes the rows matched by `filter`.
    pub async fn delete(&self, table: &str, filter: Filter) -> Result<Rows, StoreError> {
        self.delete_with(table, filter, MutationOptions::default()).await
    }

    pub async fn delete_with(&self, table: &str, filter: Filter, options: MutationOptions) -> Result<Rows, StoreError> {
        let staged = if options.optimistic {
            filter
                .single_id()
                .map(|id| self.overlay.stage_delete(table, id.clone(), options.original.clone()))
        } else {
            None
        };
        let retrier = self.retrier_for(options.retry, options.max_retries);
        let started = Instant::now();
        let result = {
            let store = &*self.store;
            let filter = &filter;
            retrier.run(move || store.delete(table, filter)).await.result
        };
        self.settle_mutation(table, "delete", options, staged, started.elapsed(), result)
    }

    fn settle_mutation(
        &self,
        table: &str,
        operation: &'static str,
        options: MutationOptions,
        staged: Option<OverlayId>,
        duration: Duration,
        result: Result<Rows, StoreError>,
    ) -> Result<Rows, StoreError> {
        match result {
            Ok(rows) => {
                if let Some(id) = staged {
                    let server_row = options.returning.then(|| rows.first().cloned()).flatten();
                    self.overlay.confirm(id, server_row);
                }
                let tags = options.invalidate_tags.unwrap_or_else(|| vec![table.to_string()]);
                let invalidated = self.cache.invalidate_tags(&tags);
                tracing::debug!(table, operation, invalidated, "mutation invalidated cached reads");
                self.recorder.record_mutation(table, operation, duration, Outcome::Success);
                Ok(if options.returning { rows } else { Vec::new() })
            }
            Err(error) => {
                // The cache is left alone: its contents still reflect the
                // backend, which did not change.
                if let Some(id) = staged {
                    self.overlay.fail(id, error.to_string());
                }
                self.recorder.record_mutation(table, operation, duration, Outcome::Error);
                self.recorder.record_error(operation, &error.to_string());
                Err(error)
            }
        }
    }

    fn retrier_for(&self, retry: bool, max_retries: Option<u32>) -> Retrier {
        let mut options = self.retrier.options().clone();
        if !retry {
            options.max_retries = 0;
        } else if let Some(max_retries) = max_retries {
            options.max_retries = max_retries;
        }
        Retrier::with_options(options)
    }
}

/// Assembles a [`Client`] from its collaborators; unset ones get
/// defaults.
///
/// ```
/// use rowfront::{Client, Filter, RowStore, SelectRequest, StoreError};
/// use serde_json::Value;
/// use tagcache::TagCache;
///
/// struct NullStore;
///
/// impl RowStore for NullStore {
///     async fn select(&self, _: &SelectRequest) -> Result<Vec<Value>, StoreError> {
///         Ok(vec![])
///     }
///     async fn insert(&self, _: &str, _: &[Value]) -> Result<Vec<Value>, StoreError> {
///         Ok(vec![])
///     }
///     async fn update(&self, _: &str, _: &Filter, _: &Value) -> Result<Vec<Value>, StoreError> {
///         Ok(vec![])
///     }
///     async fn delete(&self, _: &str, _: &Filter) -> Result<Vec<Value>, StoreError> {
///         Ok(vec![])
///     }
/// }
///
/// let client = Client::builder(NullStore)
///     .cache(TagCache::builder().max_size(200).build())
///     .build();
/// ```
#[derive(Debug)]
pub struct ClientBuilder<S> {
    store: S,
    cache: Option<TagCache<Rows>>,
    retrier: Option<Retrier>,
    overlay: Option<OverlayTracker>,
    recorder: Option<Recorder>,
}

impl<S: RowStore> ClientBuilder<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: None,
            retrier: None,
            overlay: None,
            recorder: None,
        }
    }

    #[must_use]
    pub fn cache(mut self, cache: TagCache<Rows>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn retrier(mut self, retrier: Retrier) -> Self {
        self.retrier = Some(retrier);
        self
    }

    #[must_use]
    pub fn overlay(mut self, overlay: OverlayTracker) -> Self {
        self.overlay = Some(overlay);
        self
    }

    #[must_use]
    pub fn recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    #[must_use]
    pub fn build(self) -> Client<S> {
        Client {
            store: Arc::new(self.store),
            cache: self.cache.unwrap_or_else(|| TagCache::builder().build()),
            flights: FlightGroup::new(),
            retrier: self.retrier.unwrap_or_default(),
            overlay: self.overlay.unwrap_or_default(),
            recorder: self.recorder.unwrap_or_default(),
        }
    }
}
