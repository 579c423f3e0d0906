// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use serde_json::Value;

/// Per-call knobs for reads. The defaults give the full pipeline: cache,
/// deduplication, and retries.
#[derive(Debug, Clone)]
pub struct SelectOptions {
    /// Consult and fill the cache (default on).
    pub cache: bool,
    /// Per-entry TTL override; `None` uses the cache's default.
    pub cache_ttl: Option<Duration>,
    /// Extra invalidation tags for the cached entry. The table name is
    /// always registered.
    pub cache_tags: Vec<String>,
    /// Collapse concurrent identical reads into one backend call
    /// (default on).
    pub deduplicate: bool,
    /// Retry transient failures (default on).
    pub retry: bool,
    /// Override of the client's retry budget for this call.
    pub max_retries: Option<u32>,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            cache: true,
            cache_ttl: None,
            cache_tags: Vec::new(),
            deduplicate: true,
            retry: true,
            max_retries: None,
        }
    }
}

impl SelectOptions {
    /// Bypasses the cache and deduplication, forcing a backend read.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            cache: false,
            deduplicate: false,
            ..Self::default()
        }
    }
}

/// Per-call knobs for mutations.
///
/// Retries default to off: a mutation that timed out may still have been
/// applied, and replaying it is the caller's decision.
#[derive(Debug, Clone)]
pub struct MutationOptions {
    /// Return the affected rows in their post-mutation state (default
    /// on). When off, the call returns an empty row set and optimistic
    /// entries are confirmed without a server row.
    pub returning: bool,
    /// Stage the change in the overlay so views can show it before the
    /// backend confirms (default on).
    pub optimistic: bool,
    /// Pre-mutation row, kept for rollback display when the mutation
    /// fails. Only meaningful for updates and deletes.
    pub original: Option<Value>,
    /// Retry transient failures (default off).
    pub retry: bool,
    /// Override of the client's retry budget for this call.
    pub max_retries: Option<u32>,
    /// Cache tags to invalidate on success; `None` invalidates the
    /// table's tag.
    pub invalidate_tags: Option<Vec<String>>,
}

impl Default for MutationOptions {
    fn default() -> Self {
        Self {
            returning: true,
            optimistic: true,
            original: None,
            retry: false,
            max_retries: None,
            invalidate_tags: None,
        }
    }
}

impl MutationOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn returning(mut self, returning: bool) -> Self {
        self.returning = returning;
        self
    }

    #[must_use]
    pub fn original(mut self, row: Value) -> Self {
        self.original = Some(row);
        self
    }

    #[must_use]
    pub fn optimistic(mut self, optimistic: bool) -> Self {
        self.optimistic = optimistic;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn invalidate_tags<I>(mut self, tags: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.invalidate_tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }
}
