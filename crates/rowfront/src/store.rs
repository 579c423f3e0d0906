// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde_json::Value;

use crate::error::StoreError;
use crate::filter::Filter;
use crate::request::SelectRequest;

/// The backend contract consumed by [`Client`](crate::Client).
///
/// Rows are JSON objects. Mutations return the affected rows in their
/// post-mutation state, which the client uses to confirm optimistic
/// entries. Implementations should not retry or cache internally; the
/// client layers both on top.
pub trait RowStore: Send + Sync + 'static {
    fn select(&self, request: &SelectRequest) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;

    fn insert(&self, table: &str, rows: &[Value]) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;

    fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: &Value,
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;

    fn delete(&self, table: &str, filter: &Filter) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;
}
