// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An in-memory [`RowStore`] for tests and examples.

use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use crate::error::StoreError;
use crate::filter::Filter;
use crate::request::{OrderDirection, SelectRequest};
use crate::store::RowStore;

/// Number of backend calls by operation, for assertions on caching and
/// deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub select: usize,
    pub insert: usize,
    pub update: usize,
    pub delete: usize,
}

#[derive(Default)]
struct Inner {
    tables: Mutex<BTreeMap<String, Vec<Value>>>,
    failures: Mutex<VecDeque<StoreError>>,
    latency: Mutex<Option<Duration>>,
    calls: Mutex<CallCounts>,
    next_id: Mutex<u64>,
}

/// In-memory backend with scripted failures and optional latency.
///
/// Every operation consumes at most one scripted failure, so a sequence
/// of `fail_next` calls scripts the first N outcomes. Latency is served
/// with `tokio::time::sleep`, which under `start_paused` tests keeps
/// concurrent callers genuinely concurrent.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents of a table.
    pub fn seed<I>(&self, table: impl Into<String>, rows: I)
    where
        I: IntoIterator<Item = Value>,
    {
        self.inner.tables.lock().insert(table.into(), rows.into_iter().collect());
    }

    /// Scripts the next operation to fail with `error`.
    pub fn fail_next(&self, error: StoreError) {
        self.inner.failures.lock().push_back(error);
    }

    /// Adds an artificial delay to every operation.
    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock() = Some(latency);
    }

    #[must_use]
    pub fn calls(&self) -> CallCounts {
        *self.inner.calls.lock()
    }

    /// Raw rows of a table, unfiltered.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.inner.tables.lock().get(table).cloned().unwrap_or_default()
    }

    async fn simulate(&self) -> Result<(), StoreError> {
        let latency = *self.inner.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.inner.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn assign_id(&self, row: &mut Value) {
        if let Some(object) = row.as_object_mut() {
            let missing = !matches!(object.get("id"), Some(v) if !v.is_null());
            if missing {
                let mut next = self.inner.next_id.lock();
                *next += 1;
                let id = *next;
                object.insert("id".to_string(), json!(format!("row_{id}")));
            }
        }
    }
}

impl RowStore for MemoryStore {
    async fn select(&self, request: &SelectRequest) -> Result<Vec<Value>, StoreError> {
        self.inner.calls.lock().select += 1;
        self.simulate().await?;

        let all = self.rows(&request.table);
        let mut rows: Vec<Value> = all.into_iter().filter(|row| request.filter.matches(row)).collect();

        if let Some(order) = &request.order {
            rows.sort_by(|a, b| {
                let a = a.get(&order.column).unwrap_or(&Value::Null);
                let b = b.get(&order.column).unwrap_or(&Value::Null);
                let ordering = cmp_values(a, b);
                match order.direction {
                    OrderDirection::Ascending => ordering,
                    OrderDirection::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = request.limit {
            rows.truncate(limit);
        }
        if let Some(columns) = &request.columns {
            rows = rows.into_iter().map(|row| project(row, columns)).collect();
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: &[Value]) -> Result<Vec<Value>, StoreError> {
        self.inner.calls.lock().insert += 1;
        self.simulate().await?;

        let mut inserted = rows.to_vec();
        for row in &mut inserted {
            self.assign_id(row);
        }
        let mut tables = self.inner.tables.lock();
        tables.entry(table.to_string()).or_default().extend(inserted.clone());
        Ok(inserted)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: &Value) -> Result<Vec<Value>, StoreError> {
        self.inner.calls.lock().update += 1;
        self.simulate().await?;

        let mut tables = self.inner.tables.lock();
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                    for (key, value) in fields {
                        target.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        self.inner.calls.lock().delete += 1;
        self.simulate().await?;

        let mut tables = self.inner.tables.lock();
        let mut removed = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|row| {
                if filter.matches(row) {
                    removed.push(row.clone());
                    false
                } else {
                    true
                }
            });
        }
        Ok(removed)
    }
}

fn project(row: Value, columns: &[String]) -> Value {
    match row {
        Value::Object(object) => {
            let mut projected = Map::new();
            for column in columns {
                if let Some(value) = object.get(column) {
                    projected.insert(column.clone(), value.clone());
                }
            }
            Value::Object(projected)
        }
        other => other,
    }
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        // Nulls sort last; everything else is left in place.
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed(
            "goals",
            [
                json!({"id": "g1", "user_id": "u1", "score": 3}),
                json!({"id": "g2", "user_id": "u1", "score": 9}),
                json!({"id": "g3", "user_id": "u2", "score": 5}),
            ],
        );
        store
    }

    #[tokio::test]
    async fn select_filters_orders_and_limits() {
        let store = store();
        let request = SelectRequest::table("goals")
            .filter(Filter::new().eq("user_id", "u1"))
            .order_desc("score")
            .limit(1);
        let rows = store.select(&request).await.expect("select succeeds");
        assert_eq!(rows, vec![json!({"id": "g2", "user_id": "u1", "score": 9})]);
    }

    #[tokio::test]
    async fn select_projects_columns() {
        let store = store();
        let request = SelectRequest::table("goals")
            .columns(["id"])
            .filter(Filter::new().eq("id", "g1"));
        let rows = store.select(&request).await.expect("select succeeds");
        assert_eq!(rows, vec![json!({"id": "g1"})]);
    }

    #[tokio::test]
    async fn insert_assigns_missing_ids() {
        let store = MemoryStore::new();
        let rows = store
            .insert("goals", &[json!({"title": "Swim"})])
            .await
            .expect("insert succeeds");
        assert_eq!(rows[0]["id"], json!("row_1"));
        assert_eq!(store.rows("goals"), rows);
    }

    #[tokio::test]
    async fn update_patches_matching_rows() {
        let store = store();
        let updated = store
            .update("goals", &Filter::new().eq("id", "g1"), &json!({"score": 10}))
            .await
            .expect("update succeeds");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["score"], json!(10));
    }

    #[tokio::test]
    async fn delete_returns_removed_rows() {
        let store = store();
        let removed = store
            .delete("goals", &Filter::new().eq("user_id", "u1"))
            .await
            .expect("delete succeeds");
        assert_eq!(removed.len(), 2);
        assert_eq!(store.rows("goals").len(), 1);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let store = store();
        store.fail_next(StoreError::Network("refused".into()));
        let request = SelectRequest::table("goals");
        assert!(store.select(&request).await.is_err());
        assert!(store.select(&request).await.is_ok());
        assert_eq!(store.calls().select, 2);
    }
}
