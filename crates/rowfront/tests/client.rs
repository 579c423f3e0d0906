// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end tests of the composed client over the in-memory backend.

use std::time::Duration;

use rowfront::{Client, Filter, MemoryStore, MutationOptions, SelectOptions, SelectRequest, StoreError};
use serde_json::json;

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.seed(
        "goals",
        [
            json!({"id": "g1", "user_id": "u1", "title": "Run", "done": false}),
            json!({"id": "g2", "user_id": "u1", "title": "Swim", "done": true}),
        ],
    );
    store
}

fn goals_for_u1() -> SelectRequest {
    SelectRequest::table("goals").filter(Filter::new().eq("user_id", "u1"))
}

#[tokio::test]
async fn repeated_reads_are_served_from_cache() {
    let store = seeded_store();
    let client = Client::new(store.clone());

    let first = client.select(goals_for_u1()).await.expect("first read");
    let second = client.select(goals_for_u1()).await.expect("second read");

    assert_eq!(first, second);
    assert_eq!(store.calls().select, 1);

    let stats = client.cache().stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_identical_reads_share_one_backend_call() {
    let store = seeded_store();
    store.set_latency(Duration::from_millis(50));
    let client = Client::new(store.clone());

    let (a, b) = tokio::join!(client.select(goals_for_u1()), client.select(goals_for_u1()));

    assert_eq!(a.expect("first caller"), b.expect("second caller"));
    assert_eq!(store.calls().select, 1);
}

#[tokio::test(start_paused = true)]
async fn transient_read_failures_are_retried() {
    let store = seeded_store();
    store.fail_next(StoreError::Network("connection refused".into()));
    let client = Client::new(store.clone());

    let rows = client.select(goals_for_u1()).await.expect("retry recovers");
    assert_eq!(rows.len(), 2);
    assert_eq!(store.calls().select, 2);
}

#[tokio::test]
async fn permanent_read_failures_are_not_retried() {
    let store = seeded_store();
    store.fail_next(StoreError::InvalidRequest("no such column".into()));
    let client = Client::new(store.clone());

    let error = client.select(goals_for_u1()).await.expect_err("fails fast");
    assert_eq!(error, StoreError::InvalidRequest("no such column".into()));
    assert_eq!(store.calls().select, 1);
}

#[tokio::test]
async fn mutations_invalidate_cached_reads_of_the_table() {
    let store = seeded_store();
    let client = Client::new(store.clone());

    client.select(goals_for_u1()).await.expect("warm the cache");
    client
        .update("goals", Filter::new().eq("id", "g1"), json!({"done": true}))
        .await
        .expect("update succeeds");

    let rows = client.select(goals_for_u1()).await.expect("fresh read");
    assert_eq!(store.calls().select, 2);
    let g1 = rows.iter().find(|r| r["id"] == json!("g1")).expect("g1 present");
    assert_eq!(g1["done"], json!(true));
    assert_eq!(g1.get("__optimistic"), None);
}

#[tokio::test]
async fn failed_mutations_leave_the_cache_alone_and_roll_back() {
    let store = seeded_store();
    let client = Client::new(store.clone());

    client.select(goals_for_u1()).await.expect("warm the cache");
    store.fail_next(StoreError::Constraint("row level security".into()));

    let error = client
        .update("goals", Filter::new().eq("id", "g1"), json!({"done": true}))
        .await
        .expect_err("update fails");
    assert_eq!(error, StoreError::Constraint("row level security".into()));

    // The cached read is still valid and the failed change is not shown.
    let rows = client.select(goals_for_u1()).await.expect("cached read");
    assert_eq!(store.calls().select, 1);
    let g1 = rows.iter().find(|r| r["id"] == json!("g1")).expect("g1 present");
    assert_eq!(g1["done"], json!(false));
}

#[tokio::test(start_paused = true)]
async fn pending_mutations_are_visible_before_the_backend_confirms() {
    let store = seeded_store();
    let client = Client::new(store.clone());

    let base = client.select(goals_for_u1()).await.expect("warm view");
    store.set_latency(Duration::from_millis(50));

    let update = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .update("goals", Filter::new().eq("id", "g1"), json!({"done": true}))
                .await
        }
    });
    tokio::task::yield_now().await;

    // The backend has not answered yet; the overlay already shows the
    // change, flagged as not yet confirmed.
    let view = client.overlay().apply("goals", &base);
    let g1 = view.iter().find(|r| r["id"] == json!("g1")).expect("g1 present");
    assert_eq!(g1["done"], json!(true));
    assert_eq!(g1["__optimistic"], json!(true));

    let updated = update.await.expect("task finishes").expect("update succeeds");
    assert_eq!(updated[0]["done"], json!(true));

    // A fresh read shows the confirmed state without the flag.
    let rows = client.select(goals_for_u1()).await.expect("fresh read");
    let g1 = rows.iter().find(|r| r["id"] == json!("g1")).expect("g1 present");
    assert_eq!(g1["done"], json!(true));
    assert_eq!(g1.get("__optimistic"), None);
}

#[tokio::test]
async fn mutation_retries_are_opt_in() {
    let store = seeded_store();
    let client = Client::new(store.clone());

    store.fail_next(StoreError::Network("reset".into()));
    assert!(
        client
            .update("goals", Filter::new().eq("id", "g1"), json!({"done": true}))
            .await
            .is_err()
    );
    assert_eq!(store.calls().update, 1);
}

#[tokio::test(start_paused = true)]
async fn mutation_retries_recover_when_enabled() {
    let store = seeded_store();
    let client = Client::new(store.clone());

    store.fail_next(StoreError::Network("reset".into()));
    let rows = client
        .update_with(
            "goals",
            Filter::new().eq("id", "g1"),
            json!({"done": true}),
            MutationOptions::new().retry(true),
        )
        .await
        .expect("retry recovers");
    assert_eq!(rows[0]["done"], json!(true));
    assert_eq!(store.calls().update, 2);
}

#[tokio::test]
async fn inserted_rows_come_back_with_backend_ids() {
    let store = MemoryStore::new();
    let client = Client::new(store.clone());

    let rows = client
        .insert("goals", json!({"title": "Row", "user_id": "u1"}))
        .await
        .expect("insert succeeds");
    assert_eq!(rows[0]["id"], json!("row_1"));
}

#[tokio::test]
async fn single_reads_return_one_row_or_not_found() {
    let store = seeded_store();
    let client = Client::new(store.clone());

    let row = client
        .select_single(SelectRequest::table("goals").filter(Filter::new().eq("id", "g1")))
        .await
        .expect("row exists");
    assert_eq!(row["title"], json!("Run"));

    let error = client
        .select_single(SelectRequest::table("goals").filter(Filter::new().eq("id", "nope")))
        .await
        .expect_err("no match");
    assert_eq!(error, StoreError::NotFound);
}

#[tokio::test]
async fn fresh_options_bypass_cache_and_dedup() {
    let store = seeded_store();
    let client = Client::new(store.clone());

    client.select(goals_for_u1()).await.expect("warm the cache");
    client
        .select_with(goals_for_u1(), SelectOptions::fresh())
        .await
        .expect("forced backend read");
    assert_eq!(store.calls().select, 2);
}

#[tokio::test]
async fn telemetry_observes_the_whole_pipeline() {
    let store = seeded_store();
    let client = Client::new(store.clone());

    client.select(goals_for_u1()).await.expect("miss");
    client.select(goals_for_u1()).await.expect("hit");
    store.fail_next(StoreError::Constraint("dup".into()));
    let _ = client.insert("goals", json!({"title": "Dup"})).await;

    let stats = client.recorder().stats();
    // One query event per backend call; the cache hit records only a
    // cache event.
    assert_eq!(stats.by_kind.get("query"), Some(&1));
    assert_eq!(stats.by_kind.get("cache"), Some(&2));
    assert_eq!(stats.by_kind.get("mutation"), Some(&1));
    assert_eq!(stats.by_kind.get("error"), Some(&1));
    assert!((stats.cache_hit_rate - 0.5).abs() < f64::EPSILON);
    assert_eq!(store.calls().select, 1);
}
