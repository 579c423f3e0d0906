// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for batch flushing.

use std::sync::Arc;

use parking_lot::Mutex;
use pulse::{EventSink, FlushBatch, Outcome, Recorder, SinkError};

/// Sink that records delivered batches and fails on demand.
#[derive(Clone, Default)]
struct ScriptedSink {
    delivered: Arc<Mutex<Vec<Vec<u64>>>>,
    fail_next: Arc<Mutex<bool>>,
}

impl ScriptedSink {
    fn fail_next(&self) {
        *self.fail_next.lock() = true;
    }

    fn delivered_ids(&self) -> Vec<Vec<u64>> {
        self.delivered.lock().clone()
    }
}

impl EventSink for ScriptedSink {
    async fn deliver(&self, batch: &FlushBatch) -> Result<(), SinkError> {
        let mut fail = self.fail_next.lock();
        if *fail {
            *fail = false;
            return Err(SinkError::new("scripted failure"));
        }
        self.delivered.lock().push(batch.events.iter().map(|e| e.id).collect());
        Ok(())
    }
}

#[tokio::test]
async fn successful_flush_empties_the_buffer() {
    let recorder = Recorder::default();
    let sink = ScriptedSink::default();

    recorder.record_auth("sign_in", Outcome::Success);
    recorder.record_auth("sign_out", Outcome::Success);

    let delivered = recorder.flush(&sink).await.expect("delivery succeeds");
    assert_eq!(delivered, 2);
    assert!(recorder.is_empty());
    assert_eq!(sink.delivered_ids(), vec![vec![0, 1]]);
}

#[tokio::test]
async fn flushing_an_empty_buffer_skips_the_sink() {
    let recorder = Recorder::default();
    let sink = ScriptedSink::default();

    assert_eq!(recorder.flush(&sink).await.expect("no-op flush"), 0);
    assert!(sink.delivered_ids().is_empty());
}

#[tokio::test]
async fn failed_flush_requeues_the_batch_exactly_once() {
    let recorder = Recorder::default();
    let sink = ScriptedSink::default();

    recorder.record_auth("sign_in", Outcome::Success);
    recorder.record_auth("sign_out", Outcome::Success);

    sink.fail_next();
    assert!(recorder.flush(&sink).await.is_err());

    // Nothing lost, nothing duplicated.
    let ids: Vec<u64> = recorder.events().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![0, 1]);

    // The retry delivers the same batch.
    let delivered = recorder.flush(&sink).await.expect("second attempt succeeds");
    assert_eq!(delivered, 2);
    assert_eq!(sink.delivered_ids(), vec![vec![0, 1]]);
}

#[tokio::test]
async fn requeued_batch_lands_ahead_of_newer_events() {
    let recorder = Recorder::default();
    let sink = ScriptedSink::default();

    recorder.record_auth("a", Outcome::Success);
    sink.fail_next();
    assert!(recorder.flush(&sink).await.is_err());
    recorder.record_auth("b", Outcome::Success);

    let ops: Vec<String> = recorder.events().into_iter().filter_map(|e| e.operation).collect();
    assert_eq!(ops, vec!["a", "b"]);
}

#[tokio::test]
async fn requeue_respects_capacity_by_dropping_oldest() {
    let recorder = Recorder::builder().max_events(2).build();
    let sink = ScriptedSink::default();

    recorder.record_auth("a", Outcome::Success);
    recorder.record_auth("b", Outcome::Success);
    sink.fail_next();
    assert!(recorder.flush(&sink).await.is_err());

    // An event recorded mid-flush would push the buffer over capacity;
    // simulate that by recording after the failed requeue and trimming
    // through another failing flush.
    recorder.record_auth("c", Outcome::Success);
    sink.fail_next();
    assert!(recorder.flush(&sink).await.is_err());

    let ops: Vec<String> = recorder.events().into_iter().filter_map(|e| e.operation).collect();
    assert_eq!(ops, vec!["b", "c"]);
}

#[test]
fn batches_serialize_with_a_flat_envelope() {
    let recorder = Recorder::default();
    recorder.record_cache("goals", true);

    let batch = FlushBatch {
        events: recorder.events(),
        timestamp_ms: 1_000,
    };
    let body = serde_json::to_value(&batch).expect("serializable");
    assert_eq!(body["timestamp_ms"], 1_000);
    assert_eq!(body["events"][0]["kind"], "cache");
    assert_eq!(body["events"][0]["table"], "goals");
    assert_eq!(body["events"][0]["cache_hit"], true);
}
