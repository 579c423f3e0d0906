// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::event::{EventDraft, EventKind, Outcome, TelemetryEvent};
use crate::rnd::Rnd;
use crate::sink::{EventSink, FlushBatch, SinkError};

/// Aggregate view of the events currently buffered.
///
/// Flushed or trimmed events no longer contribute; the numbers describe
/// the buffer, not the lifetime of the recorder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryStats {
    pub total: usize,
    pub by_kind: BTreeMap<&'static str, usize>,
    pub by_table: BTreeMap<String, usize>,
    pub by_operation: BTreeMap<String, usize>,
    /// Fraction of buffered events with an error outcome.
    pub error_rate: f64,
    /// Fraction of cache events that were hits. Only `Cache` events count.
    pub cache_hit_rate: f64,
    /// Mean over events that carry a duration.
    pub mean_duration: Option<Duration>,
}

#[derive(Debug)]
struct State {
    next_id: u64,
    buffer: VecDeque<TelemetryEvent>,
}

/// Bounded in-memory event recorder with uniform sampling.
///
/// Events are kept in insertion order; when the buffer exceeds
/// `max_events` the oldest events are dropped. The sampling decision is
/// made at record time, so a dropped event costs one random draw and
/// nothing else.
///
/// Cloning is shallow; clones share the buffer.
#[derive(Clone, Debug)]
pub struct Recorder {
    state: Arc<Mutex<State>>,
    max_events: usize,
    sampling_rate: f64,
    rnd: Rnd,
}

impl Default for Recorder {
    fn default() -> Self {
        RecorderBuilder::new().build()
    }
}

impl Recorder {
    #[must_use]
    pub fn builder() -> RecorderBuilder {
        RecorderBuilder::new()
    }

    /// Records a draft, subject to sampling. Returns `true` when the
    /// event was kept.
    pub fn record(&self, draft: EventDraft) -> bool {
        if self.sampling_rate < 1.0 && self.rnd.next_f64() >= self.sampling_rate {
            return false;
        }

        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.buffer.push_back(TelemetryEvent {
            id,
            timestamp_ms: unix_millis_now(),
            kind: draft.kind,
            table: draft.table,
            operation: draft.operation,
            duration_ms: draft.duration.map(duration_to_millis),
            outcome: draft.outcome,
            cache_hit: draft.cache_hit,
            error_message: draft.error_message,
            metadata: draft.metadata,
        });
        while state.buffer.len() > self.max_events {
            state.buffer.pop_front();
        }
        true
    }

    pub fn record_query(&self, table: &str, duration: Duration, outcome: Outcome, cache_hit: bool) {
        self.record(
            EventDraft::new(EventKind::Query)
                .table(table)
                .operation("select")
                .duration(duration)
                .outcome(outcome)
                .cache_hit(cache_hit),
        );
    }

    pub fn record_mutation(&self, table: &str, operation: &str, duration: Duration, outcome: Outcome) {
        self.record(
            EventDraft::new(EventKind::Mutation)
                .table(table)
                .operation(operation)
                .duration(duration)
                .outcome(outcome),
        );
    }

    pub fn record_auth(&self, operation: &str, outcome: Outcome) {
        self.record(EventDraft::new(EventKind::Auth).operation(operation).outcome(outcome));
    }

    pub fn record_cache(&self, table: &str, hit: bool) {
        self.record(EventDraft::new(EventKind::Cache).table(table).cache_hit(hit));
    }

    pub fn record_error(&self, operation: &str, message: &str) {
        self.record(EventDraft::new(EventKind::Error).operation(operation).error_message(message));
    }

    /// Number of events currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().buffer.is_empty()
    }

    /// Snapshot of the buffered events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.state.lock().buffer.iter().cloned().collect()
    }

    /// Drops all buffered events.
    pub fn clear(&self) {
        self.state.lock().buffer.clear();
    }

    /// Computes aggregate statistics over the buffered events.
    #[must_use]
    pub fn stats(&self) -> TelemetryStats {
        let state = self.state.lock();
        let mut stats = TelemetryStats {
            total: state.buffer.len(),
            ..TelemetryStats::default()
        };

        let mut errors = 0usize;
        let mut cache_events = 0usize;
        let mut cache_hits = 0usize;
        let mut duration_sum = Duration::ZERO;
        let mut duration_count = 0u32;

        for event in &state.buffer {
            *stats.by_kind.entry(event.kind.label()).or_default() += 1;
            if let Some(table) = &event.table {
                *stats.by_table.entry(table.clone()).or_default() += 1;
            }
            if let Some(operation) = &event.operation {
                *stats.by_operation.entry(operation.clone()).or_default() += 1;
            }
            if event.outcome.is_error() {
                errors += 1;
            }
            if event.kind == EventKind::Cache {
                cache_events += 1;
                if event.cache_hit == Some(true) {
                    cache_hits += 1;
                }
            }
            if let Some(ms) = event.duration_ms {
                duration_sum += Duration::from_millis(ms);
                duration_count += 1;
            }
        }

        stats.error_rate = ratio(errors, stats.total);
        stats.cache_hit_rate = ratio(cache_hits, cache_events);
        stats.mean_duration = (duration_count > 0).then(|| duration_sum / duration_count);
        stats
    }

    /// Drains the buffer and delivers it to the sink as one batch.
    ///
    /// On delivery failure the failed batch is put back at the front of
    /// the buffer, ahead of any events recorded while the delivery was
    /// in flight, and the buffer is trimmed to capacity from the oldest
    /// end. Each event is therefore delivered at most once per flush
    /// attempt and never duplicated in the buffer.
    ///
    /// Returns the number of events delivered.
    pub async fn flush<S: EventSink>(&self, sink: &S) -> Result<usize, SinkError> {
        let events: Vec<TelemetryEvent> = {
            let mut state = self.state.lock();
            state.buffer.drain(..).collect()
        };
        if events.is_empty() {
            return Ok(0);
        }

        let batch = FlushBatch {
            events,
            timestamp_ms: unix_millis_now(),
        };
        match sink.deliver(&batch).await {
            Ok(()) => Ok(batch.events.len()),
            Err(error) => {
                tracing::warn!(batch_len = batch.events.len(), %error, "telemetry flush failed, re-queueing batch");
                let mut state = self.state.lock();
                for event in batch.events.into_iter().rev() {
                    state.buffer.push_front(event);
                }
                while state.buffer.len() > self.max_events {
                    state.buffer.pop_front();
                }
                Err(error)
            }
        }
    }
}

/// Builder for [`Recorder`].
#[derive(Clone, Debug)]
pub struct RecorderBuilder {
    max_events: usize,
    sampling_rate: f64,
    rnd: Rnd,
}

impl Default for RecorderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_events: 1000,
            sampling_rate: 1.0,
            rnd: Rnd::default(),
        }
    }

    /// Buffer capacity. Values below 1 are clamped to 1.
    #[must_use]
    pub fn max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events.max(1);
        self
    }

    /// Fraction of events to keep, clamped to `[0.0, 1.0]`.
    #[must_use]
    pub fn sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate.clamp(0.0, 1.0);
        self
    }

    #[cfg(test)]
    fn rnd(mut self, rnd: Rnd) -> Self {
        self.rnd = rnd;
        self
    }

    #[must_use]
    pub fn build(self) -> Recorder {
        Recorder {
            state: Arc::new(Mutex::new(State {
                next_id: 0,
                buffer: VecDeque::new(),
            })),
            max_events: self.max_events,
            sampling_rate: self.sampling_rate,
            rnd: self.rnd,
        }
    }
}

fn unix_millis_now() -> u64 {
    let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    duration_to_millis(since_epoch)
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_drops_oldest_first() {
        let recorder = Recorder::builder().max_events(2).build();
        recorder.record_cache("goals", true);
        recorder.record_cache("entries", false);
        recorder.record_cache("profiles", true);

        let tables: Vec<_> = recorder.events().into_iter().filter_map(|e| e.table).collect();
        assert_eq!(tables, vec!["entries", "profiles"]);
    }

    #[test]
    fn sampling_rate_zero_records_nothing() {
        let recorder = Recorder::builder().sampling_rate(0.0).build();
        assert!(!recorder.record(EventDraft::new(EventKind::Auth)));
        assert!(recorder.is_empty());
    }

    #[test]
    fn sampling_draw_is_compared_against_the_rate() {
        let below = Recorder::builder().sampling_rate(0.5).rnd(Rnd::new_fixed(0.49)).build();
        assert!(below.record(EventDraft::new(EventKind::Auth)));

        let at = Recorder::builder().sampling_rate(0.5).rnd(Rnd::new_fixed(0.5)).build();
        assert!(!at.record(EventDraft::new(EventKind::Auth)));
    }

    #[test]
    fn ids_stay_unique_across_trimming() {
        let recorder = Recorder::builder().max_events(1).build();
        recorder.record_auth("sign_in", Outcome::Success);
        recorder.record_auth("sign_out", Outcome::Success);

        assert_eq!(recorder.events()[0].id, 1);
    }

    #[test]
    fn stats_cover_rates_and_mean_duration() {
        let recorder = Recorder::default();
        recorder.record_query("goals", Duration::from_millis(100), Outcome::Success, false);
        recorder.record_query("goals", Duration::from_millis(300), Outcome::Error, false);
        recorder.record_cache("goals", true);
        recorder.record_cache("goals", false);

        let stats = recorder.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_kind.get("query"), Some(&2));
        assert_eq!(stats.by_kind.get("cache"), Some(&2));
        assert_eq!(stats.by_table.get("goals"), Some(&4));
        assert_eq!(stats.by_operation.get("select"), Some(&2));
        assert!((stats.error_rate - 0.25).abs() < f64::EPSILON);
        assert!((stats.cache_hit_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.mean_duration, Some(Duration::from_millis(200)));
    }

    #[test]
    fn stats_on_empty_buffer_are_zero() {
        let stats = Recorder::default().stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.error_rate, 0.0);
        assert_eq!(stats.cache_hit_rate, 0.0);
        assert_eq!(stats.mean_duration, None);
    }
}
