// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::Serialize;

use crate::event::TelemetryEvent;

/// One flush payload. Serializes as `{"events": [...], "timestamp_ms": n}`.
#[derive(Debug, Clone, Serialize)]
pub struct FlushBatch {
    pub events: Vec<TelemetryEvent>,
    pub timestamp_ms: u64,
}

/// Error delivering a flush batch.
#[derive(Debug, Clone, thiserror::Error)]
#[error("telemetry sink: {0}")]
pub struct SinkError(pub String);

impl SinkError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Destination for flushed telemetry batches.
///
/// Implementations own the transport and the wire encoding;
/// [`FlushBatch`] is `Serialize` so a JSON body is one
/// `serde_json::to_vec` away. Delivery is all or nothing per batch. A
/// failed batch is re-queued by the recorder, so implementations should
/// not retry internally.
pub trait EventSink {
    fn deliver(&self, batch: &FlushBatch) -> impl Future<Output = Result<(), SinkError>> + Send;
}
