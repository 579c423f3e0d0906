// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

/// Category of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Query,
    Mutation,
    Auth,
    Cache,
    Error,
}

impl EventKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Auth => "auth",
            Self::Cache => "cache",
            Self::Error => "error",
        }
    }
}

/// Whether the recorded operation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }
}

/// A single recorded telemetry event.
///
/// The `id` is assigned by the recorder and is unique within it. The
/// timestamp is captured at record time as milliseconds since the Unix
/// epoch, which keeps the serialized form flat.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub id: u64,
    pub timestamp_ms: u64,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

/// An event under construction, before the recorder assigns an id and a
/// timestamp.
///
/// The typed `Recorder::record_*` helpers build drafts for the common
/// shapes; `Recorder::record` accepts a draft directly when extra
/// metadata is needed.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub(crate) kind: EventKind,
    pub(crate) table: Option<String>,
    pub(crate) operation: Option<String>,
    pub(crate) duration: Option<Duration>,
    pub(crate) outcome: Outcome,
    pub(crate) cache_hit: Option<bool>,
    pub(crate) error_message: Option<String>,
    pub(crate) metadata: BTreeMap<String, Value>,
}

impl EventDraft {
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            table: None,
            operation: None,
            duration: None,
            outcome: Outcome::Success,
            cache_hit: None,
            error_message: None,
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    #[must_use]
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub fn outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    #[must_use]
    pub fn cache_hit(mut self, hit: bool) -> Self {
        self.cache_hit = Some(hit);
        self
    }

    #[must_use]
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.outcome = Outcome::Error;
        self.error_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
