// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bounded, sampled telemetry recorder.
//!
//! [`Recorder`] keeps the most recent events in a fixed-size in-memory
//! buffer. Recording never blocks on I/O and never fails; delivery is a
//! separate, explicit step ([`Recorder::flush`]) against an injected
//! [`EventSink`]. A uniform sampling rate can shed load at record time.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use pulse::{Outcome, Recorder};
//!
//! let recorder = Recorder::builder().max_events(100).build();
//! recorder.record_query("goals", Duration::from_millis(12), Outcome::Success, true);
//! recorder.record_mutation("goals", "update", Duration::from_millis(40), Outcome::Success);
//!
//! let stats = recorder.stats();
//! assert_eq!(stats.total, 2);
//! assert!(stats.error_rate < f64::EPSILON);
//! ```

mod event;
mod recorder;
mod rnd;
mod sink;

pub use event::{EventDraft, EventKind, Outcome, TelemetryEvent};
pub use recorder::{Recorder, RecorderBuilder, TelemetryStats};
pub use sink::{EventSink, FlushBatch, SinkError};
