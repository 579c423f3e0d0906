// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pending-mutation overlay for responsive UIs.
//!
//! Server round-trips are slow relative to user interaction. This crate
//! provides [`OverlayTracker`], which records each local mutation the
//! moment it is issued and lets consumers view server data *through* those
//! pending changes, so the UI reflects the user's intent immediately while
//! the authoritative write is still in flight.
//!
//! When the write settles, the entry is [`confirmed`](OverlayTracker::confirm)
//! (the server's row replaces the guess) or [`failed`](OverlayTracker::fail)
//! (the overlay reverts to the original data). Consumers never deal with
//! network timing; they just re-run [`OverlayTracker::apply`] on whatever
//! base rows they have.
//!
//! Rows are `serde_json::Value` objects identified by their `"id"` field.
//! Rows synthesized for pending inserts, and rows with a pending patch
//! merged in, carry `"__optimistic": true` so a UI can render them
//! tentatively.
//!
//! # Example
//!
//! ```
//! use overlay::OverlayTracker;
//! use serde_json::json;
//!
//! let tracker = OverlayTracker::new();
//! let base = vec![json!({"id": "g1", "title": "Run", "done": false})];
//!
//! let entry = tracker.stage_update(
//!     "goals",
//!     json!("g1"),
//!     json!({"done": true}),
//!     Some(base[0].clone()),
//! );
//!
//! let view = tracker.apply("goals", &base);
//! assert_eq!(view[0]["done"], json!(true));
//! assert_eq!(view[0]["__optimistic"], json!(true));
//!
//! tracker.fail(entry, "permission denied");
//! let view = tracker.apply("goals", &base);
//! assert_eq!(view[0], base[0]); // rolled back
//! ```

mod entry;
mod tracker;

pub use entry::{EntryStatus, MutationKind, OverlayEntry, OverlayId};
pub use tracker::OverlayTracker;

/// Field set on rows whose current shape is a local guess.
pub const OPTIMISTIC_FLAG: &str = "__optimistic";
