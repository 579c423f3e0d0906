// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The tracker: staging, settlement, and view application.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde_json::Value;

use crate::{EntryStatus, MutationKind, OPTIMISTIC_FLAG, OverlayEntry, OverlayId};

struct State {
    next_id: u64,
    /// In staging order; apply() replays entries oldest-first so later
    /// mutations of the same row win.
    entries: Vec<OverlayEntry>,
}

/// Tracks in-flight local mutations and overlays them onto base data.
///
/// The tracker is a cheaply cloneable handle over shared state. Staging and
/// settlement are synchronous; [`OverlayTracker::apply`] is pure and can be
/// called on every re-render.
///
/// Settled (confirmed or failed) entries are retained so views keep
/// showing confirmed server rows until fresh data arrives, then dropped by
/// [`OverlayTracker::purge_settled`]; callers invoke it once a re-fetch
/// of the table has succeeded and the overlay is redundant.
pub struct OverlayTracker {
    state: Arc<Mutex<State>>,
}

impl Default for OverlayTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for OverlayTracker {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl Debug for OverlayTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayTracker")
            .field("entries", &self.state.lock().entries.len())
            .finish()
    }
}

impl OverlayTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Stages a row insertion.
    ///
    /// If the row has no `"id"`, a temporary one (`temp_<ms>_<seq>`) is
    /// synthesized so the synthetic row is addressable until the server
    /// assigns the real id.
    pub fn stage_insert(&self, table: impl Into<String>, mut row: Value) -> OverlayId {
        let mut state = self.state.lock();
        let seq = state.next_id;

        let row_id = match row.get("id") {
            Some(id) if !id.is_null() => id.clone(),
            _ => {
                let temp = Value::String(temp_id(seq));
                if let Some(fields) = row.as_object_mut() {
                    fields.insert("id".to_string(), temp.clone());
                }
                temp
            }
        };

        Self::push(&mut state, table.into(), MutationKind::Insert, row_id, row, None)
    }

    /// Stages a patch over the row identified by `row_id`.
    ///
    /// `original` is the pre-mutation snapshot used for rollback; pass it
    /// whenever the caller has the row at hand.
    pub fn stage_update(&self, table: impl Into<String>, row_id: Value, patch: Value, original: Option<Value>) -> OverlayId {
        let mut state = self.state.lock();
        Self::push(&mut state, table.into(), MutationKind::Update, row_id, patch, original)
    }

    /// Stages a tombstone for the row identified by `row_id`.
    pub fn stage_delete(&self, table: impl Into<String>, row_id: Value, original: Option<Value>) -> OverlayId {
        let mut state = self.state.lock();
        Self::push(&mut state, table.into(), MutationKind::Delete, row_id, Value::Null, original)
    }

    /// Marks an entry confirmed, adopting the server's row when provided.
    ///
    /// Unknown ids are ignored (the entry may already have been purged).
    pub fn confirm(&self, id: OverlayId, server_row: Option<Value>) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.iter_mut().find(|entry| entry.id == id) {
            entry.status = EntryStatus::Confirmed;
            entry.server_row = server_row;
            entry.error = None;
        }
    }

    /// Marks an entry failed; views revert to the original data.
    pub fn fail(&self, id: OverlayId, error: impl Into<String>) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.iter_mut().find(|entry| entry.id == id) {
            entry.status = EntryStatus::Failed;
            entry.error = Some(error.into());
        }
    }

    /// Returns a snapshot of an entry.
    #[must_use]
    pub fn entry(&self, id: OverlayId) -> Option<OverlayEntry> {
        self.state.lock().entries.iter().find(|entry| entry.id == id).cloned()
    }

    /// Returns snapshots of all entries for a table, in staging order.
    #[must_use]
    pub fn entries(&self, table: &str) -> Vec<OverlayEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.table == table)
            .cloned()
            .collect()
    }

    /// Number of pending (unsettled) entries for a table.
    #[must_use]
    pub fn pending_len(&self, table: &str) -> usize {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.table == table && entry.status == EntryStatus::Pending)
            .count()
    }

    /// Drops settled (confirmed or failed) entries for a table.
    ///
    /// Returns the number removed. Call after a fresh fetch of the table
    /// succeeds; from then on the base data is authoritative.
    pub fn purge_settled(&self, table: &str) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|entry| entry.table != table || entry.status == EntryStatus::Pending);
        before - state.entries.len()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Returns a new vector: `base` viewed through this table's overlay.
    ///
    /// Pure and idempotent: `base` is never mutated and repeated calls
    /// with unchanged tracker state yield identical output. Pending
    /// updates merge their patch and set [`OPTIMISTIC_FLAG`]; pending and
    /// confirmed deletes drop the row; pending inserts append flagged
    /// synthetic rows; confirmed entries substitute the server's row,
    /// unflagged, falling back to the staged row when confirmation carried
    /// none; failed entries have no effect.
    #[must_use]
    pub fn apply(&self, table: &str, base: &[Value]) -> Vec<Value> {
        let entries = self.entries(table);
        if entries.is_empty() {
            return base.to_vec();
        }

        let mut view: Vec<Value> = Vec::with_capacity(base.len());

        for row in base {
            let mut current = Some(row.clone());
            for entry in entries.iter().filter(|entry| row_matches(row, &entry.row_id)) {
                current = match current {
                    Some(row) => apply_entry(row, entry),
                    None => None,
                };
            }
            if let Some(row) = current {
                view.push(row);
            }
        }

        // Inserts not present in the base data.
        for entry in &entries {
            if entry.kind != MutationKind::Insert || !entry.is_live() {
                continue;
            }
            if view.iter().any(|row| row_matches(row, &entry.row_id)) {
                continue;
            }
            if entry.status == EntryStatus::Pending {
                let mut row = entry.optimistic.clone();
                mark_optimistic(&mut row);
                view.push(row);
                continue;
            }
            // Confirmed. When confirmation carried no server row the
            // staged row stands, but it is no longer a guess.
            let row = entry.server_row.as_ref().unwrap_or(&entry.optimistic);
            if !view.iter().any(|existing| ids_match(existing.get("id"), row.get("id"))) {
                view.push(row.clone());
            }
        }

        view
    }

    fn push(
        state: &mut State,
        table: String,
        kind: MutationKind,
        row_id: Value,
        optimistic: Value,
        original: Option<Value>,
    ) -> OverlayId {
        let id = OverlayId(state.next_id);
        state.next_id += 1;
        state.entries.push(OverlayEntry {
            id,
            table,
            kind,
            row_id,
            optimistic,
            original,
            server_row: None,
            status: EntryStatus::Pending,
            error: None,
        });
        id
    }
}

/// Applies one entry to a row already known to match its `row_id`.
fn apply_entry(row: Value, entry: &OverlayEntry) -> Option<Value> {
    match (entry.kind, entry.status) {
        (MutationKind::Delete, EntryStatus::Pending | EntryStatus::Confirmed) => None,
        (MutationKind::Update, EntryStatus::Pending) => {
            let mut merged = merge_patch(row, &entry.optimistic);
            mark_optimistic(&mut merged);
            Some(merged)
        }
        (MutationKind::Update | MutationKind::Insert, EntryStatus::Confirmed) => match &entry.server_row {
            Some(server_row) => Some(server_row.clone()),
            // No returning data: the patch stands, but it is no longer a guess.
            None => Some(merge_patch(row, &entry.optimistic)),
        },
        // Failed entries (and pending inserts already present in base)
        // leave the row untouched.
        _ => Some(row),
    }
}

/// Shallow-merges `patch`'s fields over `row`.
fn merge_patch(mut row: Value, patch: &Value) -> Value {
    if let (Some(fields), Some(patch_fields)) = (row.as_object_mut(), patch.as_object()) {
        for (key, value) in patch_fields {
            fields.insert(key.clone(), value.clone());
        }
    }
    row
}

fn mark_optimistic(row: &mut Value) {
    if let Some(fields) = row.as_object_mut() {
        fields.insert(OPTIMISTIC_FLAG.to_string(), Value::Bool(true));
    }
}

fn row_matches(row: &Value, row_id: &Value) -> bool {
    ids_match(row.get("id"), Some(row_id))
}

fn ids_match(a: Option<&Value>, b: Option<&Value>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

fn temp_id(seq: u64) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("temp_{millis}_{seq}")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_is_shallow() {
        let row = json!({"id": "r1", "a": 1, "nested": {"x": 1}});
        let merged = merge_patch(row, &json!({"a": 2, "nested": {"y": 2}}));
        assert_eq!(merged, json!({"id": "r1", "a": 2, "nested": {"y": 2}}));
    }

    #[test]
    fn non_object_rows_pass_through_unmarked() {
        let mut value = json!("scalar");
        mark_optimistic(&mut value);
        assert_eq!(value, json!("scalar"));
    }

    #[test]
    fn temp_ids_are_unique_per_sequence() {
        assert_ne!(temp_id(0), temp_id(1));
    }

    #[test]
    fn stage_insert_synthesizes_missing_id() {
        let tracker = OverlayTracker::new();
        let id = tracker.stage_insert("goals", json!({"title": "Run"}));
        let entry = tracker.entry(id).expect("entry exists");
        let row_id = entry.row_id.as_str().expect("string id");
        assert!(row_id.starts_with("temp_"));
        assert_eq!(entry.optimistic["id"], entry.row_id);
    }

    #[test]
    fn stage_insert_keeps_existing_id() {
        let tracker = OverlayTracker::new();
        let id = tracker.stage_insert("goals", json!({"id": "g9", "title": "Run"}));
        let entry = tracker.entry(id).expect("entry exists");
        assert_eq!(entry.row_id, json!("g9"));
    }
}
