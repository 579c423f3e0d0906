// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Overlay entry model: one record per in-flight local mutation.

use std::fmt::{Display, Formatter};

use serde_json::Value;

/// Opaque handle to one staged mutation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct OverlayId(pub(crate) u64);

impl Display for OverlayId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "overlay#{}", self.0)
    }
}

/// The kind of local mutation an entry represents.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationKind {
    /// A new row not yet known to the server.
    Insert,
    /// A patch over an existing row.
    Update,
    /// A tombstone for an existing row.
    Delete,
}

/// Lifecycle of an entry.
///
/// Entries are created `Pending`, and move to `Confirmed` or `Failed`
/// exactly once when the backing network call settles.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryStatus {
    /// The write is still in flight; views show the optimistic guess.
    Pending,
    /// The server accepted the write; views show the authoritative row.
    Confirmed,
    /// The write failed; views fall back to the original data.
    Failed,
}

/// One staged mutation.
#[derive(Clone, Debug)]
pub struct OverlayEntry {
    /// Handle used to confirm or fail the entry.
    pub id: OverlayId,
    /// Table the mutation belongs to.
    pub table: String,
    /// Kind of mutation.
    pub kind: MutationKind,
    /// The `"id"` of the affected row (a synthesized temp id for inserts).
    pub row_id: Value,
    /// The local guess: the whole row for inserts, the patch for updates,
    /// `Null` for deletes.
    pub optimistic: Value,
    /// Snapshot taken when staging, used for rollback.
    pub original: Option<Value>,
    /// Authoritative row supplied on confirmation, if any.
    pub server_row: Option<Value>,
    /// Current lifecycle state.
    pub status: EntryStatus,
    /// Failure message, present only when `status` is `Failed`.
    pub error: Option<String>,
}

impl OverlayEntry {
    /// Whether this entry still influences views of its table.
    ///
    /// Failed entries are inert: views fall back to the base data, which
    /// already is the original.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status != EntryStatus::Failed
    }
}
