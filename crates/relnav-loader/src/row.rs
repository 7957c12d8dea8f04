//! The browser-level row model.
//!
//! A [`Row`] is one loaded table row plus the bookkeeping the browser needs:
//! its identifying predicate, its key tuple, and which parent produced it.
//! Rows are value-identified by [`Row::row_id`], never by object identity;
//! the same logical row may be produced by multiple parent blocks.

use relnav_core::Value;

/// One loaded row of the target table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// A SQL predicate uniquely identifying the row by primary key,
    /// NULL-safe (`"col" is null` for null key parts). A synthetic `#n`
    /// sequence id when the table has no usable key.
    ///
    /// Stable for the lifetime of one load; used as the dedup key and as a
    /// re-query fragment.
    pub row_id: String,
    /// Primary-key column/value pairs, in key order. Empty when the table
    /// has no usable key.
    pub primary_key: Vec<(String, Value)>,
    /// The value tuple, column-aligned with the table.
    pub values: Vec<Value>,
    /// Index of the owning parent in the parent batch, for block-aligned
    /// rendering. `None` for rows loaded without parents.
    pub parent_model_index: Option<usize>,
}

impl Row {
    /// Whether the row carries a real key-derived id (as opposed to a
    /// synthetic sequence id that cannot be re-queried).
    #[must_use]
    pub fn has_stable_id(&self) -> bool {
        !self.primary_key.is_empty()
    }
}

/// One observed parent/child edge, reported exactly once per distinct pair
/// per load, including pairs whose child row was deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLink {
    /// Index of the parent in the parent batch.
    pub parent_index: usize,
    /// The child row's id.
    pub child_row_id: String,
}

/// The complete outcome of one loader pass.
///
/// Applied atomically by the coordinating thread: either all of it replaces
/// the view's row list, or none of it does.
#[derive(Debug, Clone, Default)]
pub struct LoadResult {
    /// Retained rows, at most `limit` of them.
    pub rows: Vec<Row>,
    /// The backend had at least one more row than `limit`.
    pub limit_exceeded: bool,
    /// Truncation cut off a row whose parent is in the caller's closure.
    pub closure_limit_exceeded: bool,
    /// Rows suppressed by deduplication.
    pub distinct_suppressed: usize,
    /// Total rows read from the backend, including suppressed ones.
    pub total_read: usize,
    /// Every observed parent/child pair.
    pub links: Vec<RowLink>,
}

/// Result of the bounded counting probe. Distinct from a full load; used for
/// menu badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCount {
    /// The count, or a lower bound when inexact.
    pub count: usize,
    /// Whether `count` is the true cardinality.
    pub is_exact: bool,
}
