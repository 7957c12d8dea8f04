//! The bipartite parent/child link graph.
//!
//! Every load reports the `(parent row, child row)` pairs it observed, and
//! the [`RowLinkTracker`] is where they accumulate. The closure walk reads
//! this graph; nothing else does. Links reference rows by view and rowId
//! string, never by object, so a reloaded row list cannot leave dangling
//! references behind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifier of one open browser view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewId(u64);

impl ViewId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

type Endpoints = HashMap<String, Vec<(ViewId, String)>>;

/// All currently known parent/child links between loaded rows.
#[derive(Debug, Default)]
pub struct RowLinkTracker {
    /// parent view -> parent rowId -> (child view, child rowId)
    forward: HashMap<ViewId, Endpoints>,
    /// child view -> child rowId -> (parent view, parent rowId)
    backward: HashMap<ViewId, Endpoints>,
}

impl RowLinkTracker {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observed pair. Returns whether the pair was new.
    pub fn record(
        &mut self,
        parent_view: ViewId,
        parent_row_id: &str,
        child_view: ViewId,
        child_row_id: &str,
    ) -> bool {
        let children = self
            .forward
            .entry(parent_view)
            .or_default()
            .entry(parent_row_id.to_string())
            .or_default();
        let child = (child_view, child_row_id.to_string());
        if children.contains(&child) {
            return false;
        }
        children.push(child);
        self.backward
            .entry(child_view)
            .or_default()
            .entry(child_row_id.to_string())
            .or_default()
            .push((parent_view, parent_row_id.to_string()));
        true
    }

    /// Drop every link from `parent_view` into `child_view`.
    ///
    /// Called before a reload of `child_view` re-reports its links, so stale
    /// edges to replaced rows disappear.
    pub fn clear_pair(&mut self, parent_view: ViewId, child_view: ViewId) {
        if let Some(endpoints) = self.forward.get_mut(&parent_view) {
            for children in endpoints.values_mut() {
                children.retain(|(view, _)| *view != child_view);
            }
            endpoints.retain(|_, children| !children.is_empty());
        }
        if let Some(endpoints) = self.backward.get_mut(&child_view) {
            for parents in endpoints.values_mut() {
                parents.retain(|(view, _)| *view != parent_view);
            }
            endpoints.retain(|_, parents| !parents.is_empty());
        }
    }

    /// Drop every link touching `view`. Called when a view closes.
    pub fn clear_view(&mut self, view: ViewId) {
        self.forward.remove(&view);
        self.backward.remove(&view);
        for endpoints in self.forward.values_mut() {
            for children in endpoints.values_mut() {
                children.retain(|(v, _)| *v != view);
            }
            endpoints.retain(|_, children| !children.is_empty());
        }
        for endpoints in self.backward.values_mut() {
            for parents in endpoints.values_mut() {
                parents.retain(|(v, _)| *v != view);
            }
            endpoints.retain(|_, parents| !parents.is_empty());
        }
    }

    /// Children of `(view, row_id)`.
    #[must_use]
    pub fn children_of(&self, view: ViewId, row_id: &str) -> &[(ViewId, String)] {
        self.forward
            .get(&view)
            .and_then(|e| e.get(row_id))
            .map_or(&[], Vec::as_slice)
    }

    /// Parents of `(view, row_id)`.
    #[must_use]
    pub fn parents_of(&self, view: ViewId, row_id: &str) -> &[(ViewId, String)] {
        self.backward
            .get(&view)
            .and_then(|e| e.get(row_id))
            .map_or(&[], Vec::as_slice)
    }

    /// Total number of recorded pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Whether the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
