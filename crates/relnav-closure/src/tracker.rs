//! Selection closure tracking.
//!
//! Selecting a row in one view highlights everything reachable from it in
//! every other open view. The [`ClosureTracker`] owns that state: the set of
//! `(view, rowId)` members, the per-view rowId index derived from it, and the
//! root of the current walk.
//!
//! Membership is recomputed wholesale on every selection or reload event.
//! Row lists are replaced atomically by reloads, so incremental patching
//! would chase references into lists that no longer exist; full recomputation
//! over rowId strings cannot.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::links::{RowLinkTracker, ViewId};

/// A reachability walk over materialized rows.
///
/// Supplied by the caller so view-specific concerns (direction filters,
/// hidden views) stay out of the tracker. [`LinkWalk`] is the standard
/// implementation.
pub trait ClosureWalk {
    /// Insert every `(view, rowId)` reachable from the root into `out`,
    /// including the root itself.
    fn find_closure(&self, view: ViewId, row_id: &str, out: &mut HashSet<(ViewId, String)>);
}

/// Breadth-first walk over a [`RowLinkTracker`], following links in both
/// directions.
///
/// Only already-materialized rows appear in the tracker, so the walk is
/// bounded by what has actually been loaded.
pub struct LinkWalk<'a> {
    links: &'a RowLinkTracker,
}

impl<'a> LinkWalk<'a> {
    /// Walk over `links`.
    #[must_use]
    pub fn new(links: &'a RowLinkTracker) -> Self {
        Self { links }
    }
}

impl ClosureWalk for LinkWalk<'_> {
    fn find_closure(&self, view: ViewId, row_id: &str, out: &mut HashSet<(ViewId, String)>) {
        let mut queue: VecDeque<(ViewId, String)> = VecDeque::new();
        let root = (view, row_id.to_string());
        if out.insert(root.clone()) {
            queue.push_back(root);
        }
        while let Some((view, row_id)) = queue.pop_front() {
            let neighbors = self
                .links
                .children_of(view, &row_id)
                .iter()
                .chain(self.links.parents_of(view, &row_id));
            for neighbor in neighbors {
                if out.insert(neighbor.clone()) {
                    queue.push_back(neighbor.clone());
                }
            }
        }
    }
}

/// The current selection closure and its derived indices.
#[derive(Debug, Default)]
pub struct ClosureTracker {
    closure: HashSet<(ViewId, String)>,
    row_ids: HashMap<ViewId, HashSet<String>>,
    root: Option<(ViewId, String)>,
}

impl ClosureTracker {
    /// An empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `(view, row_id)` the selection root and recompute membership.
    ///
    /// Without `append`, the prior closure is cleared first; with it, the new
    /// walk's output joins the existing members. The per-view index is
    /// always rebuilt from scratch.
    pub fn set_selection(
        &mut self,
        walk: &dyn ClosureWalk,
        view: ViewId,
        row_id: &str,
        append: bool,
    ) {
        if !append {
            self.closure.clear();
        }
        self.root = Some((view, row_id.to_string()));
        walk.find_closure(view, row_id, &mut self.closure);
        self.rebuild_row_ids();
        tracing::debug!(
            members = self.closure.len(),
            views = self.row_ids.len(),
            "closure recomputed"
        );
    }

    /// Clear all state.
    pub fn reset(&mut self) {
        self.closure.clear();
        self.row_ids.clear();
        self.root = None;
    }

    /// The root of the current walk, if any.
    #[must_use]
    pub fn root(&self) -> Option<(ViewId, &str)> {
        self.root.as_ref().map(|(view, id)| (*view, id.as_str()))
    }

    /// Whether `(view, row_id)` is in the closure.
    #[must_use]
    pub fn contains(&self, view: ViewId, row_id: &str) -> bool {
        self.row_ids
            .get(&view)
            .is_some_and(|ids| ids.contains(row_id))
    }

    /// The rowIds of closure members in `view`.
    #[must_use]
    pub fn row_ids(&self, view: ViewId) -> Option<&HashSet<String>> {
        self.row_ids.get(&view)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.closure.len()
    }

    /// Whether the closure is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.closure.is_empty()
    }

    fn rebuild_row_ids(&mut self) {
        self.row_ids.clear();
        for (view, row_id) in &self.closure {
            if !row_id.is_empty() {
                self.row_ids
                    .entry(*view)
                    .or_default()
                    .insert(row_id.clone());
            }
        }
    }
}
