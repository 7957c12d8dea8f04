//! Cross-view selection closure for relnav.
//!
//! When the user selects a row, every row reachable from it over
//! already-loaded parent/child links lights up, across all open views. This
//! crate owns the two pieces of state behind that:
//!
//! - [`RowLinkTracker`]: the bipartite graph of observed `(parent, child)`
//!   pairs, keyed by view and rowId string;
//! - [`ClosureTracker`]: the current closure and its per-view rowId index,
//!   recomputed wholesale on every selection or reload.
//!
//! The closure layer is pure bookkeeping over view ids and rowId strings; it
//! deliberately holds no references into row lists, which reloads replace.

pub mod links;
pub mod tracker;

pub use links::{RowLinkTracker, ViewId};
pub use tracker::{ClosureTracker, ClosureWalk, LinkWalk};
