//! Block-wise row loading for relnav.
//!
//! This crate turns "fetch the children of these parent rows, at most L of
//! them" into dialect-tolerant SQL and a clean result:
//!
//! - parents are processed in bounded **blocks**, closure members first;
//! - each block statement restricts to its parents by the best strategy the
//!   backend supports (nothing, a rowId disjunction, or an inline view);
//! - the row limit is enforced by the best of four **cap strategies**, probed
//!   in order with silent fallback;
//! - result rows are identified by a NULL-safe primary-key predicate, linked
//!   to their parents, and deduplicated.
//!
//! The loader is synchronous in spirit: one [`BlockLoader::run`] call is one
//! pass, driven by the caller's `Cx` and [`CancellationToken`]. Scheduling,
//! retry, and result application live in `relnav-jobs`.
//!
//! [`CancellationToken`]: relnav_core::CancellationToken

use serde::{Deserialize, Serialize};

pub mod blocks;
pub mod count;
pub mod loader;
pub mod row;
pub mod rowid;
pub mod strategy;

pub use count::count_rows;
pub use loader::{BlockLoader, LoadSpec};
pub use row::{LoadResult, Row, RowCount, RowLink};
pub use strategy::{CapStrategy, RestrictionStrategy};

/// Tunables of the loading pipeline, as read from a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Default row limit per view.
    pub row_limit: usize,
    /// Descending block-size sequence tried when statements fail for
    /// dialect reasons.
    pub block_sizes: Vec<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            row_limit: 500,
            block_sizes: blocks::BLOCK_SIZES.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.row_limit, 500);
        assert_eq!(config.block_sizes, vec![300, 100, 40]);
    }

    #[test]
    fn test_config_deserializes_partial() {
        let config: LoaderConfig = serde_json::from_str("{\"row_limit\": 50}").unwrap();
        assert_eq!(config.row_limit, 50);
        assert_eq!(config.block_sizes, vec![300, 100, 40]);
    }
}
