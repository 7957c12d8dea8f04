//! Parent-row partitioning.
//!
//! Parents are processed in blocks so one statement never joins against an
//! unbounded parent set. Parents inside the caller's closure are scheduled
//! before the rest: under a tight row limit, the rows the user actually
//! selected must not be starved by unrelated siblings.

use crate::row::Row;

/// Block sizes tried in order when a statement fails for dialect reasons
/// (join or IN-list size limits).
pub const BLOCK_SIZES: [usize; 3] = [300, 100, 40];

/// One block of parents, each carrying its index in the original batch.
#[derive(Debug)]
pub struct Block<'a> {
    /// `(parent_model_index, parent)` pairs; empty for the synthetic
    /// "no parents" placeholder block.
    pub parents: Vec<(usize, &'a Row)>,
}

impl Block<'_> {
    /// Whether this is the synthetic placeholder for an unrestricted load.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Partition `parents` into blocks of at most `block_size`, closure members
/// first.
///
/// An empty parent batch yields the single placeholder block. Relative order
/// is preserved within the closure group and within the rest.
pub fn partition<'a>(
    parents: &'a [Row],
    in_closure: &dyn Fn(&Row) -> bool,
    block_size: usize,
) -> Vec<Block<'a>> {
    if parents.is_empty() {
        return vec![Block { parents: Vec::new() }];
    }

    let mut ordered: Vec<(usize, &Row)> = Vec::with_capacity(parents.len());
    for (i, row) in parents.iter().enumerate() {
        if in_closure(row) {
            ordered.push((i, row));
        }
    }
    for (i, row) in parents.iter().enumerate() {
        if !in_closure(row) {
            ordered.push((i, row));
        }
    }

    ordered
        .chunks(block_size.max(1))
        .map(|chunk| Block {
            parents: chunk.to_vec(),
        })
        .collect()
}
