//! The block loader.
//!
//! One [`BlockLoader::run`] call is one loader pass: partition the parents,
//! execute one statement per block through the cap cascade, identify and
//! deduplicate the result rows, and stop at the row limit. A pass either
//! produces a complete [`LoadResult`] or nothing; partial state never leaks.
//!
//! Statement failures inside the cap cascade fall through to the next cap
//! strategy. If a whole pass fails for dialect reasons (typically an
//! oversized disjunction or inline view), the pass is retried with the next
//! smaller block size before the error is surfaced.

use std::collections::{HashMap, HashSet};

use asupersync::{Cx, Outcome};
use relnav_core::{
    Association, CancellationToken, Dialect, Error, RowSink, Session, SqlRow, Table, Value,
};

use crate::blocks::{BLOCK_SIZES, Block, partition};
use crate::row::{LoadResult, Row, RowLink};
use crate::rowid;
use crate::strategy::{self, CoreStatement};

/// What to load.
#[derive(Clone, Copy)]
pub struct LoadSpec<'a> {
    /// The table whose rows are loaded.
    pub target: &'a Table,
    /// The association to follow, if loading children of `parents`.
    pub association: Option<&'a Association>,
    /// The association's source table; present iff `association` is.
    pub source: Option<&'a Table>,
    /// Already-loaded parent rows, in view order.
    pub parents: &'a [Row],
    /// Free-form restriction over alias `A`.
    pub condition: Option<&'a str>,
    /// Maximum number of rows to retain.
    pub limit: usize,
    /// Whether to deduplicate globally instead of per block.
    pub select_distinct: bool,
}

/// Executes one load against a session.
pub struct BlockLoader<'a, S: Session> {
    session: &'a S,
    spec: LoadSpec<'a>,
    in_closure: &'a (dyn Fn(&Row) -> bool + Sync),
    token: CancellationToken,
    block_sizes: &'a [usize],
}

impl<'a, S: Session> BlockLoader<'a, S> {
    /// Create a loader.
    ///
    /// `in_closure` marks parents belonging to the caller's current closure;
    /// their blocks are scheduled first and their truncation is flagged
    /// separately.
    pub fn new(
        session: &'a S,
        spec: LoadSpec<'a>,
        in_closure: &'a (dyn Fn(&Row) -> bool + Sync),
        token: CancellationToken,
    ) -> Self {
        Self {
            session,
            spec,
            in_closure,
            token,
            block_sizes: &BLOCK_SIZES,
        }
    }

    /// Override the descending block-size sequence.
    #[must_use]
    pub fn with_block_sizes(mut self, sizes: &'a [usize]) -> Self {
        self.block_sizes = sizes;
        self
    }

    /// Run the load to completion.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.spec.target.name))]
    pub async fn run(&self, cx: &Cx) -> Outcome<LoadResult, Error> {
        let mut sizes = self.block_sizes.iter().peekable();
        while let Some(&block_size) = sizes.next() {
            match self.run_pass(cx, block_size).await {
                Outcome::Err(e) if sizes.peek().is_some() && strategy::is_fallback_trigger(&e) => {
                    tracing::debug!(
                        block_size,
                        error = %e,
                        "pass failed for dialect reasons, retrying with smaller blocks"
                    );
                }
                other => return other,
            }
        }
        Outcome::Err(Error::Custom("empty block size sequence".to_string()))
    }

    async fn run_pass(&self, cx: &Cx, block_size: usize) -> Outcome<LoadResult, Error> {
        let dialect = self.session.dialect();
        let join = self.spec.association.map(Association::join_condition);
        let blocks = partition(self.spec.parents, self.in_closure, block_size);
        let mut state = PassState::new(self.spec.limit, self.spec.select_distinct);

        let mut stopped_at = blocks.len();
        for (index, block) in blocks.iter().enumerate() {
            if state.budget_spent() {
                stopped_at = index;
                break;
            }
            if self.token.is_cancelled() {
                return Outcome::Err(Error::Cancelled);
            }
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }

            let restriction =
                strategy::choose_restriction(dialect, self.spec.source, join.as_deref(), block);
            let core = match strategy::build_core(
                dialect,
                self.spec.target,
                self.spec.source,
                join.as_deref(),
                block,
                restriction,
                self.spec.condition,
            ) {
                Ok(core) => core,
                Err(e) => return Outcome::Err(e),
            };

            match self.execute_block(cx, &core, block, &mut state).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        Outcome::Ok(state.finish(&blocks[stopped_at..], self.spec.parents, self.in_closure))
    }

    /// Execute one block through the cap cascade and absorb its rows.
    async fn execute_block(
        &self,
        cx: &Cx,
        core: &CoreStatement,
        block: &Block<'_>,
        state: &mut PassState,
    ) -> Outcome<(), Error> {
        let dialect = self.session.dialect();
        let fetch = state.remaining_fetch();
        let mut last_err = Error::Custom("empty cap plan".to_string());

        for cap in strategy::cap_plan(dialect) {
            let sql = core.render(cap, fetch, dialect);
            let mut sink = StagingSink::new(fetch, self.token.clone());
            match self
                .session
                .execute_query(cx, &sql, &mut sink, Some(fetch))
                .await
            {
                Outcome::Ok(_) => {
                    if sink.cancelled || self.token.is_cancelled() {
                        return Outcome::Err(Error::Cancelled);
                    }
                    state.absorb_block(sink.rows, block, core, dialect, self.spec.target);
                    return Outcome::Ok(());
                }
                Outcome::Err(e) if strategy::is_fallback_trigger(&e) => {
                    tracing::debug!(?cap, error = %e, "cap strategy rejected by backend");
                    last_err = e;
                }
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        Outcome::Err(last_err)
    }
}

/// Collects raw rows of one statement attempt, bounded by the fetch budget.
/// Discarded wholesale when the attempt falls through to the next strategy.
struct StagingSink {
    rows: Vec<SqlRow>,
    cap: usize,
    token: CancellationToken,
    cancelled: bool,
}

impl StagingSink {
    fn new(cap: usize, token: CancellationToken) -> Self {
        Self {
            rows: Vec::new(),
            cap,
            token,
            cancelled: false,
        }
    }
}

impl RowSink for StagingSink {
    fn push(&mut self, row: SqlRow) -> bool {
        if self.token.is_cancelled() {
            self.cancelled = true;
            return false;
        }
        self.rows.push(row);
        self.rows.len() < self.cap
    }
}

/// Accumulated state of one pass.
struct PassState {
    limit: usize,
    select_distinct: bool,
    rows: Vec<Row>,
    links: Vec<RowLink>,
    link_seen: HashSet<(usize, String)>,
    /// rowIds already retained, across all blocks (distinct mode only).
    distinct_seen: HashSet<String>,
    distinct_suppressed: usize,
    total_read: usize,
    synthetic_seq: usize,
}

impl PassState {
    fn new(limit: usize, select_distinct: bool) -> Self {
        Self {
            limit,
            select_distinct,
            rows: Vec::new(),
            links: Vec::new(),
            link_seen: HashSet::new(),
            distinct_seen: HashSet::new(),
            distinct_suppressed: 0,
            total_read: 0,
            synthetic_seq: 0,
        }
    }

    /// Whether the limit+1 budget is consumed.
    fn budget_spent(&self) -> bool {
        self.rows.len() > self.limit
    }

    /// Rows still worth fetching, including the one probe row.
    fn remaining_fetch(&self) -> usize {
        self.limit + 1 - self.rows.len()
    }

    /// Identify, link, and deduplicate one block's staged rows.
    fn absorb_block(
        &mut self,
        staged: Vec<SqlRow>,
        block: &Block<'_>,
        core: &CoreStatement,
        dialect: &Dialect,
        target: &Table,
    ) {
        let width = core.target_width();
        let attribution = attribution_map(block, dialect);
        // rowId -> parent of the first retained occurrence, within this block.
        let mut block_seen: HashMap<String, Option<usize>> = HashMap::new();

        for sql_row in staged {
            if self.budget_spent() {
                break;
            }
            self.total_read += 1;

            let mut values = sql_row.into_values();
            let trailing: Vec<Value> = values.split_off(width.min(values.len()));

            let parent_index = if block.is_placeholder() {
                None
            } else if block.parents.len() == 1 {
                Some(block.parents[0].0)
            } else {
                attribution
                    .get(&tuple_fingerprint(&trailing, dialect))
                    .copied()
            };

            let key = key_tuple_positional(target, &values);
            let row_id = match &key {
                Some(key) => rowid::render_predicate(dialect, key, None),
                None => {
                    let id = rowid::synthetic_row_id(self.synthetic_seq);
                    self.synthetic_seq += 1;
                    id
                }
            };

            // Record the link for every observed pair, deduplicated or not.
            if let Some(parent) = parent_index {
                if self.link_seen.insert((parent, row_id.clone())) {
                    self.links.push(RowLink {
                        parent_index: parent,
                        child_row_id: row_id.clone(),
                    });
                }
            }

            let suppress = if self.select_distinct {
                !self.distinct_seen.insert(row_id.clone())
            } else {
                // The same row recurring for a different parent in this block
                // is suppressed; a repeat under the same parent is kept as
                // delivered.
                match block_seen.entry(row_id.clone()) {
                    std::collections::hash_map::Entry::Occupied(first) => {
                        *first.get() != parent_index
                    }
                    std::collections::hash_map::Entry::Vacant(slot) => {
                        slot.insert(parent_index);
                        false
                    }
                }
            };
            if suppress {
                self.distinct_suppressed += 1;
                continue;
            }

            self.rows.push(Row {
                row_id,
                primary_key: key.unwrap_or_default(),
                values,
                parent_model_index: parent_index,
            });
        }
    }

    /// Truncate to the limit and derive the flags.
    fn finish(
        mut self,
        unprocessed: &[Block<'_>],
        parents: &[Row],
        in_closure: &dyn Fn(&Row) -> bool,
    ) -> LoadResult {
        let mut limit_exceeded = false;
        let mut closure_limit_exceeded = false;

        if self.rows.len() > self.limit {
            limit_exceeded = true;
            // The probe row: only ever one past the limit.
            if let Some(extra) = self.rows.pop() {
                if let Some(parent) = extra.parent_model_index {
                    if in_closure(&parents[parent]) {
                        closure_limit_exceeded = true;
                    }
                }
            }
        }
        for block in unprocessed {
            if block.parents.iter().any(|(_, p)| in_closure(p)) {
                limit_exceeded = true;
                closure_limit_exceeded = true;
            }
        }

        LoadResult {
            rows: self.rows,
            limit_exceeded,
            closure_limit_exceeded,
            distinct_suppressed: self.distinct_suppressed,
            total_read: self.total_read,
            links: self.links,
        }
    }
}

/// Key tuple of a value tuple that is column-aligned with `table`.
fn key_tuple_positional(table: &Table, values: &[Value]) -> Option<Vec<(String, Value)>> {
    if !table.has_primary_key() {
        return None;
    }
    let mut tuple = Vec::with_capacity(table.primary_key.len());
    for &index in &table.primary_key {
        let value = values.get(index)?;
        tuple.push((table.columns[index].name.clone(), value.clone()));
    }
    Some(tuple)
}

/// Map from a parent's rendered key tuple to its index in the parent batch.
fn attribution_map(block: &Block<'_>, dialect: &Dialect) -> HashMap<String, usize> {
    let mut map = HashMap::with_capacity(block.parents.len());
    for (index, parent) in &block.parents {
        let values: Vec<Value> = parent.primary_key.iter().map(|(_, v)| v.clone()).collect();
        map.insert(tuple_fingerprint(&values, dialect), *index);
    }
    map
}

/// Deterministic fingerprint of a value tuple, for attribution lookups.
fn tuple_fingerprint(values: &[Value], dialect: &Dialect) -> String {
    values
        .iter()
        .map(|v| dialect.literal(v))
        .collect::<Vec<_>>()
        .join("\u{1f}")
}
