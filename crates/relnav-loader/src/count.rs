//! The bounded counting probe.
//!
//! Counting answers "how many children would this association load" for menu
//! badges, without paying for a full load. It shares the loader's statement
//! core, so the restriction semantics are identical. When the backend rejects
//! the count statement, the probe degrades to a bounded client-side read and
//! reports an inexact count.

use asupersync::{Cx, Outcome};
use relnav_core::{CancellationToken, CollectSink, Error, Session};

use crate::blocks::partition;
use crate::loader::{BlockLoader, LoadSpec};
use crate::row::{Row, RowCount};
use crate::strategy;

/// Count the rows a load of `spec` would see, probing at most
/// `spec.limit + 1` rows on the fallback path.
pub async fn count_rows<S: Session>(
    session: &S,
    cx: &Cx,
    spec: LoadSpec<'_>,
    token: CancellationToken,
) -> Outcome<RowCount, Error> {
    match count_exact(session, cx, spec, &token).await {
        Outcome::Ok(count) => Outcome::Ok(RowCount {
            count,
            is_exact: true,
        }),
        Outcome::Err(e) if strategy::is_fallback_trigger(&e) => {
            tracing::debug!(error = %e, "count statement rejected, probing rows instead");
            count_by_reading(session, cx, spec, token).await
        }
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}

async fn count_exact<S: Session>(
    session: &S,
    cx: &Cx,
    spec: LoadSpec<'_>,
    token: &CancellationToken,
) -> Outcome<usize, Error> {
    let dialect = session.dialect();
    let join = spec.association.map(|a| a.join_condition());
    // Counting never truncates, so one pass at the largest block size.
    let no_closure = |_: &Row| false;
    let blocks = partition(spec.parents, &no_closure, crate::blocks::BLOCK_SIZES[0]);

    let mut total = 0usize;
    for block in &blocks {
        if token.is_cancelled() {
            return Outcome::Err(Error::Cancelled);
        }
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        let restriction = strategy::choose_restriction(dialect, spec.source, join.as_deref(), block);
        // The count statement needs no attribution columns, but sharing the
        // core keeps the restriction semantics in one place.
        let core = match strategy::build_core(
            dialect,
            spec.target,
            spec.source,
            join.as_deref(),
            block,
            restriction,
            spec.condition,
        ) {
            Ok(core) => core,
            Err(e) => return Outcome::Err(e),
        };
        let sql = core.render_count(dialect);
        let mut sink = CollectSink::with_cap(1);
        match session.execute_query(cx, &sql, &mut sink, Some(1)).await {
            Outcome::Ok(_) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
        let count = sink
            .into_rows()
            .first()
            .and_then(|row| row.get(0))
            .and_then(relnav_core::Value::as_i64)
            .unwrap_or(0);
        total += usize::try_from(count).unwrap_or(0);
    }
    Outcome::Ok(total)
}

/// Fallback: load up to `limit + 1` rows and count what came back.
async fn count_by_reading<S: Session>(
    session: &S,
    cx: &Cx,
    spec: LoadSpec<'_>,
    token: CancellationToken,
) -> Outcome<RowCount, Error> {
    let no_closure = |_: &Row| false;
    let loader = BlockLoader::new(session, spec, &no_closure, token);
    match loader.run(cx).await {
        Outcome::Ok(result) => Outcome::Ok(RowCount {
            count: result.rows.len(),
            is_exact: !result.limit_exceeded,
        }),
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}
