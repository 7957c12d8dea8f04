//! The session facade a database driver implements.
//!
//! The loader and job layers never touch a connection directly. They see a
//! [`Session`]: execute one statement, stream its rows, report liveness,
//! reconnect. All statements for one session are serialized by the run queue,
//! so implementations may assume no concurrent calls.

use std::future::Future;

use asupersync::{Cx, Outcome};

use crate::dialect::Dialect;
use crate::error::Error;
use crate::row::SqlRow;

/// Receiver for streamed result rows.
///
/// Returning `false` tells the driver to stop fetching. Drivers must honor
/// this promptly so a bounded read of a huge result set stays bounded.
pub trait RowSink: Send {
    /// Deliver one row. Returns whether the caller wants more.
    fn push(&mut self, row: SqlRow) -> bool;
}

/// A database session: statement execution plus liveness management.
///
/// Mirrors what the browser needs from a backend and nothing more. The
/// `limit_hint` is advisory; drivers that can bound the fetch server-side
/// should, but the caller never relies on it.
pub trait Session: Send + Sync {
    /// The backend's capability descriptor.
    fn dialect(&self) -> &Dialect;

    /// Execute `sql`, streaming result rows into `sink`.
    ///
    /// Returns the number of rows delivered. Cancellation via `cx` unwinds
    /// with `Outcome::Cancelled`; statement failures carry the statement text
    /// in the error.
    fn execute_query(
        &self,
        cx: &Cx,
        sql: &str,
        sink: &mut dyn RowSink,
        limit_hint: Option<usize>,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Probe connection liveness.
    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Re-establish a dead connection.
    fn reconnect(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}

/// A sink that collects every delivered row, up to an optional cap.
///
/// Mostly useful in tests and for the count probe's fallback path.
#[derive(Debug, Default)]
pub struct CollectSink {
    rows: Vec<SqlRow>,
    cap: Option<usize>,
}

impl CollectSink {
    /// Collect without bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect at most `cap` rows, then signal the driver to stop.
    #[must_use]
    pub fn with_cap(cap: usize) -> Self {
        Self {
            rows: Vec::new(),
            cap: Some(cap),
        }
    }

    /// The collected rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<SqlRow> {
        self.rows
    }

    /// Number of rows collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RowSink for CollectSink {
    fn push(&mut self, row: SqlRow) -> bool {
        self.rows.push(row);
        match self.cap {
            Some(cap) => self.rows.len() < cap,
            None => true,
        }
    }
}
