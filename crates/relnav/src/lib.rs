//! relnav: follow foreign keys through a live database.
//!
//! relnav is the engine of an interactive relational-database browser: one
//! view per table, each showing a bounded page of rows; navigating an
//! association loads the children of the rows you already see; selecting a
//! row highlights everything reachable from it in every other open view.
//!
//! This facade re-exports the workspace:
//!
//! - [`relnav_core`]: the `Session` trait, `Dialect` capabilities, the data
//!   model, values and errors;
//! - [`relnav_loader`]: block-wise loading with dialect-tolerant SQL
//!   strategies, row identification, the bounded count probe;
//! - [`relnav_closure`]: the parent/child link graph and the selection
//!   closure;
//! - [`relnav_jobs`]: the session run queue, cancellable load jobs, view
//!   registries and observer callbacks.
//!
//! The `relnav-mem` crate provides an in-memory `Session` for tests and
//! experimentation.
//!
//! # Example
//!
//! ```ignore
//! use relnav::prelude::*;
//!
//! let queue = RunQueue::new("demo");
//! let registry = Arc::new(ViewRegistry::new());
//! let customers = registry.open_view();
//!
//! let job = LoadJob::new(session, LoadRequest { /* … */ });
//! registry.begin_job(customers, job.clone());
//! let cx = Cx::for_testing();
//! queue.add(PRIORITY_RELOAD, async move {
//!     let completion = job.run(&cx).await;
//!     registry.apply(customers, completion, observer.as_ref());
//! });
//! ```

pub use relnav_closure::{ClosureTracker, ClosureWalk, LinkWalk, RowLinkTracker, ViewId};
pub use relnav_core::{
    Association, AssociationDef, AssociationId, CancellationToken, Cardinality, CollectSink,
    Column, ConnectionError, ConnectionErrorKind, Cx, DataModel, Dialect, Error, InlineViewStyle,
    Outcome, Result, RowSink, Session, SqlError, SqlRow, Table, Value,
};
pub use relnav_jobs::{
    JobCompletion, JobControl, JobState, LoadJob, LoadObserver, LoadRequest, PRIORITY_COUNT,
    PRIORITY_RELOAD, RunQueue, ViewRegistry, apply_links,
};
pub use relnav_loader::{
    BlockLoader, CapStrategy, LoadResult, LoadSpec, LoaderConfig, RestrictionStrategy, Row,
    RowCount, RowLink, count_rows,
};

/// The commonly needed imports, in one place.
pub mod prelude {
    pub use relnav_closure::{ClosureTracker, LinkWalk, RowLinkTracker, ViewId};
    pub use relnav_core::{
        Association, AssociationDef, CancellationToken, Cardinality, Column, Cx, DataModel,
        Dialect, Error, Outcome, Session, Table, Value,
    };
    pub use relnav_jobs::{
        JobCompletion, JobControl, JobState, LoadJob, LoadObserver, LoadRequest, PRIORITY_COUNT,
        PRIORITY_RELOAD, RunQueue, ViewRegistry, apply_links,
    };
    pub use relnav_loader::{BlockLoader, LoadResult, LoadSpec, Row, RowCount};
}
