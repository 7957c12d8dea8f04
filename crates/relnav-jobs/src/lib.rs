//! Job scheduling and result application for relnav.
//!
//! The concurrency model, in one paragraph: every session has one dedicated
//! worker thread draining a prioritized [`RunQueue`]; a view reload is a
//! [`LoadJob`] on that queue; at most one job per view is in flight, because
//! starting a new one cancels the old one through the [`ViewRegistry`];
//! a finished job's result is applied by one atomic row-list swap and one
//! [`LoadObserver`] callback; a cancelled job applies nothing and notifies
//! nobody.

pub mod job;
pub mod queue;
pub mod view;

pub use job::{JobCompletion, JobState, LoadJob, LoadRequest};
pub use queue::{PRIORITY_COUNT, PRIORITY_RELOAD, RunQueue, TaskFuture};
pub use view::{JobControl, LoadObserver, ViewRegistry, apply_links};
