//! View state and result application.
//!
//! Each open view owns a shared row list that background work never touches.
//! A finished job's [`JobCompletion`] is applied here, on the coordinating
//! thread: one atomic swap of the row list, one callback. A view has at most
//! one job in flight; starting the next one cancels its predecessor first,
//! which is what makes result application submission-ordered without any
//! further machinery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use relnav_closure::{RowLinkTracker, ViewId};
use relnav_core::{Error, Session};
use relnav_loader::{LoadResult, Row};

use crate::job::{JobCompletion, LoadJob};

/// Callbacks into the presentation layer.
///
/// Fired from the session worker after result application; the embedder is
/// responsible for marshalling onto its UI thread. Cancelled jobs fire
/// nothing.
pub trait LoadObserver: Send + Sync {
    /// A reload finished; the view's row list has already been swapped.
    fn on_rows_loaded(&self, view: ViewId, result: &LoadResult);

    /// A reload failed after the retry policy was exhausted.
    fn on_error(&self, view: ViewId, error: &Error);

    /// Free-form progress text, e.g. "loading block 3/7".
    fn on_progress(&self, view: ViewId, status: &str) {
        let _ = (view, status);
    }
}

/// The slice of a job the registry needs: the ability to cancel it.
pub trait JobControl: Send + Sync {
    /// Request cancellation.
    fn cancel(&self);
}

impl<S: Session> JobControl for LoadJob<S> {
    fn cancel(&self) {
        LoadJob::cancel(self);
    }
}

struct ViewEntry {
    rows: Arc<Vec<Row>>,
    job: Option<Arc<dyn JobControl>>,
    generation: u64,
}

impl ViewEntry {
    fn new() -> Self {
        Self {
            rows: Arc::new(Vec::new()),
            job: None,
            generation: 0,
        }
    }
}

/// All open views of one browser session.
#[derive(Default)]
pub struct ViewRegistry {
    views: Mutex<HashMap<ViewId, ViewEntry>>,
    next_view: AtomicU64,
}

impl ViewRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a view with an empty row list.
    pub fn open_view(&self) -> ViewId {
        let id = ViewId::new(self.next_view.fetch_add(1, Ordering::Relaxed));
        self.views
            .lock()
            .expect("view registry lock poisoned")
            .insert(id, ViewEntry::new());
        id
    }

    /// Close a view, cancelling its in-flight job if any.
    pub fn close_view(&self, view: ViewId) {
        let entry = self
            .views
            .lock()
            .expect("view registry lock poisoned")
            .remove(&view);
        if let Some(entry) = entry {
            if let Some(job) = entry.job {
                job.cancel();
            }
        }
    }

    /// The view's current row list. Cheap to clone; replaced wholesale by
    /// result application.
    #[must_use]
    pub fn rows(&self, view: ViewId) -> Arc<Vec<Row>> {
        self.views
            .lock()
            .expect("view registry lock poisoned")
            .get(&view)
            .map_or_else(|| Arc::new(Vec::new()), |entry| Arc::clone(&entry.rows))
    }

    /// How many times the view's row list has been replaced.
    #[must_use]
    pub fn generation(&self, view: ViewId) -> u64 {
        self.views
            .lock()
            .expect("view registry lock poisoned")
            .get(&view)
            .map_or(0, |entry| entry.generation)
    }

    /// Register `job` as the view's in-flight job, cancelling the previous
    /// one first. At most one job per view is ever outstanding.
    pub fn begin_job(&self, view: ViewId, job: Arc<dyn JobControl>) {
        let previous = {
            let mut views = self.views.lock().expect("view registry lock poisoned");
            let entry = views.entry(view).or_insert_with(ViewEntry::new);
            entry.job.replace(job)
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Apply a completed job to its view: swap the row list atomically and
    /// fire the matching callback. Cancelled completions clear the job slot
    /// and nothing else.
    pub fn apply(&self, view: ViewId, completion: JobCompletion, observer: &dyn LoadObserver) {
        match completion {
            JobCompletion::Succeeded(result) => {
                {
                    let mut views = self.views.lock().expect("view registry lock poisoned");
                    let Some(entry) = views.get_mut(&view) else {
                        return; // view closed while the job ran
                    };
                    entry.rows = Arc::new(result.rows.clone());
                    entry.generation += 1;
                    entry.job = None;
                }
                observer.on_rows_loaded(view, &result);
            }
            JobCompletion::Failed(error) => {
                {
                    let mut views = self.views.lock().expect("view registry lock poisoned");
                    if let Some(entry) = views.get_mut(&view) {
                        entry.job = None;
                    }
                }
                observer.on_error(view, &error);
            }
            JobCompletion::Cancelled => {
                let mut views = self.views.lock().expect("view registry lock poisoned");
                if let Some(entry) = views.get_mut(&view) {
                    entry.job = None;
                }
            }
        }
    }
}

/// Feed one load's observed links into the link graph.
///
/// Links from `parent_view` into `child_view` are replaced wholesale, so a
/// reload cannot leave edges to rows that no longer exist. Each distinct
/// pair is recorded exactly once.
pub fn apply_links(
    tracker: &mut RowLinkTracker,
    parent_view: ViewId,
    child_view: ViewId,
    parents: &[Row],
    result: &LoadResult,
) {
    tracker.clear_pair(parent_view, child_view);
    for link in &result.links {
        if let Some(parent) = parents.get(link.parent_index) {
            tracker.record(parent_view, &parent.row_id, child_view, &link.child_row_id);
        }
    }
}
