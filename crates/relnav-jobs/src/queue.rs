//! The session run queue.
//!
//! All database access for one session funnels through one dedicated worker
//! thread draining a prioritized queue: lower numeric priority runs sooner,
//! FIFO within a level. No two statements for the same session ever run
//! concurrently, which is what lets the rest of the workspace treat the
//! session as a serial resource.
//!
//! The worker owns a current-thread asupersync runtime and blocks on one
//! task future at a time. Tasks bring their own `Cx`; job-level cancellation
//! travels through the jobs' tokens, so a queued task can be cancelled
//! before and while it runs.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use asupersync::runtime::RuntimeBuilder;

/// Priority of interactive reloads triggered by the user.
pub const PRIORITY_RELOAD: i32 = 50;
/// Priority of background counting probes for menu badges.
pub const PRIORITY_COUNT: i32 = 70;

/// The boxed future one task runs on the worker.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct Entry {
    priority: i32,
    seq: u64,
    task: TaskFuture,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the maximum: invert so the lowest (priority, seq)
        // pair runs first.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    signal: Condvar,
}

/// A single-worker prioritized task queue bound to one session.
///
/// Dropping the queue drains nothing: pending tasks are discarded, the
/// in-flight task finishes, and the worker joins.
pub struct RunQueue {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl RunQueue {
    /// Start the worker thread. `name` labels it for diagnostics.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            signal: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name(format!("relnav-queue-{name}"))
            .spawn(move || worker_loop(&worker_shared))
            .ok();
        if worker.is_none() {
            tracing::error!(name, "failed to spawn run queue worker");
        }
        Self { shared, worker }
    }

    /// Enqueue `task` at `priority`. Lower runs sooner; equal priorities run
    /// in submission order.
    pub fn add<F>(&self, priority: i32, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.shared.state.lock().expect("queue lock poisoned");
        if state.shutdown {
            tracing::warn!(priority, "task submitted after shutdown, dropped");
            return;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Entry {
            priority,
            seq,
            task: Box::pin(task),
        });
        drop(state);
        self.shared.signal.notify_one();
    }

    /// Number of tasks waiting (excluding the one in flight).
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared
            .state
            .lock()
            .expect("queue lock poisoned")
            .heap
            .len()
    }
}

impl Drop for RunQueue {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().expect("queue lock poisoned");
            state.shutdown = true;
            state.heap.clear();
        }
        self.shared.signal.notify_one();
        if let Some(worker) = self.worker.take() {
            worker.join().ok();
        }
    }
}

fn worker_loop(shared: &Shared) {
    let rt = match RuntimeBuilder::current_thread().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = ?e, "run queue worker failed to build runtime");
            return;
        }
    };

    loop {
        let entry = {
            let mut state = shared.state.lock().expect("queue lock poisoned");
            loop {
                if let Some(entry) = state.heap.pop() {
                    break entry;
                }
                if state.shutdown {
                    return;
                }
                state = shared.signal.wait(state).expect("queue lock poisoned");
            }
        };
        tracing::debug!(priority = entry.priority, seq = entry.seq, "task starting");
        rt.block_on(entry.task);
    }
}
