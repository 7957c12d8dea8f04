use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use asupersync::Cx;

use relnav::prelude::*;
use relnav_mem::{MemSession, MemTable};

#[derive(Default)]
struct CountingObserver {
    loaded: AtomicUsize,
    failed: AtomicUsize,
}

impl LoadObserver for CountingObserver {
    fn on_rows_loaded(&self, _view: ViewId, _result: &LoadResult) {
        self.loaded.fetch_add(1, Ordering::SeqCst);
    }
    fn on_error(&self, _view: ViewId, _error: &Error) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

fn events_table() -> Table {
    Table::new(
        "EVENTS",
        vec![Column::new("id", "integer"), Column::new("kind", "varchar")],
        &["id"],
    )
}

fn events_session() -> MemSession {
    let mut session = MemSession::new(Dialect::standard("mem"));
    session.add_table(MemTable::generated(
        "EVENTS",
        &["id", "kind"],
        100_000,
        |i| vec![Value::Int(i as i64), Value::Text("audit".to_string())],
    ));
    session
}

fn request(limit: usize) -> LoadRequest {
    LoadRequest {
        target: events_table(),
        association: None,
        source: None,
        parents: Vec::new(),
        condition: None,
        limit,
        select_distinct: false,
        closure_row_ids: std::collections::HashSet::new(),
    }
}

/// Enqueue one job and return it with a completion receiver.
fn submit(
    queue: &RunQueue,
    registry: &Arc<ViewRegistry>,
    observer: &Arc<CountingObserver>,
    session: &Arc<MemSession>,
    view: ViewId,
    request: LoadRequest,
) -> (Arc<LoadJob<MemSession>>, mpsc::Receiver<()>) {
    let job = LoadJob::new(Arc::clone(session), request);
    registry.begin_job(view, job.clone());

    let (tx, rx) = mpsc::channel();
    let cx = Cx::for_testing();
    let task_job = job.clone();
    let task_registry = Arc::clone(registry);
    let task_observer = Arc::clone(observer);
    queue.add(PRIORITY_RELOAD, async move {
        let completion = task_job.run(&cx).await;
        task_registry.apply(view, completion, task_observer.as_ref());
        tx.send(()).ok();
    });
    (job, rx)
}

#[test]
fn cancellation_leaves_the_view_untouched() {
    let session = Arc::new(events_session());
    let registry = Arc::new(ViewRegistry::new());
    let observer = Arc::new(CountingObserver::default());
    let queue = RunQueue::new("cancel-test");
    let view = registry.open_view();

    // Seed the view with a small successful load.
    let (_, done) = submit(&queue, &registry, &observer, &session, view, request(5));
    done.recv_timeout(Duration::from_secs(10)).expect("seed load");
    assert_eq!(registry.rows(view).len(), 5);
    assert_eq!(registry.generation(view), 1);

    // A load that would stream 50k rows, slowly.
    session.set_row_delay(Duration::from_millis(2));
    let (job, done) = submit(&queue, &registry, &observer, &session, view, request(50_000));
    std::thread::sleep(Duration::from_millis(150));
    job.cancel();
    job.cancel(); // idempotent
    done.recv_timeout(Duration::from_secs(10)).expect("cancelled load");

    // All or nothing: the seeded rows are still there, no callbacks fired.
    assert_eq!(job.state(), JobState::Cancelled);
    assert_eq!(registry.rows(view).len(), 5);
    assert_eq!(registry.generation(view), 1);
    assert_eq!(observer.loaded.load(Ordering::SeqCst), 1);
    assert_eq!(observer.failed.load(Ordering::SeqCst), 0);

    // The session is still perfectly usable.
    session.set_row_delay(Duration::ZERO);
    let (job, done) = submit(&queue, &registry, &observer, &session, view, request(7));
    done.recv_timeout(Duration::from_secs(10)).expect("reload");
    assert_eq!(job.state(), JobState::Succeeded);
    assert_eq!(registry.rows(view).len(), 7);
    assert_eq!(registry.generation(view), 2);
    assert_eq!(observer.loaded.load(Ordering::SeqCst), 2);
}

#[test]
fn starting_a_new_job_cancels_the_old_one() {
    let session = Arc::new(events_session());
    let registry = Arc::new(ViewRegistry::new());
    let observer = Arc::new(CountingObserver::default());
    let queue = RunQueue::new("supersede-test");
    let view = registry.open_view();

    session.set_row_delay(Duration::from_millis(2));
    let (first, first_done) =
        submit(&queue, &registry, &observer, &session, view, request(50_000));
    std::thread::sleep(Duration::from_millis(100));

    // Registering the successor cancels the predecessor; no explicit
    // cancel() call anywhere.
    session.set_row_delay(Duration::ZERO);
    let (second, second_done) =
        submit(&queue, &registry, &observer, &session, view, request(3));

    first_done
        .recv_timeout(Duration::from_secs(10))
        .expect("first load");
    second_done
        .recv_timeout(Duration::from_secs(10))
        .expect("second load");

    assert_eq!(first.state(), JobState::Cancelled);
    assert_eq!(second.state(), JobState::Succeeded);
    assert_eq!(registry.rows(view).len(), 3);
    assert_eq!(registry.generation(view), 1);
    assert_eq!(observer.loaded.load(Ordering::SeqCst), 1);
}

#[test]
fn cancelling_a_pending_job_skips_execution() {
    let session = Arc::new(events_session());
    let registry = Arc::new(ViewRegistry::new());
    let observer = Arc::new(CountingObserver::default());
    let queue = RunQueue::new("pending-test");
    let view = registry.open_view();

    // Park the worker so the job stays queued.
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    queue.add(0, async move {
        gate_rx.recv().ok();
    });

    let statements_before = session.statements().len();
    let (job, done) = submit(&queue, &registry, &observer, &session, view, request(5));
    job.cancel();
    gate_tx.send(()).ok();
    done.recv_timeout(Duration::from_secs(10)).expect("queued job");

    assert_eq!(job.state(), JobState::Cancelled);
    assert_eq!(session.statements().len(), statements_before);
    assert_eq!(observer.loaded.load(Ordering::SeqCst), 0);
}
