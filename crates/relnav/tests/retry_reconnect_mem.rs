use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use asupersync::Cx;
use asupersync::runtime::RuntimeBuilder;

use relnav::prelude::*;
use relnav_mem::{MemSession, MemTable};

#[derive(Default)]
struct CountingObserver {
    loaded: AtomicUsize,
    failed: AtomicUsize,
    progress: AtomicUsize,
}

impl LoadObserver for CountingObserver {
    fn on_rows_loaded(&self, _view: ViewId, _result: &LoadResult) {
        self.loaded.fetch_add(1, Ordering::SeqCst);
    }
    fn on_error(&self, _view: ViewId, _error: &Error) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_progress(&self, _view: ViewId, _status: &str) {
        self.progress.fetch_add(1, Ordering::SeqCst);
    }
}

fn session() -> MemSession {
    // A minimal dialect keeps the statement log readable: one statement per
    // loader pass.
    let mut session = MemSession::new(Dialect::minimal("mem"));
    let mut orders = MemTable::new("ORDERS", &["id"]);
    for id in 0..4 {
        orders.push_row(vec![Value::Int(id)]);
    }
    session.add_table(orders);
    session
}

fn request() -> LoadRequest {
    LoadRequest {
        target: Table::new("ORDERS", vec![Column::new("id", "integer")], &["id"]),
        association: None,
        source: None,
        parents: Vec::new(),
        condition: None,
        limit: 10,
        select_distinct: false,
        closure_row_ids: std::collections::HashSet::new(),
    }
}

#[test]
fn lost_connection_is_restored_and_retried_once() {
    let session = Arc::new(session());
    let registry = Arc::new(ViewRegistry::new());
    let observer = Arc::new(CountingObserver::default());
    let view = registry.open_view();

    // The next statement fails and takes the connection down with it.
    session.fail_next_statements(1);
    session.disconnect_on_failure();

    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    let job = LoadJob::with_observer(
        Arc::clone(&session),
        request(),
        view,
        Arc::clone(&observer) as Arc<dyn LoadObserver>,
    );
    let completion = rt.block_on(job.run(&cx));
    registry.apply(view, completion, observer.as_ref());

    assert_eq!(job.state(), JobState::Succeeded);
    assert_eq!(session.reconnect_count(), 1);
    assert_eq!(registry.rows(view).len(), 4);
    assert_eq!(observer.loaded.load(Ordering::SeqCst), 1);
    assert_eq!(observer.failed.load(Ordering::SeqCst), 0);
    // "loading" plus the retry notice.
    assert_eq!(observer.progress.load(Ordering::SeqCst), 2);
}

#[test]
fn failed_reconnect_is_fatal() {
    let session = Arc::new(session());
    let registry = Arc::new(ViewRegistry::new());
    let observer = CountingObserver::default();
    let view = registry.open_view();

    session.fail_next_statements(1);
    session.disconnect_on_failure();
    session.refuse_reconnect();

    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    let job = LoadJob::new(Arc::clone(&session), request());
    let completion = rt.block_on(job.run(&cx));

    match &completion {
        JobCompletion::Failed(Error::Connection(e)) => {
            assert_eq!(e.kind, relnav::ConnectionErrorKind::Reconnect);
        }
        other => panic!("expected a reconnect failure, got {other:?}"),
    }
    registry.apply(view, completion, &observer);

    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(session.reconnect_count(), 0);
    assert!(registry.rows(view).is_empty());
    assert_eq!(observer.failed.load(Ordering::SeqCst), 1);
    assert_eq!(observer.loaded.load(Ordering::SeqCst), 0);
}

#[test]
fn transient_failure_with_live_connection_retries_without_reconnect() {
    let session = Arc::new(session());
    let observer = CountingObserver::default();
    let registry = Arc::new(ViewRegistry::new());
    let view = registry.open_view();

    // Every statement of the first pass and its block-size retries fails,
    // but the connection stays up, so the job pings and retries directly.
    session.fail_next_statements(3);

    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    let job = LoadJob::new(Arc::clone(&session), request());
    let completion = rt.block_on(job.run(&cx));
    registry.apply(view, completion, &observer);

    assert_eq!(job.state(), JobState::Succeeded);
    assert_eq!(session.reconnect_count(), 0);
    assert_eq!(registry.rows(view).len(), 4);
    assert_eq!(observer.loaded.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_primary_key_is_fatal_and_not_retried() {
    let mut session = MemSession::new(Dialect::minimal("mem"));
    let mut log = MemTable::new("LOG", &["line"]);
    log.push_row(vec![Value::Text("a".to_string())]);
    session.add_table(log);
    let session = Arc::new(session);

    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    // Parents with synthetic ids cannot be restricted on.
    let keyless_table = Table::new("LOG", vec![Column::new("line", "varchar")], &[]);
    let parent = Row {
        row_id: "#0".to_string(),
        primary_key: Vec::new(),
        values: vec![Value::Text("a".to_string())],
        parent_model_index: None,
    };
    let mut model = DataModel::new();
    model.add_table(keyless_table.clone());
    let (fwd, _) = model.add_association(AssociationDef {
        name: "self".to_string(),
        source: "LOG".to_string(),
        destination: "LOG".to_string(),
        join_condition: "A.\"line\"=B.\"line\"".to_string(),
        cardinality: Cardinality::OneToMany,
    });

    let statements_before = session.statements().len();
    let request = LoadRequest {
        target: keyless_table.clone(),
        association: Some(model.association(fwd).clone()),
        source: Some(keyless_table),
        parents: vec![parent],
        condition: None,
        limit: 10,
        select_distinct: false,
        closure_row_ids: std::collections::HashSet::new(),
    };
    let job = LoadJob::new(Arc::clone(&session), request);
    let completion = rt.block_on(job.run(&cx));

    assert!(matches!(
        completion,
        JobCompletion::Failed(Error::MissingPrimaryKey { .. })
    ));
    // Fatal before any statement ran, and no retry attempted.
    assert_eq!(session.statements().len(), statements_before);
}
