use std::sync::{Arc, mpsc};
use std::time::Duration;

use asupersync::Cx;
use relnav::prelude::*;
use relnav_mem::{MemSession, MemTable};

fn events_table() -> Table {
    Table::new(
        "EVENTS",
        vec![Column::new("id", "integer"), Column::new("kind", "varchar")],
        &["id"],
    )
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

#[test]
fn zz_repro_pending_cancel() {
    let mut session = MemSession::new(Dialect::standard("mem"));
    session.add_table(MemTable::generated(
        "EVENTS",
        &["id", "kind"],
        100_000,
        |i| vec![Value::Int(i as i64), Value::Text("audit".to_string())],
    ));
    let session = Arc::new(session);
    let registry = Arc::new(ViewRegistry::new());
    let queue = RunQueue::new("repro");
    let view = registry.open_view();

    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    queue.add(0, async move {
        gate_rx.recv().ok();
    });

    let job = LoadJob::new(Arc::clone(&session), request(5));
    registry.begin_job(view, job.clone());
    let (tx, rx) = mpsc::channel();
    let cx = Cx::for_testing();
    let task_job = job.clone();
    eprintln!("before add");
    queue.add(PRIORITY_RELOAD, async move {
        eprintln!("task: entering");
        let completion = task_job.run(&cx).await;
        eprintln!("task: run returned {:?}", std::mem::discriminant(&completion));
        tx.send(()).ok();
        eprintln!("task: sent");
    });
    job.cancel();
    eprintln!("cancelled, state={:?}", job.state());
    gate_tx.send(()).ok();
    eprintln!("gate sent");
    rx.recv_timeout(Duration::from_secs(5)).expect("queued job");
    eprintln!("done");
}
