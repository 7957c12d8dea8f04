use std::collections::HashSet;

use asupersync::runtime::RuntimeBuilder;
use asupersync::{Cx, Outcome};

use relnav::prelude::*;
use relnav_mem::{MemSession, MemTable};

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

const JOIN: &str = "A.\"customer_id\"=B.\"id\"";

fn shop_model() -> (DataModel, relnav::AssociationId, relnav::AssociationId) {
    let mut model = DataModel::new();
    model.add_table(Table::new(
        "CUSTOMER",
        vec![Column::new("id", "integer"), Column::new("name", "varchar")],
        &["id"],
    ));
    model.add_table(Table::new(
        "ORDERS",
        vec![
            Column::new("id", "integer"),
            Column::new("customer_id", "integer"),
        ],
        &["id"],
    ));
    let (fwd, rev) = model.add_association(AssociationDef {
        name: "customer-orders".to_string(),
        source: "CUSTOMER".to_string(),
        destination: "ORDERS".to_string(),
        join_condition: JOIN.to_string(),
        cardinality: Cardinality::OneToMany,
    });
    (model, fwd, rev)
}

fn shop_session() -> MemSession {
    let mut session = MemSession::new(Dialect::standard("mem"));
    let mut customer = MemTable::new("CUSTOMER", &["id", "name"]);
    customer.push_row(vec![Value::Int(1), Value::Text("ada".to_string())]);
    customer.push_row(vec![Value::Int(2), Value::Text("bob".to_string())]);
    session.add_table(customer);

    let mut orders = MemTable::new("ORDERS", &["id", "customer_id"]);
    for (id, customer_id) in [(100, 1), (101, 1), (200, 2)] {
        orders.push_row(vec![Value::Int(id), Value::Int(customer_id)]);
    }
    session.add_table(orders);
    session
}

#[test]
fn selection_closure_follows_loaded_links() {
    let (model, fwd, _) = shop_model();
    let session = shop_session();
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    let customers_view = ViewId::new(1);
    let orders_view = ViewId::new(2);

    rt.block_on(async {
        let not_in_closure = |_: &Row| false;
        let customers = unwrap_outcome(
            BlockLoader::new(
                &session,
                LoadSpec {
                    target: model.table("CUSTOMER").expect("customer table"),
                    association: None,
                    source: None,
                    parents: &[],
                    condition: None,
                    limit: 10,
                    select_distinct: false,
                },
                &not_in_closure,
                CancellationToken::new(),
            )
            .run(&cx)
            .await,
        );

        let orders = unwrap_outcome(
            BlockLoader::new(
                &session,
                LoadSpec {
                    target: model.table("ORDERS").expect("orders table"),
                    association: Some(model.association(fwd)),
                    source: Some(model.table("CUSTOMER").expect("customer table")),
                    parents: &customers.rows,
                    condition: None,
                    limit: 10,
                    select_distinct: false,
                },
                &not_in_closure,
                CancellationToken::new(),
            )
            .run(&cx)
            .await,
        );

        let mut links = RowLinkTracker::new();
        apply_links(&mut links, customers_view, orders_view, &customers.rows, &orders);

        let mut tracker = ClosureTracker::new();
        tracker.set_selection(&LinkWalk::new(&links), customers_view, "\"id\"=1", false);

        let order_ids = tracker.row_ids(orders_view).expect("orders in closure");
        let expected: HashSet<String> = ["\"id\"=100", "\"id\"=101"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(order_ids, &expected);
        assert!(!tracker.contains(orders_view, "\"id\"=200"));

        // Selecting a child walks back up to its parent.
        tracker.set_selection(&LinkWalk::new(&links), orders_view, "\"id\"=200", false);
        assert!(tracker.contains(customers_view, "\"id\"=2"));
        assert!(!tracker.contains(customers_view, "\"id\"=1"));

        tracker.reset();
        assert!(tracker.is_empty());
        assert!(tracker.row_ids(orders_view).is_none());
    });
}

#[test]
fn reversed_association_loads_parents_of_children() {
    let (model, fwd, rev) = shop_model();
    let session = shop_session();
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let not_in_closure = |_: &Row| false;
        let orders = unwrap_outcome(
            BlockLoader::new(
                &session,
                LoadSpec {
                    target: model.table("ORDERS").expect("orders table"),
                    association: None,
                    source: None,
                    parents: &[],
                    condition: Some("A.\"customer_id\"=2"),
                    limit: 10,
                    select_distinct: false,
                },
                &not_in_closure,
                CancellationToken::new(),
            )
            .run(&cx)
            .await,
        );
        assert_eq!(orders.rows.len(), 1);

        // The reversal edge runs the same join with the aliases swapped.
        let reversal = model.association(rev);
        assert_eq!(reversal.reversal, fwd);
        let owners = unwrap_outcome(
            BlockLoader::new(
                &session,
                LoadSpec {
                    target: model.table("CUSTOMER").expect("customer table"),
                    association: Some(reversal),
                    source: Some(model.table("ORDERS").expect("orders table")),
                    parents: &orders.rows,
                    condition: None,
                    limit: 10,
                    select_distinct: false,
                },
                &not_in_closure,
                CancellationToken::new(),
            )
            .run(&cx)
            .await,
        );

        assert_eq!(owners.rows.len(), 1);
        assert_eq!(owners.rows[0].row_id, "\"id\"=2");
        assert_eq!(owners.rows[0].parent_model_index, Some(0));
    });
}

#[test]
fn closure_truncation_is_flagged_distinctly() {
    let (model, fwd, _) = shop_model();
    let session = shop_session();
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let not_in_closure = |_: &Row| false;
        let customers = unwrap_outcome(
            BlockLoader::new(
                &session,
                LoadSpec {
                    target: model.table("CUSTOMER").expect("customer table"),
                    association: None,
                    source: None,
                    parents: &[],
                    condition: None,
                    limit: 10,
                    select_distinct: false,
                },
                &not_in_closure,
                CancellationToken::new(),
            )
            .run(&cx)
            .await,
        );

        // Customer 1 is selected; it has two orders but only one fits.
        let closure_ids: HashSet<String> =
            std::iter::once(customers.rows[0].row_id.clone()).collect();
        let in_closure = |row: &Row| closure_ids.contains(&row.row_id);

        let spec = LoadSpec {
            target: model.table("ORDERS").expect("orders table"),
            association: Some(model.association(fwd)),
            source: Some(model.table("CUSTOMER").expect("customer table")),
            parents: &customers.rows,
            condition: None,
            limit: 1,
            select_distinct: false,
        };
        let result = unwrap_outcome(
            BlockLoader::new(&session, spec, &in_closure, CancellationToken::new())
                .run(&cx)
                .await,
        );
        assert_eq!(result.rows.len(), 1);
        assert!(result.limit_exceeded);
        assert!(result.closure_limit_exceeded);
        // The retained row belongs to the selected customer: closure blocks
        // are scheduled first.
        assert_eq!(result.rows[0].parent_model_index, Some(0));

        // Truncation among unselected parents only raises the generic flag.
        let plain = unwrap_outcome(
            BlockLoader::new(&session, spec, &not_in_closure, CancellationToken::new())
                .run(&cx)
                .await,
        );
        assert!(plain.limit_exceeded);
        assert!(!plain.closure_limit_exceeded);
    });
}
