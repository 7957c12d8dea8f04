//! In-memory reference driver for relnav.
//!
//! [`MemSession`] implements the core [`Session`] trait over tables held in
//! memory, executing the loader's SQL subset for real: restrictions, joins,
//! inline views in both styles, `row_number()` wrappers, native limits,
//! `count(*)`.
//!
//! What makes it useful beyond demos is that its capabilities are
//! configurable *independently of the dialect it advertises*: a session can
//! claim `row_number()` support and still reject it at execution time, which
//! is exactly the driver behavior the loader's fallback cascades exist for.
//! Scripted failures, per-row delays, and a reconnect counter cover the
//! retry and cancellation paths.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use asupersync::{Cx, Outcome};
use regex::Regex;
use relnav_core::{
    ConnectionErrorKind, Dialect, Error, RowSink, Session, SqlRow, Value,
};

mod eval;
mod lexer;

use eval::FeatureUse;

/// One in-memory table.
pub struct MemTable {
    name: String,
    columns: Vec<String>,
    data: TableData,
}

enum TableData {
    Rows(Vec<Vec<Value>>),
    Generated {
        count: usize,
        generate: Arc<dyn Fn(usize) -> Vec<Value> + Send + Sync>,
    },
}

impl MemTable {
    /// An empty table with the given columns.
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            data: TableData::Rows(Vec::new()),
        }
    }

    /// A synthetic table of `count` rows produced on demand, so huge tables
    /// cost nothing until scanned.
    pub fn generated(
        name: impl Into<String>,
        columns: &[&str],
        count: usize,
        generate: impl Fn(usize) -> Vec<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            data: TableData::Generated {
                count,
                generate: Arc::new(generate),
            },
        }
    }

    /// Append a row. No-op on generated tables.
    pub fn push_row(&mut self, row: Vec<Value>) {
        if let TableData::Rows(rows) = &mut self.data {
            rows.push(row);
        }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row count.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.data {
            TableData::Rows(rows) => rows.len(),
            TableData::Generated { count, .. } => *count,
        }
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn row(&self, index: usize) -> Vec<Value> {
        match &self.data {
            TableData::Rows(rows) => rows[index].clone(),
            TableData::Generated { generate, .. } => generate(index),
        }
    }
}

/// What the engine actually executes, independent of what the advertised
/// dialect claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemCaps {
    /// Accept the dialect's native limit clause.
    pub limit_suffix: bool,
    /// Accept inline views (`values` and `union all` styles).
    pub inline_view: bool,
    /// Accept `row_number() over()`.
    pub row_number: bool,
}

impl MemCaps {
    /// Capabilities matching what `dialect` advertises.
    #[must_use]
    pub fn matching(dialect: &Dialect) -> Self {
        Self {
            limit_suffix: dialect.limit_suffix.is_some(),
            inline_view: dialect.inline_view.is_some(),
            row_number: dialect.supports_row_number,
        }
    }

    /// No optional capabilities at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            limit_suffix: false,
            inline_view: false,
            row_number: false,
        }
    }
}

#[derive(Default)]
struct Hooks {
    fail_next: usize,
    disconnect_on_failure: bool,
    row_delay: Option<Duration>,
    refuse_reconnect: bool,
}

/// An in-memory database session.
pub struct MemSession {
    dialect: Dialect,
    caps: MemCaps,
    limit_re: Option<Regex>,
    tables: HashMap<String, MemTable>,
    hooks: Mutex<Hooks>,
    statements: Mutex<Vec<String>>,
    connected: AtomicBool,
    reconnects: AtomicUsize,
}

impl MemSession {
    /// A session advertising `dialect` and executing everything it claims.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        let caps = MemCaps::matching(&dialect);
        let limit_re = limit_regex(&dialect, caps);
        Self {
            dialect,
            caps,
            limit_re,
            tables: HashMap::new(),
            hooks: Mutex::new(Hooks::default()),
            statements: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            reconnects: AtomicUsize::new(0),
        }
    }

    /// Override the engine's capabilities, e.g. to advertise more than the
    /// engine accepts and so force the loader's fallback paths.
    #[must_use]
    pub fn with_caps(mut self, caps: MemCaps) -> Self {
        self.caps = caps;
        self.limit_re = limit_regex(&self.dialect, caps);
        self
    }

    /// Register a table.
    pub fn add_table(&mut self, table: MemTable) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Fail the next `n` statements with a statement error.
    pub fn fail_next_statements(&self, n: usize) {
        self.hooks.lock().expect("hooks lock poisoned").fail_next = n;
    }

    /// Make scripted failures also drop the connection.
    pub fn disconnect_on_failure(&self) {
        self.hooks
            .lock()
            .expect("hooks lock poisoned")
            .disconnect_on_failure = true;
    }

    /// Sleep this long before delivering each row.
    pub fn set_row_delay(&self, delay: Duration) {
        self.hooks.lock().expect("hooks lock poisoned").row_delay = Some(delay);
    }

    /// Make reconnect attempts fail.
    pub fn refuse_reconnect(&self) {
        self.hooks
            .lock()
            .expect("hooks lock poisoned")
            .refuse_reconnect = true;
    }

    /// How many times `reconnect` succeeded.
    #[must_use]
    pub fn reconnect_count(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Whether the connection is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Every statement seen so far, in execution order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .expect("statement log lock poisoned")
            .clone()
    }

    /// Split a trailing native limit clause off `sql`, if the engine
    /// accepts one.
    fn strip_limit(&self, sql: &str) -> (String, Option<usize>) {
        if let Some(re) = &self.limit_re {
            if let Some(caps) = re.captures(sql) {
                let limit = caps.get(1).and_then(|m| m.as_str().parse().ok());
                if let (Some(limit), Some(m)) = (limit, caps.get(0)) {
                    return (sql[..m.start()].to_string(), Some(limit));
                }
            }
        }
        (sql.to_string(), None)
    }
}

fn limit_regex(dialect: &Dialect, caps: MemCaps) -> Option<Regex> {
    if !caps.limit_suffix {
        return None;
    }
    let template = dialect.limit_suffix.as_ref()?;
    // "limit %s" / "fetch first %s rows only" -> a pattern tolerant of
    // whitespace, with the row count captured.
    let pattern = template
        .split("%s")
        .map(|part| {
            part.split_whitespace()
                .map(|word| regex::escape(word))
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join(r"\s*(\d+)\s*");
    Regex::new(&format!(r"(?i)\s+{pattern}\s*$")).ok()
}

impl Session for MemSession {
    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn execute_query(
        &self,
        cx: &Cx,
        sql: &str,
        sink: &mut dyn RowSink,
        limit_hint: Option<usize>,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        async move {
            self.statements
                .lock()
                .expect("statement log lock poisoned")
                .push(sql.to_string());

            {
                let mut hooks = self.hooks.lock().expect("hooks lock poisoned");
                if hooks.fail_next > 0 {
                    hooks.fail_next -= 1;
                    if hooks.disconnect_on_failure {
                        self.connected.store(false, Ordering::SeqCst);
                    }
                    return Outcome::Err(Error::sql(sql, "scripted failure"));
                }
            }
            if !self.connected.load(Ordering::SeqCst) {
                return Outcome::Err(Error::connection(
                    ConnectionErrorKind::Lost,
                    "connection is closed",
                ));
            }
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }

            let (body, limit) = self.strip_limit(sql);
            let stmt = match eval::parse(&body) {
                Ok(stmt) => stmt,
                Err(message) => return Outcome::Err(Error::sql(sql, message)),
            };
            let mut features = FeatureUse::default();
            stmt.features(&mut features);
            if features.inline_view && !self.caps.inline_view {
                return Outcome::Err(Error::sql(sql, "inline views are not supported"));
            }
            if features.row_number && !self.caps.row_number {
                return Outcome::Err(Error::sql(sql, "row_number is not supported"));
            }

            let result = match eval::eval(&stmt, limit, limit_hint, &self.tables) {
                Ok(result) => result,
                Err(message) => return Outcome::Err(Error::sql(sql, message)),
            };

            let delay = self.hooks.lock().expect("hooks lock poisoned").row_delay;
            let columns = Arc::new(result.columns);
            let mut delivered = 0u64;
            for values in result.rows {
                if let Some(delay) = delay {
                    std::thread::sleep(delay);
                }
                if let Some(reason) = cx.cancel_reason() {
                    return Outcome::Cancelled(reason);
                }
                delivered += 1;
                if !sink.push(SqlRow::new(Arc::clone(&columns), values)) {
                    break;
                }
            }
            Outcome::Ok(delivered)
        }
    }

    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move {
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }
            if self.connected.load(Ordering::SeqCst) {
                Outcome::Ok(())
            } else {
                Outcome::Err(Error::connection(
                    ConnectionErrorKind::Lost,
                    "connection is closed",
                ))
            }
        }
    }

    fn reconnect(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move {
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }
            if self
                .hooks
                .lock()
                .expect("hooks lock poisoned")
                .refuse_reconnect
            {
                return Outcome::Err(Error::connection(
                    ConnectionErrorKind::Connect,
                    "server unreachable",
                ));
            }
            self.connected.store(true, Ordering::SeqCst);
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("mem session reconnected");
            Outcome::Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use relnav_core::CollectSink;

    fn session() -> MemSession {
        let mut session = MemSession::new(Dialect::standard("mem"));
        let mut orders = MemTable::new("ORDERS", &["id", "customer_id"]);
        orders.push_row(vec![Value::Int(100), Value::Int(1)]);
        orders.push_row(vec![Value::Int(101), Value::Int(1)]);
        orders.push_row(vec![Value::Int(200), Value::Int(2)]);
        session.add_table(orders);
        session
    }

    fn run_query(session: &MemSession, sql: &str) -> Outcome<Vec<SqlRow>, Error> {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create runtime");
        let cx = Cx::for_testing();
        rt.block_on(async {
            let mut sink = CollectSink::new();
            match session.execute_query(&cx, sql, &mut sink, None).await {
                Outcome::Ok(_) => Outcome::Ok(sink.into_rows()),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        })
    }

    #[test]
    fn test_executes_with_native_limit() {
        let session = session();
        let rows = match run_query(&session, "Select A.\"id\" From \"ORDERS\" A limit 2") {
            Outcome::Ok(rows) => rows,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_rejects_what_caps_forbid() {
        let session = session().with_caps(MemCaps::none());
        // The dialect still advertises a limit clause; the engine refuses it.
        let outcome = run_query(&session, "Select A.\"id\" From \"ORDERS\" A limit 2");
        assert!(matches!(outcome, Outcome::Err(Error::Sql(_))));

        let outcome = run_query(
            &session,
            "Select A.\"id\" From \"ORDERS\" A Where row_number() over() <= 2",
        );
        assert!(matches!(outcome, Outcome::Err(Error::Sql(_))));

        // Plain statements still work.
        let rows = match run_query(&session, "Select A.\"id\" From \"ORDERS\" A") {
            Outcome::Ok(rows) => rows,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_scripted_failure_and_reconnect() {
        let session = session();
        session.disconnect_on_failure();
        session.fail_next_statements(1);

        let outcome = run_query(&session, "Select A.\"id\" From \"ORDERS\" A");
        assert!(matches!(outcome, Outcome::Err(Error::Sql(_))));
        assert!(!session.is_connected());

        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create runtime");
        let cx = Cx::for_testing();
        rt.block_on(async {
            assert!(matches!(session.ping(&cx).await, Outcome::Err(_)));
            assert!(matches!(session.reconnect(&cx).await, Outcome::Ok(())));
        });
        assert_eq!(session.reconnect_count(), 1);
        assert!(session.is_connected());
    }

    #[test]
    fn test_generated_table_streams_lazily() {
        let mut session = MemSession::new(Dialect::minimal("bare"));
        session.add_table(MemTable::generated("BIG", &["id"], 1_000_000, |i| {
            vec![Value::Int(i as i64)]
        }));

        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create runtime");
        let cx = Cx::for_testing();
        let rows = rt.block_on(async {
            let mut sink = CollectSink::with_cap(11);
            match session
                .execute_query(&cx, "Select A.\"id\" From \"BIG\" A", &mut sink, Some(11))
                .await
            {
                Outcome::Ok(_) => sink.into_rows(),
                other => panic!("unexpected outcome: {other:?}"),
            }
        });
        assert_eq!(rows.len(), 11);
    }

    #[test]
    fn test_statement_log() {
        let session = session();
        run_query(&session, "Select A.\"id\" From \"ORDERS\" A");
        assert_eq!(session.statements().len(), 1);
    }
}
