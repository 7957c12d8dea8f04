//! Cancellable load jobs.
//!
//! A [`LoadJob`] wraps one loader pass with everything the browser needs
//! around it: a state machine, an idempotent cancel, and the
//! ping/reconnect/retry policy for flaky connections. The job produces a
//! [`JobCompletion`]; applying it to a view is the registry's business, so a
//! cancelled or failed job can never half-mutate shared state.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use asupersync::{Cx, Outcome};
use relnav_closure::ViewId;
use relnav_core::{
    Association, CancellationToken, ConnectionErrorKind, Error, Session, Table,
};
use relnav_loader::{BlockLoader, LoadResult, LoadSpec, Row};

use crate::view::LoadObserver;

/// Job lifecycle. `Succeeded`, `Failed`, and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Created, not yet picked up by the run queue.
    Pending,
    /// Executing on the session worker.
    Running,
    /// Produced a result.
    Succeeded,
    /// Produced an error.
    Failed,
    /// Unwound without touching anything.
    Cancelled,
}

impl JobState {
    /// Whether the job can no longer change state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }
}

/// How a job ended. Cancellation is silent: it carries nothing and triggers
/// no callback.
#[derive(Debug)]
pub enum JobCompletion {
    /// The load finished; apply the result.
    Succeeded(LoadResult),
    /// The load failed after the retry policy was exhausted.
    Failed(Error),
    /// The job was cancelled; nothing to apply.
    Cancelled,
}

/// Everything one load needs, owned so the job can outlive its creator.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// The table whose rows are loaded.
    pub target: Table,
    /// The association to follow, if loading children.
    pub association: Option<Association>,
    /// The association's source table; present iff `association` is.
    pub source: Option<Table>,
    /// Parent rows, in view order.
    pub parents: Vec<Row>,
    /// Free-form restriction over alias `A`.
    pub condition: Option<String>,
    /// Maximum number of rows to retain.
    pub limit: usize,
    /// Whether to deduplicate globally.
    pub select_distinct: bool,
    /// rowIds of parents that are in the current closure; used for
    /// closure-first scheduling and the closure truncation flag.
    pub closure_row_ids: HashSet<String>,
}

/// One cancellable load against one session.
pub struct LoadJob<S: Session> {
    session: Arc<S>,
    request: LoadRequest,
    token: CancellationToken,
    state: Mutex<JobState>,
    progress: Option<(ViewId, Arc<dyn LoadObserver>)>,
}

impl<S: Session> LoadJob<S> {
    /// Create a pending job.
    pub fn new(session: Arc<S>, request: LoadRequest) -> Arc<Self> {
        Arc::new(Self {
            session,
            request,
            token: CancellationToken::new(),
            state: Mutex::new(JobState::Pending),
            progress: None,
        })
    }

    /// Create a pending job that reports progress for `view` to `observer`.
    pub fn with_observer(
        session: Arc<S>,
        request: LoadRequest,
        view: ViewId,
        observer: Arc<dyn LoadObserver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            request,
            token: CancellationToken::new(),
            state: Mutex::new(JobState::Pending),
            progress: Some((view, observer)),
        })
    }

    fn report(&self, status: &str) {
        if let Some((view, observer)) = &self.progress {
            observer.on_progress(*view, status);
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        *self.state.lock().expect("job state lock poisoned")
    }

    /// Request cancellation. Idempotent; a no-op once the job is terminal.
    pub fn cancel(&self) {
        let mut state = self.state.lock().expect("job state lock poisoned");
        if state.is_terminal() {
            return;
        }
        if *state == JobState::Pending {
            *state = JobState::Cancelled;
        }
        self.token.cancel();
    }

    /// The job's cancellation token, for wiring into progress UIs.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Execute the job. Called from the run queue; runs the loader once and
    /// retries exactly once after probing (and if needed restoring) the
    /// connection.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.request.target.name))]
    pub async fn run(&self, cx: &Cx) -> JobCompletion {
        {
            let mut state = self.state.lock().expect("job state lock poisoned");
            if *state != JobState::Pending {
                // Cancelled before the worker got to it.
                return self.finish(JobCompletion::Cancelled);
            }
            *state = JobState::Running;
        }
        self.report("loading");

        let first = self.attempt(cx).await;
        let error = match first {
            Outcome::Ok(result) => return self.finish(JobCompletion::Succeeded(result)),
            Outcome::Cancelled(_) => return self.finish(JobCompletion::Cancelled),
            Outcome::Panicked(p) => {
                return self.finish(JobCompletion::Failed(Error::Custom(format!(
                    "load panicked: {p:?}"
                ))));
            }
            Outcome::Err(Error::Cancelled) => return self.finish(JobCompletion::Cancelled),
            Outcome::Err(e) => e,
        };

        if !error.is_retryable() {
            return self.finish(JobCompletion::Failed(error));
        }
        tracing::info!(error = %error, "load failed, probing connection");
        self.report("connection problem, retrying");

        if let Some(completion) = self.restore_connection(cx).await {
            return self.finish(completion);
        }

        // The one retry of the full operation.
        match self.attempt(cx).await {
            Outcome::Ok(result) => self.finish(JobCompletion::Succeeded(result)),
            Outcome::Cancelled(_) | Outcome::Err(Error::Cancelled) => {
                self.finish(JobCompletion::Cancelled)
            }
            Outcome::Panicked(p) => self.finish(JobCompletion::Failed(Error::Custom(format!(
                "load panicked: {p:?}"
            )))),
            Outcome::Err(e) => {
                tracing::warn!(error = %e, "load failed again after reconnect");
                self.finish(JobCompletion::Failed(e))
            }
        }
    }

    /// Ping the session; reconnect when dead. `Some` short-circuits the job.
    async fn restore_connection(&self, cx: &Cx) -> Option<JobCompletion> {
        match self.session.ping(cx).await {
            Outcome::Ok(()) => None,
            Outcome::Cancelled(_) => Some(JobCompletion::Cancelled),
            Outcome::Panicked(_) | Outcome::Err(_) => {
                tracing::info!("connection dead, reconnecting");
                match self.session.reconnect(cx).await {
                    Outcome::Ok(()) => None,
                    Outcome::Cancelled(_) => Some(JobCompletion::Cancelled),
                    Outcome::Err(e) => Some(JobCompletion::Failed(Error::connection(
                        ConnectionErrorKind::Reconnect,
                        e.to_string(),
                    ))),
                    Outcome::Panicked(p) => Some(JobCompletion::Failed(Error::connection(
                        ConnectionErrorKind::Reconnect,
                        format!("{p:?}"),
                    ))),
                }
            }
        }
    }

    async fn attempt(&self, cx: &Cx) -> Outcome<LoadResult, Error> {
        let request = &self.request;
        let spec = LoadSpec {
            target: &request.target,
            association: request.association.as_ref(),
            source: request.source.as_ref(),
            parents: &request.parents,
            condition: request.condition.as_deref(),
            limit: request.limit,
            select_distinct: request.select_distinct,
        };
        let in_closure = |row: &Row| request.closure_row_ids.contains(&row.row_id);
        BlockLoader::new(&*self.session, spec, &in_closure, self.token.clone())
            .run(cx)
            .await
    }

    fn finish(&self, completion: JobCompletion) -> JobCompletion {
        let mut state = self.state.lock().expect("job state lock poisoned");
        if !state.is_terminal() {
            *state = match completion {
                JobCompletion::Succeeded(_) => JobState::Succeeded,
                JobCompletion::Failed(_) => JobState::Failed,
                JobCompletion::Cancelled => JobState::Cancelled,
            };
        }
        completion
    }
}
