//! Jobs: the unit of work executed by the pool.
//!
//! A [`Job`] is built by the caller from a set of callbacks, then handed to
//! [`Pool::send`](crate::Pool::send), which initializes it exactly once and
//! queues its pipeline:
//!
//! ```text
//! Running ─► before ─► action ─► after ─► Completed
//!               │         │        │
//!               └─────────┴────────┴──► Failed (first error wins)
//! ```
//!
//! `Job` is a cheap handle (an `Arc`); clones share the same state, so the
//! caller can keep polling [`Job::status`] and [`Job::error`] after the
//! registry has forgotten the job.
//!
//! # Cancellation
//!
//! Cancellation is cooperative. [`Job::cancel`] runs the cancel callback,
//! fires the job's cancellation scope and waits for the pipeline to return.
//! The action is expected to watch [`Job::cancelled`]; an action that ignores
//! it runs to the end, and the job is still reported `Cancelled`.
//!
//! # Panics
//!
//! A panic in any stage is caught at the pipeline boundary, converted to
//! [`JobError::Panicked`] with the captured stack trace, and fails the job.
//! Panics never reach the worker running the job.

mod builder;
mod error;
mod id;
mod status;

pub use builder::{JobBuilder, StageFuture};
pub use error::{CallbackError, JobError, Stage};
pub use id::JobId;
pub use status::JobStatus;

use crate::log::Logger;
use crate::panic::{self as panic_trace, PanicTrace};
use crate::{log_debug, log_error};
use builder::{Callbacks, ErrorHandler};
pub(crate) use builder::StatusHook;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// Handle to a unit of work. See the [module docs](self).
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

struct JobInner {
    id: OnceLock<JobId>,
    callbacks: Callbacks,
    /// Replaced by the registry with a wrapper that keeps its buckets current.
    status_hook: RwLock<Option<StatusHook>>,
    /// Taken by `init`; guards against parent changes racing initialization.
    cancellation_parent: Mutex<Option<CancellationToken>>,
    runtime: OnceLock<JobRuntime>,
    state: Mutex<JobState>,
}

/// Everything `init` derives from the pool and the callbacks.
struct JobRuntime {
    logger: Arc<dyn Logger>,
    error_handler: ErrorHandler,
    cancellation: CancellationToken,
    /// Fired once `run` has returned, for `cancel` to wait on.
    finished: CancellationToken,
    /// Fired once the first `cancel` call has settled the job.
    settled: CancellationToken,
}

#[derive(Default)]
struct JobState {
    /// `None` until `init` writes the first status.
    status: Option<JobStatus>,
    error: Option<JobError>,
    stage: Option<Stage>,
    run: RunPhase,
    cancel_requested: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum RunPhase {
    #[default]
    Idle,
    Running,
    Finished,
}

type PanicOutcome = (String, Option<PanicTrace>);

impl Job {
    pub fn builder() -> JobBuilder {
        JobBuilder::new()
    }

    /// Shorthand for a job with only an action.
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        JobBuilder::new().action(action).build()
    }

    pub(crate) fn from_parts(
        callbacks: Callbacks,
        on_status_change: Option<StatusHook>,
        cancellation_parent: Option<CancellationToken>,
    ) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: OnceLock::new(),
                callbacks,
                status_hook: RwLock::new(on_status_change),
                cancellation_parent: Mutex::new(cancellation_parent),
                runtime: OnceLock::new(),
                state: Mutex::new(JobState::default()),
            }),
        }
    }

    /// Returns the job's identifier, generating it on first call.
    pub fn id(&self) -> &JobId {
        self.inner.id.get_or_init(JobId::generate)
    }

    /// Current status. Uninitialized jobs report `Pending`.
    pub fn status(&self) -> JobStatus {
        self.inner.state.lock().status.unwrap_or_default()
    }

    /// The first error the job recorded, if any.
    pub fn error(&self) -> Option<JobError> {
        self.inner.state.lock().error.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.runtime.get().is_some()
    }

    /// Returns true if both handles refer to the same job.
    pub fn ptr_eq(a: &Job, b: &Job) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// The job's cancellation scope, once initialized.
    pub fn cancellation(&self) -> Option<CancellationToken> {
        self.inner.runtime.get().map(|rt| rt.cancellation.clone())
    }

    /// Returns true once cancellation of the job's scope has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.inner
            .runtime
            .get()
            .is_some_and(|rt| rt.cancellation.is_cancelled())
    }

    /// Completes when the job's cancellation scope fires. Never completes for
    /// a job that has not been initialized.
    pub async fn cancelled(&self) {
        match self.inner.runtime.get() {
            Some(rt) => rt.cancellation.cancelled().await,
            None => std::future::pending().await,
        }
    }

    /// Sets the token the cancellation scope will be derived from.
    ///
    /// Only possible before the job is initialized.
    pub fn set_cancellation_parent(&self, parent: CancellationToken) -> Result<(), JobError> {
        let mut slot = self.inner.cancellation_parent.lock();
        if self.is_initialized() {
            return Err(JobError::AlreadyInitialized);
        }
        *slot = Some(parent);
        Ok(())
    }

    pub(crate) fn has_action(&self) -> bool {
        self.inner.callbacks.action.is_some()
    }

    /// Prepares the job for execution. Called by the pool on submission.
    ///
    /// Builds the cancellation scope and the default error handler, then sets
    /// the job `Pending`. A job without an action is failed immediately with
    /// [`JobError::ActionNotDefined`] and will never run.
    pub fn init(&self, logger: Arc<dyn Logger>) -> Result<(), JobError> {
        panic_trace::init();

        let mut parent = self.inner.cancellation_parent.lock();
        if self.is_initialized() {
            return Err(JobError::AlreadyInitialized);
        }
        let cancellation = match parent.take() {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let error_handler = self
            .inner
            .callbacks
            .error_handler
            .clone()
            .unwrap_or_else(|| default_error_handler(Arc::clone(&logger)));

        let runtime = JobRuntime {
            logger,
            error_handler,
            cancellation,
            finished: CancellationToken::new(),
            settled: CancellationToken::new(),
        };
        if self.inner.runtime.set(runtime).is_err() {
            return Err(JobError::AlreadyInitialized);
        }
        drop(parent);

        if !self.has_action() {
            self.fail(JobError::ActionNotDefined);
        } else {
            self.set_status(JobStatus::Pending);
        }
        Ok(())
    }

    /// Executes the pipeline and waits for it to finish.
    ///
    /// Returns immediately if the job is not initialized, already has an
    /// error, was cancelled, or has run before. The pipeline runs as its own
    /// task; panics inside it are recovered and fail the job.
    pub async fn run(&self) {
        let Some(runtime) = self.inner.runtime.get() else {
            return;
        };
        {
            let mut state = self.inner.state.lock();
            let runnable = state.error.is_none()
                && !state.cancel_requested
                && state.run == RunPhase::Idle
                && state.status == Some(JobStatus::Pending);
            if !runnable {
                return;
            }
            state.run = RunPhase::Running;
        }

        let job = self.clone();
        let task = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(job.pipeline()).catch_unwind().await;
            // Same thread as the unwind: the hook's trace is still in the slot.
            outcome.map_err(|payload| {
                (
                    panic_trace::payload_message(&*payload),
                    panic_trace::take_trace(),
                )
            })
        });

        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(panic)) => self.recover(panic),
            Err(join_err) if join_err.is_panic() => {
                let payload = join_err.into_panic();
                self.recover((panic_trace::payload_message(&*payload), None));
            }
            Err(_) => self.fail(JobError::Aborted),
        }

        self.inner.state.lock().run = RunPhase::Finished;
        runtime.finished.cancel();
    }

    /// Cancels the job and waits until its pipeline has returned.
    ///
    /// Runs the cancel callback, then fires the cancellation scope. If the
    /// pipeline is executing, waits for it to return, which only happens
    /// once the action cooperates (or finishes on its own). The job ends
    /// `Cancelled`, even if the action ran to completion or an error was
    /// recorded along the way.
    ///
    /// Concurrent callers all return once the first one has written
    /// `Cancelled`; only the first runs the cancel callback. Does nothing for
    /// uninitialized jobs and for jobs that had already reached a terminal
    /// status.
    pub async fn cancel(&self) {
        let Some(runtime) = self.inner.runtime.get() else {
            return;
        };
        let first = {
            let mut state = self.inner.state.lock();
            if state.cancel_requested {
                None
            } else if state.status.map_or(true, |s| s.is_terminal()) {
                return;
            } else {
                state.cancel_requested = true;
                Some(state.run == RunPhase::Running)
            }
        };
        let Some(was_running) = first else {
            runtime.settled.cancelled().await;
            return;
        };
        // Fires on return, or if this call is dropped half way.
        let _settled = runtime.settled.clone().drop_guard();

        // The pipeline may be mid-stage, so the cancel stage is not recorded
        // in the job state.
        if let Some(callback) = self.inner.callbacks.cancel.clone() {
            let outcome = AssertUnwindSafe(callback(self.clone()))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => self.report(JobError::callback(Stage::Cancel, err)),
                Err(payload) => self.report(JobError::Panicked {
                    stage: Stage::Cancel,
                    message: panic_trace::payload_message(&*payload),
                    trace: panic_trace::take_trace().map(Arc::new),
                }),
            }
        }

        runtime.cancellation.cancel();
        if was_running {
            runtime.finished.cancelled().await;
        }

        self.set_status(JobStatus::Cancelled);
    }

    async fn pipeline(self) {
        if !self.set_status(JobStatus::Running) || self.error().is_some() {
            return;
        }

        let callbacks = &self.inner.callbacks;
        let stages = [
            (Stage::Before, &callbacks.before),
            (Stage::Action, &callbacks.action),
            (Stage::After, &callbacks.after),
        ];
        for (stage, callback) in stages {
            let Some(callback) = callback else {
                continue;
            };
            self.enter_stage(stage);
            if let Err(err) = callback(self.clone()).await {
                self.fail(JobError::callback(stage, err));
                return;
            }
        }

        self.set_status(JobStatus::Completed);
    }

    fn enter_stage(&self, stage: Stage) {
        self.inner.state.lock().stage = Some(stage);
    }

    fn panicked(&self, (message, trace): PanicOutcome) -> JobError {
        let stage = self.inner.state.lock().stage.unwrap_or(Stage::Action);
        JobError::Panicked {
            stage,
            message,
            trace: trace.map(Arc::new),
        }
    }

    fn recover(&self, panic: PanicOutcome) {
        let err = self.panicked(panic);
        self.fail(err);
    }

    /// Records `err` (if it is the first), marks the job failed and hands the
    /// error to the error handler.
    fn fail(&self, err: JobError) {
        self.record_error(err.clone());
        self.set_status(JobStatus::Failed);
        self.handle_error(&err);
    }

    /// Like `fail`, without the status change.
    fn report(&self, err: JobError) {
        self.record_error(err.clone());
        self.handle_error(&err);
    }

    fn record_error(&self, err: JobError) -> bool {
        let mut state = self.inner.state.lock();
        if state.error.is_some() {
            return false;
        }
        state.error = Some(err);
        true
    }

    /// Hands `err` to the error handler. A panicking handler is logged and
    /// otherwise ignored.
    fn handle_error(&self, err: &JobError) {
        let Some(runtime) = self.inner.runtime.get() else {
            return;
        };
        let outcome =
            std::panic::catch_unwind(AssertUnwindSafe(|| (runtime.error_handler)(self, err)));
        if let Err(payload) = outcome {
            let message = panic_trace::payload_message(&*payload);
            match panic_trace::take_trace() {
                Some(trace) => log_error!(
                    runtime.logger,
                    "[PANIC RECOVER] job {}: error handler panicked: {}\n{}",
                    self.id(),
                    message,
                    trace
                ),
                None => log_error!(
                    runtime.logger,
                    "[PANIC RECOVER] job {}: error handler panicked: {}",
                    self.id(),
                    message
                ),
            }
        }
    }

    /// The single write point for status changes.
    ///
    /// Applies `next` if the transition table allows it, then runs the
    /// status hook outside the job lock. Once cancellation is requested the
    /// pipeline can no longer finish the job; only `Cancelled` can.
    /// Returns whether the status was written.
    pub(crate) fn set_status(&self, next: JobStatus) -> bool {
        {
            let mut state = self.inner.state.lock();
            let allowed = match state.status {
                None => matches!(next, JobStatus::Pending | JobStatus::Failed),
                Some(current) => current.can_transition_to(next),
            };
            let superseded = state.cancel_requested
                && matches!(next, JobStatus::Completed | JobStatus::Failed);
            if !allowed || superseded {
                let current = state.status;
                drop(state);
                if let Some(runtime) = self.inner.runtime.get() {
                    log_debug!(
                        runtime.logger,
                        "workerpool: job {} ignored transition {:?} -> {}",
                        self.id(),
                        current,
                        next
                    );
                }
                return false;
            }
            state.status = Some(next);
        }

        let hook = self.inner.status_hook.read().clone();
        if let Some(hook) = hook {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| hook(self, next)));
            let err = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(JobError::callback(Stage::StatusChange, err)),
                Err(payload) => Some(JobError::Panicked {
                    stage: Stage::StatusChange,
                    message: panic_trace::payload_message(&*payload),
                    trace: panic_trace::take_trace().map(Arc::new),
                }),
            };
            if let Some(err) = err {
                // A cascading hook failure never replaces the primary error.
                if self.record_error(err.clone()) {
                    self.set_status(JobStatus::Failed);
                }
                self.handle_error(&err);
            }
        }
        true
    }

    /// Replaces the status hook with `wrap(previous hook)`.
    pub(crate) fn wrap_status_hook(&self, wrap: impl FnOnce(Option<StatusHook>) -> StatusHook) {
        let mut hook = self.inner.status_hook.write();
        let previous = hook.take();
        *hook = Some(wrap(previous));
    }
}

fn default_error_handler(logger: Arc<dyn Logger>) -> ErrorHandler {
    Arc::new(move |job: &Job, err: &JobError| match err {
        JobError::Panicked {
            trace: Some(trace), ..
        } => {
            log_error!(logger, "[PANIC RECOVER] job {}: {}\n{}", job.id(), err, trace);
        }
        _ => log_error!(logger, "workerpool: job {} failed: {}", job.id(), err),
    })
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", self.id())
            .field("status", &self.status())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
