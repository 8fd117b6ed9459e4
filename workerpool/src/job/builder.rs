//! Job construction and callback types.

use super::error::{CallbackError, JobError};
use super::status::JobStatus;
use super::Job;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Boxed future returned by the async pipeline callbacks.
pub type StageFuture = BoxFuture<'static, Result<(), CallbackError>>;

pub(crate) type StageFn = Arc<dyn Fn(Job) -> StageFuture + Send + Sync>;
pub(crate) type StatusHook =
    Arc<dyn Fn(&Job, JobStatus) -> Result<(), CallbackError> + Send + Sync>;
pub(crate) type ErrorHandler = Arc<dyn Fn(&Job, &JobError) + Send + Sync>;

fn stage_fn<F, Fut>(f: F) -> StageFn
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
{
    Arc::new(move |job| Box::pin(f(job)))
}

/// The callbacks a job was built with. Unset optional stages are skipped.
#[derive(Clone, Default)]
pub(crate) struct Callbacks {
    pub(crate) before: Option<StageFn>,
    pub(crate) action: Option<StageFn>,
    pub(crate) after: Option<StageFn>,
    pub(crate) cancel: Option<StageFn>,
    pub(crate) error_handler: Option<ErrorHandler>,
}

/// Builder for [`Job`].
///
/// Async stages receive a clone of the job handle, so they can read its id
/// or wait on [`Job::cancelled`].
///
/// ```
/// use workerpool::{Job, JobStatus};
///
/// let job = Job::builder()
///     .before(|_job| async { Ok(()) })
///     .action(|job| async move {
///         tokio::select! {
///             _ = job.cancelled() => Ok(()),
///             _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => Ok(()),
///         }
///     })
///     .on_status_change(|job, status| {
///         println!("{} is {}", job.id(), status);
///         Ok(())
///     })
///     .build();
/// assert_eq!(job.status(), JobStatus::Pending);
/// ```
#[derive(Default)]
pub struct JobBuilder {
    callbacks: Callbacks,
    on_status_change: Option<StatusHook>,
    cancellation_parent: Option<CancellationToken>,
}

impl JobBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs before the action. An error skips the action and fails the job.
    pub fn before<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        self.callbacks.before = Some(stage_fn(f));
        self
    }

    /// The job's work. Required: a job without an action fails at submission.
    ///
    /// Long-running actions should watch [`Job::cancelled`]; cancellation
    /// never interrupts an action that ignores it.
    pub fn action<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        self.callbacks.action = Some(stage_fn(f));
        self
    }

    /// Runs after a successful action.
    pub fn after<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        self.callbacks.after = Some(stage_fn(f));
        self
    }

    /// Runs when the job is cancelled, before its cancellation scope fires.
    pub fn on_cancel<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        self.callbacks.cancel = Some(stage_fn(f));
        self
    }

    /// Called after every status transition with the new status.
    ///
    /// Runs synchronously on the task driving the transition, so it should be
    /// quick. An error fails the job unless it already has an error.
    pub fn on_status_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&Job, JobStatus) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.on_status_change = Some(Arc::new(f));
        self
    }

    /// Receives every error the job produces, including ones that lost the
    /// race to be recorded. Defaults to logging through the pool's logger.
    pub fn error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&Job, &JobError) + Send + Sync + 'static,
    {
        self.callbacks.error_handler = Some(Arc::new(f));
        self
    }

    /// Derives the job's cancellation scope from `parent`: cancelling the
    /// parent cancels the job's scope too.
    pub fn cancellation_parent(mut self, parent: CancellationToken) -> Self {
        self.cancellation_parent = Some(parent);
        self
    }

    pub fn build(self) -> Job {
        Job::from_parts(
            self.callbacks,
            self.on_status_change,
            self.cancellation_parent,
        )
    }
}
