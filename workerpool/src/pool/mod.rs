//! The worker pool: job submission, worker-count control and shutdown.
//!
//! A [`Pool`] owns a [`Dispatcher`] (which runs the jobs) and a [`Registry`]
//! (which tracks them). It starts with the dispatcher's single base worker;
//! [`Pool::set_pool_size`] adds or removes extra workers at runtime.
//!
//! ```no_run
//! use workerpool::{Job, Pool, PoolConfig};
//!
//! # async fn example() -> Result<(), workerpool::PoolError> {
//! let pool = Pool::new(PoolConfig::default().with_workers(4));
//!
//! let job = Job::new(|_job| async { Ok(()) });
//! let id = pool.send(&job).await?;
//!
//! println!("{} is {:?}", id, pool.get_job_status(&id));
//! println!("{}", pool.jobs_metrics());
//!
//! pool.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::PoolError;

use crate::config::PoolConfig;
use crate::dispatcher::{Dispatcher, TokioDispatcher};
use crate::job::{Job, JobId, JobStatus};
use crate::log::{Logger, SwappableLogger};
use crate::registry::{JobsMetrics, Registry};
use crate::{log_debug, log_info};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One worker beyond the base worker, revocable through its stop signal.
#[derive(Debug)]
struct ResizeSlot {
    stop: CancellationToken,
}

/// An in-process pool of asynchronous jobs. See the [module docs](self).
pub struct Pool<D: Dispatcher = TokioDispatcher> {
    logger: Arc<SwappableLogger>,
    registry: Registry,
    dispatcher: D,
    /// Also serializes resizing and shutdown.
    slots: Mutex<Vec<ResizeSlot>>,
    shut_down: AtomicBool,
}

impl Pool {
    /// Creates a pool logging through `tracing`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(config: PoolConfig) -> Self {
        Self::with_logger(config, Arc::new(crate::log::TracingLogger))
    }

    /// Creates a pool logging through `logger`.
    pub fn with_logger(config: PoolConfig, logger: Arc<dyn Logger>) -> Self {
        let logger = Arc::new(SwappableLogger::new(logger));
        let dispatcher = TokioDispatcher::new(config.queue_capacity, logger.clone());
        Self::assemble(config, dispatcher, logger)
    }
}

impl<D: Dispatcher> Pool<D> {
    /// Creates a pool running its jobs on `dispatcher`.
    pub fn with_dispatcher(config: PoolConfig, dispatcher: D) -> Self {
        Self::assemble(config, dispatcher, Arc::new(SwappableLogger::default()))
    }

    fn assemble(config: PoolConfig, dispatcher: D, logger: Arc<SwappableLogger>) -> Self {
        crate::panic::init();

        let registry = Registry::new(config.cancel_queue_capacity, logger.clone());
        registry.set_status_recording(config.record_metrics);

        let pool = Self {
            logger,
            registry,
            dispatcher,
            slots: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        };
        if config.workers > 1 {
            pool.set_pool_size(config.workers);
        }
        pool
    }

    /// Initializes `job`, registers it and queues it for execution.
    ///
    /// Returns the job's id without waiting for it to run. Waits only while
    /// the dispatch queue is full. A job without an action is accepted and
    /// immediately `Failed`.
    ///
    /// # Errors
    ///
    /// [`PoolError::ShutDown`] after [`shutdown`](Self::shutdown); the job is
    /// then cancelled. [`PoolError::Job`] if the job was already submitted.
    pub async fn send(&self, job: &Job) -> Result<JobId, PoolError> {
        if self.is_shut_down() {
            return Err(PoolError::ShutDown);
        }

        job.init(self.logger.current())?;
        let id = self.registry.add(job);

        let runner = job.clone();
        let queued = self
            .dispatcher
            .enqueue(Box::pin(async move { runner.run().await }))
            .await;
        if let Err(err) = queued {
            log_debug!(self.logger, "workerpool: job {} rejected: {}", id, err);
            job.cancel().await;
            return Err(err);
        }
        Ok(id)
    }

    /// Returns the job, or `None` if it is unknown or already finished.
    pub fn get_job(&self, id: &JobId) -> Option<Job> {
        self.registry.get(id)
    }

    /// Status of a job that has not finished yet.
    ///
    /// Finished jobs are no longer tracked; keep the [`Job`] handle to read
    /// their final status.
    pub fn get_job_status(&self, id: &JobId) -> Option<JobStatus> {
        self.registry.get(id).map(|job| job.status())
    }

    /// Requests cancellation of a job. Returns once the request is queued.
    pub async fn cancel_job(&self, id: &JobId) -> Result<(), PoolError> {
        self.registry.cancel(id).await
    }

    /// Number of workers: the base worker plus the resize slots.
    pub fn pool_size(&self) -> usize {
        self.slots.lock().len() + 1
    }

    /// Sets the absolute number of workers (minimum 1).
    ///
    /// Growing starts new workers right away. Shrinking signals the extra
    /// workers to stop; each finishes its current job first, so the count
    /// reported by [`pool_size`](Self::pool_size) drops before they have
    /// actually exited. Ignored after shutdown.
    pub fn set_pool_size(&self, n: usize) {
        let target = n.max(1);
        let mut slots = self.slots.lock();
        if self.is_shut_down() {
            log_debug!(self.logger, "workerpool: resize ignored after shutdown");
            return;
        }

        let current = slots.len() + 1;
        if target < current {
            for slot in slots.drain(target - 1..) {
                slot.stop.cancel();
                log_info!(self.logger, "workerpool: a worker has been stopped");
            }
        } else {
            for _ in current..target {
                let stop = CancellationToken::new();
                self.dispatcher.add_worker(stop.clone());
                slots.push(ResizeSlot { stop });
                log_info!(self.logger, "workerpool: a worker has been started");
            }
        }
    }

    /// Stops accepting jobs and waits until every queued and running job has
    /// finished. Further calls return immediately.
    pub async fn shutdown(&self) {
        {
            let _slots = self.slots.lock();
            if self.shut_down.swap(true, Ordering::SeqCst) {
                return;
            }
        }
        log_info!(self.logger, "workerpool: shutting down");

        self.dispatcher.drain_and_stop().await;
        self.slots.lock().clear();

        log_info!(self.logger, "workerpool: gracefully shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Turns status bucket accounting on or off.
    pub fn record_jobs_metrics(&self, enabled: bool) {
        self.registry.set_status_recording(enabled);
    }

    pub fn jobs_metrics(&self) -> JobsMetrics {
        self.registry.statuses()
    }

    /// Drops the ids counted in the completed, failed and cancelled buckets.
    pub fn reset_jobs_metrics(&self) {
        self.registry.reset_statuses();
    }

    /// Redirects the pool's logging, including the registry and dispatcher.
    ///
    /// Jobs initialized before the call keep the logger they were given.
    pub fn set_logger(&self, logger: Arc<dyn Logger>) {
        self.logger.swap(logger);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }
}

impl<D: Dispatcher> std::fmt::Debug for Pool<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("pool_size", &self.pool_size())
            .field("shut_down", &self.is_shut_down())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
