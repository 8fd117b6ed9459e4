//! Work dispatch onto a resizable set of worker tasks.
//!
//! The pool only needs three things from its executor: queue a unit of work,
//! add one worker bound to a stop signal, and drain everything on shutdown.
//! [`Dispatcher`] is that seam; [`TokioDispatcher`] is the implementation the
//! pool uses by default.
//!
//! ```text
//!  enqueue ──► [ bounded queue ] ──┬──► base worker        (lives until drain)
//!                                  ├──► worker (stop A)
//!                                  └──► worker (stop B)
//! ```
//!
//! Workers share one receiver. A stop signal is only observed between work
//! items, so a worker being stopped always finishes its current job first.

use crate::log::Logger;
use crate::pool::PoolError;
use crate::panic as panic_trace;
use crate::{log_debug, log_error, log_info};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A unit of work: for the pool, one job's `run()`.
pub type Work = BoxFuture<'static, ()>;

/// Executes queued work on a bounded set of concurrent workers.
pub trait Dispatcher: Send + Sync + 'static {
    /// Queues `work`, waiting while the queue is full.
    ///
    /// Fails with [`PoolError::ShutDown`] once the dispatcher is draining.
    fn enqueue(&self, work: Work) -> impl Future<Output = Result<(), PoolError>> + Send;

    /// Starts one more worker that exits when `stop` fires, after finishing
    /// whatever it is running.
    fn add_worker(&self, stop: CancellationToken);

    /// Stops accepting work, lets the workers finish everything already
    /// queued, and waits for all of them to exit.
    fn drain_and_stop(&self) -> impl Future<Output = ()> + Send;
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Work>>>;

/// [`Dispatcher`] backed by a bounded Tokio channel and spawned worker tasks.
pub struct TokioDispatcher {
    /// `None` once draining has started.
    sender: Mutex<Option<mpsc::Sender<Work>>>,
    receiver: SharedReceiver,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_worker: AtomicUsize,
    logger: Arc<dyn Logger>,
}

impl TokioDispatcher {
    /// Creates the dispatcher with its base worker.
    ///
    /// `capacity` bounds the work queue (minimum 1). Must be called within a
    /// Tokio runtime.
    pub fn new(capacity: usize, logger: Arc<dyn Logger>) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let dispatcher = Self {
            sender: Mutex::new(Some(sender)),
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            workers: Mutex::new(Vec::new()),
            next_worker: AtomicUsize::new(0),
            logger,
        };
        // The base worker is only stopped by draining.
        dispatcher.spawn_worker(CancellationToken::new());
        dispatcher
    }

    /// Number of worker tasks that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.workers
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    fn spawn_worker(&self, stop: CancellationToken) {
        let index = self.next_worker.fetch_add(1, Ordering::Relaxed);
        let receiver = Arc::clone(&self.receiver);
        let logger = Arc::clone(&self.logger);
        let handle = tokio::spawn(worker_loop(index, receiver, stop, logger));

        let mut workers = self.workers.lock();
        workers.retain(|handle| !handle.is_finished());
        workers.push(handle);
    }
}

async fn worker_loop(
    index: usize,
    receiver: SharedReceiver,
    stop: CancellationToken,
    logger: Arc<dyn Logger>,
) {
    log_info!(logger, "workerpool: worker {} started", index);
    loop {
        // Only the wait for work is interruptible; a running job is not.
        let next = tokio::select! {
            biased;
            _ = stop.cancelled() => None,
            work = recv(&receiver) => work,
        };
        let Some(work) = next else {
            break;
        };
        // A panicking work item must not take the worker down with it.
        if let Err(payload) = AssertUnwindSafe(work).catch_unwind().await {
            log_error!(
                logger,
                "[PANIC RECOVER] worker {}: work item panicked: {}",
                index,
                panic_trace::payload_message(&*payload)
            );
        }
    }
    log_info!(logger, "workerpool: worker {} stopped", index);
}

async fn recv(receiver: &SharedReceiver) -> Option<Work> {
    receiver.lock().await.recv().await
}

impl Dispatcher for TokioDispatcher {
    async fn enqueue(&self, work: Work) -> Result<(), PoolError> {
        let sender = self.sender.lock().clone().ok_or(PoolError::ShutDown)?;
        sender.send(work).await.map_err(|_| PoolError::ShutDown)
    }

    fn add_worker(&self, stop: CancellationToken) {
        if self.sender.lock().is_none() {
            log_debug!(self.logger, "workerpool: not adding a worker while draining");
            return;
        }
        self.spawn_worker(stop);
    }

    async fn drain_and_stop(&self) {
        // Workers see the channel close once the queue is empty.
        self.sender.lock().take();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            let _ = handle.await;
        }
    }
}

impl std::fmt::Debug for TokioDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioDispatcher")
            .field("live_workers", &self.live_workers())
            .field("draining", &self.sender.lock().is_none())
            .finish_non_exhaustive()
    }
}
