//! Job directory, status buckets and the cancellation mediator.
//!
//! The registry knows every job a pool has accepted that has not finished
//! yet. It hooks into each job's status changes to keep per-status buckets
//! current and to forget jobs once they reach a terminal status.
//!
//! Cancellation by id goes through a bounded queue served by a single
//! mediator task, so callers never block on a job's cancel callback or on the
//! pipeline unwinding. Requests are processed in the order they were made.

mod metrics;

pub use metrics::JobsMetrics;

use crate::job::{Job, JobId, JobStatus, StatusHook};
use crate::log::Logger;
use crate::pool::PoolError;
use crate::{log_debug, log_info};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

// =============================================================================
// Registry State
// =============================================================================

/// Directory and buckets share one lock so a status update is atomic with
/// respect to lookups and metrics snapshots.
struct RegistryState {
    jobs: HashMap<JobId, Job>,
    buckets: [HashSet<JobId>; 5],
    recording: bool,
}

impl RegistryState {
    fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            buckets: Default::default(),
            recording: true,
        }
    }

    fn update_status(&mut self, id: &JobId, status: JobStatus) {
        if status.is_terminal() {
            self.jobs.remove(id);
        }
        for bucket in &mut self.buckets {
            bucket.remove(id);
        }
        if self.recording {
            self.buckets[status.index()].insert(id.clone());
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Tracks the jobs of one pool. See the [module docs](self).
pub struct Registry {
    state: Arc<Mutex<RegistryState>>,
    cancel_tx: mpsc::Sender<JobId>,
    logger: Arc<dyn Logger>,
}

impl Registry {
    /// Creates a registry and starts its cancellation mediator.
    ///
    /// `cancel_capacity` bounds the cancellation queue; once full,
    /// [`cancel`](Self::cancel) waits. Must be called within a Tokio runtime.
    /// The mediator stops when the registry is dropped.
    pub fn new(cancel_capacity: usize, logger: Arc<dyn Logger>) -> Self {
        let state = Arc::new(Mutex::new(RegistryState::new()));
        let (cancel_tx, cancel_rx) = mpsc::channel(cancel_capacity.max(1));

        tokio::spawn(mediate(cancel_rx, Arc::clone(&state), Arc::clone(&logger)));

        Self {
            state,
            cancel_tx,
            logger,
        }
    }

    /// Registers an initialized job and returns its id.
    ///
    /// Wraps the job's status hook so every later transition is logged and
    /// reflected in the buckets after the user hook has run. The wrapper only
    /// holds a weak reference to the registry, so a job outliving its pool
    /// keeps working without keeping the registry alive.
    pub fn add(&self, job: &Job) -> JobId {
        let id = job.id().clone();
        let mut state = self.state.lock();

        let weak = Arc::downgrade(&self.state);
        let logger = Arc::clone(&self.logger);
        let hook_id = id.clone();
        job.wrap_status_hook(move |user_hook| -> StatusHook {
            Arc::new(move |job: &Job, status: JobStatus| {
                log_debug!(logger, "workerpool: job {} is {}", hook_id, status);
                let outcome = match &user_hook {
                    Some(hook) => std::panic::catch_unwind(AssertUnwindSafe(|| hook(job, status))),
                    None => Ok(Ok(())),
                };
                record_transition(&weak, &hook_id, status);
                match outcome {
                    Ok(result) => result,
                    Err(payload) => std::panic::resume_unwind(payload),
                }
            })
        });

        let status = job.status();
        if !status.is_terminal() {
            state.jobs.insert(id.clone(), job.clone());
        }
        state.update_status(&id, status);
        id
    }

    /// Returns the job, or `None` if it is unknown or already finished.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.state.lock().jobs.get(id).cloned()
    }

    /// Queues the job for cancellation by the mediator.
    ///
    /// Returns once the request is queued, not once the job is cancelled.
    /// Waits while the queue is full. Unknown ids are ignored by the mediator.
    pub async fn cancel(&self, id: &JobId) -> Result<(), PoolError> {
        self.cancel_tx
            .send(id.clone())
            .await
            .map_err(|_| PoolError::ShutDown)
    }

    /// Enables or disables status bucket accounting.
    ///
    /// Finished jobs leave the directory either way.
    pub fn set_status_recording(&self, enabled: bool) {
        self.state.lock().recording = enabled;
    }

    /// Snapshot of the bucket sizes.
    pub fn statuses(&self) -> JobsMetrics {
        let state = self.state.lock();
        JobsMetrics::from_counts(std::array::from_fn(|i| state.buckets[i].len()))
    }

    /// Forgets the ids held in the terminal buckets.
    pub fn reset_statuses(&self) {
        let mut state = self.state.lock();
        for status in JobStatus::ALL.into_iter().filter(JobStatus::is_terminal) {
            state.buckets[status.index()].clear();
        }
    }

    /// Number of jobs still tracked in the directory.
    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn record_transition(state: &Weak<Mutex<RegistryState>>, id: &JobId, status: JobStatus) {
    if let Some(state) = state.upgrade() {
        state.lock().update_status(id, status);
    }
}

/// Serves cancellation requests one at a time, in order.
async fn mediate(
    mut cancel_rx: mpsc::Receiver<JobId>,
    state: Arc<Mutex<RegistryState>>,
    logger: Arc<dyn Logger>,
) {
    while let Some(id) = cancel_rx.recv().await {
        let job = state.lock().jobs.get(&id).cloned();
        let Some(job) = job else {
            log_debug!(logger, "workerpool: cancel ignored, job {} not found", id);
            continue;
        };
        log_info!(logger, "workerpool: Canceling job {}", id);
        job.cancel().await;
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Registry")
            .field("jobs", &state.jobs.len())
            .field("recording", &state.recording)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::CallbackError;
    use crate::log::test_support::RecordingLogger;
    use crate::log::{LogLevel, NoOpLogger};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn registry() -> Registry {
        Registry::new(8, Arc::new(NoOpLogger))
    }

    fn submitted(registry: &Registry, job: &Job) -> JobId {
        job.init(Arc::new(NoOpLogger)).unwrap();
        registry.add(job)
    }

    async fn wait_for(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_add_registers_pending_job() {
        let registry = registry();
        let job = Job::new(|_| async { Ok(()) });

        let id = submitted(&registry, &job);

        assert!(Job::ptr_eq(&registry.get(&id).unwrap(), &job));
        assert_eq!(registry.statuses().pending, 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_finished_job_is_evicted_but_counted() {
        let registry = registry();
        let job = Job::new(|_| async { Ok(()) });
        let id = submitted(&registry, &job);

        job.run().await;

        assert!(registry.get(&id).is_none());
        assert_eq!(job.status(), JobStatus::Completed);
        let metrics = registry.statuses();
        assert_eq!(metrics.completed, 1);
        assert_eq!(metrics.pending + metrics.running, 0);
    }

    #[tokio::test]
    async fn test_failed_at_init_is_never_in_directory() {
        let registry = registry();
        let job = Job::builder().build();

        let id = submitted(&registry, &job);

        assert!(registry.get(&id).is_none());
        assert_eq!(registry.statuses().failed, 1);
    }

    #[tokio::test]
    async fn test_user_hook_runs_before_bucket_update() {
        let registry = Arc::new(registry());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (probe, sink) = (Arc::clone(&registry), Arc::clone(&seen));
        let job = Job::builder()
            .action(|_| async { Ok(()) })
            .on_status_change(move |job, status| {
                // The registry still reports the previous status here.
                let tracked = probe.get(job.id()).is_some();
                sink.lock().push((status, tracked));
                Ok(())
            })
            .build();
        submitted(&registry, &job);

        job.run().await;

        assert_eq!(
            *seen.lock(),
            vec![
                (JobStatus::Pending, false),
                (JobStatus::Running, true),
                (JobStatus::Completed, true),
            ]
        );
    }

    #[tokio::test]
    async fn test_user_hook_panic_still_updates_buckets() {
        let registry = registry();
        let job = Job::builder()
            .action(|_| async { Ok(()) })
            .on_status_change(|_, status| {
                if status == JobStatus::Running {
                    panic!("hook exploded");
                }
                Ok(())
            })
            .build();
        let id = submitted(&registry, &job);

        job.run().await;

        assert_eq!(job.status(), JobStatus::Failed);
        assert!(job.error().unwrap().is_panic());
        assert!(registry.get(&id).is_none());
        assert_eq!(registry.statuses().failed, 1);
        assert_eq!(registry.statuses().running, 0);
    }

    #[tokio::test]
    async fn test_recording_disabled_still_evicts() {
        let registry = registry();
        registry.set_status_recording(false);
        let job = Job::new(|_| async { Ok(()) });
        let id = submitted(&registry, &job);

        job.run().await;

        assert!(registry.get(&id).is_none());
        assert_eq!(registry.statuses().total(), 0);
    }

    #[tokio::test]
    async fn test_each_id_in_at_most_one_bucket() {
        let registry = registry();
        let jobs: Vec<Job> = (0..4).map(|_| Job::new(|_| async { Ok(()) })).collect();
        for job in &jobs {
            submitted(&registry, job);
        }
        jobs[0].run().await;
        jobs[1].run().await;

        let metrics = registry.statuses();
        assert_eq!(metrics.total(), 4);
        assert_eq!(metrics.pending, 2);
        assert_eq!(metrics.completed, 2);
    }

    #[tokio::test]
    async fn test_reset_statuses_clears_terminal_buckets() {
        let registry = registry();
        let done = Job::new(|_| async { Ok(()) });
        let failed = Job::new(|_| async { Err(CallbackError::from("no")) });
        let waiting = Job::new(|_| async { Ok(()) });
        for job in [&done, &failed, &waiting] {
            submitted(&registry, job);
        }
        done.run().await;
        failed.run().await;

        registry.reset_statuses();

        let metrics = registry.statuses();
        assert_eq!(metrics.completed + metrics.failed + metrics.cancelled, 0);
        assert_eq!(metrics.pending, 1);
    }

    #[tokio::test]
    async fn test_cancel_through_mediator() {
        let logger = Arc::new(RecordingLogger::default());
        let registry = Registry::new(8, logger.clone());
        let job = Job::new(|job| async move {
            job.cancelled().await;
            Ok(())
        });
        let id = submitted(&registry, &job);
        let runner = job.clone();
        let run = tokio::spawn(async move { runner.run().await });
        wait_for(|| job.status() == JobStatus::Running).await;

        registry.cancel(&id).await.unwrap();
        wait_for(|| job.status() == JobStatus::Cancelled).await;

        run.await.unwrap();
        assert!(registry.get(&id).is_none());
        assert_eq!(registry.statuses().cancelled, 1);
        assert!(logger.contains(LogLevel::Info, "Canceling job"));
    }

    #[tokio::test]
    async fn test_cancel_unknown_id_is_ignored() {
        let registry = registry();
        registry.cancel(&JobId::from("nope")).await.unwrap();

        // The mediator keeps serving requests afterwards.
        let job = Job::new(|_| async { Ok(()) });
        let id = submitted(&registry, &job);
        registry.cancel(&id).await.unwrap();
        wait_for(|| job.status() == JobStatus::Cancelled).await;
    }

    #[tokio::test]
    async fn test_full_cancel_queue_blocks_callers() {
        let registry = Registry::new(1, Arc::new(NoOpLogger));
        let release = CancellationToken::new();
        let gate = release.clone();
        // Ignores its cancellation scope until released.
        let stubborn = Job::new(move |_| {
            let gate = gate.clone();
            async move {
                gate.cancelled().await;
                Ok(())
            }
        });
        let stubborn_id = submitted(&registry, &stubborn);
        let runner = stubborn.clone();
        let run = tokio::spawn(async move { runner.run().await });
        wait_for(|| stubborn.status() == JobStatus::Running).await;

        registry.cancel(&stubborn_id).await.unwrap();
        // The mediator has taken the request and waits on the pipeline.
        wait_for(|| stubborn.is_cancelled()).await;

        let queued = Job::new(|_| async { Ok(()) });
        let blocked = Job::new(|_| async { Ok(()) });
        let queued_id = submitted(&registry, &queued);
        let blocked_id = submitted(&registry, &blocked);
        registry.cancel(&queued_id).await.unwrap();

        let third = tokio::time::timeout(
            Duration::from_millis(50),
            registry.cancel(&blocked_id),
        );
        assert!(third.await.is_err(), "cancel returned while the queue was full");

        release.cancel();
        tokio::time::timeout(Duration::from_secs(5), registry.cancel(&blocked_id))
            .await
            .expect("queue never drained")
            .unwrap();
        wait_for(|| blocked.status() == JobStatus::Cancelled).await;
        run.await.unwrap();
        assert_eq!(stubborn.status(), JobStatus::Cancelled);
        assert_eq!(queued.status(), JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_requests_served_in_order() {
        let registry = registry();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let jobs: Vec<Job> = (0..5)
            .map(|i| {
                let sink = Arc::clone(&order);
                Job::builder()
                    .action(|_| async { Ok(()) })
                    .on_cancel(move |_| {
                        sink.lock().push(i);
                        async { Ok(()) }
                    })
                    .build()
            })
            .collect();
        let ids: Vec<JobId> = jobs.iter().map(|job| submitted(&registry, job)).collect();

        // Request order differs from submission order.
        for id in ids.iter().rev() {
            registry.cancel(id).await.unwrap();
        }
        wait_for(|| {
            jobs.iter()
                .all(|job| job.status() == JobStatus::Cancelled)
        })
        .await;

        assert_eq!(*order.lock(), vec![4, 3, 2, 1, 0]);
    }
}
