//! workerpool - an in-process pool of asynchronous jobs
//!
//! Jobs are built from async callbacks and submitted to a [`Pool`], which
//! runs them on a resizable set of Tokio worker tasks. Each job moves through
//! a small state machine, can be cancelled cooperatively by id, and contains
//! its own panics. The pool keeps per-status counts of the jobs it has seen.
//!
//! # Overview
//!
//! - [`job`]: the [`Job`] handle, its builder, statuses and errors
//! - [`registry`]: job lookup by id, status buckets, cancellation mediator
//! - [`dispatcher`]: the [`Dispatcher`] seam and its Tokio implementation
//! - [`pool`]: submission, resizing, shutdown and metrics
//! - [`config`]: [`PoolConfig`] and its INI representation
//! - [`log`] / [`logging`]: logger abstraction and `tracing` setup
//! - [`panic`]: stack trace capture for recovered panics
//!
//! # Example
//!
//! ```no_run
//! use workerpool::{Job, Pool, PoolConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), workerpool::PoolError> {
//!     let pool = Pool::new(PoolConfig::default().with_workers(4));
//!
//!     let job = Job::builder()
//!         .action(|job| async move {
//!             tokio::select! {
//!                 _ = job.cancelled() => {}
//!                 _ = tokio::time::sleep(std::time::Duration::from_secs(30)) => {}
//!             }
//!             Ok(())
//!         })
//!         .on_status_change(|job, status| {
//!             println!("job {} is {}", job.id(), status);
//!             Ok(())
//!         })
//!         .build();
//!
//!     let id = pool.send(&job).await?;
//!     pool.cancel_job(&id).await?;
//!
//!     pool.shutdown().await;
//!     println!("final: {}", job.status());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod job;
pub mod log;
pub mod logging;
pub mod panic;
pub mod pool;
pub mod registry;

pub use config::{ConfigError, PoolConfig};
pub use dispatcher::{Dispatcher, TokioDispatcher, Work};
pub use job::{CallbackError, Job, JobBuilder, JobError, JobId, JobStatus, Stage, StageFuture};
pub use pool::{Pool, PoolError};
pub use registry::{JobsMetrics, Registry};

/// Version of the workerpool library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
