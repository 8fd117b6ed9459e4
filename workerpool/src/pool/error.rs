//! Pool-level errors.

use crate::job::JobError;
use thiserror::Error;

/// Why the pool refused a request.
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    /// The pool was shut down, or its cancellation mediator is gone.
    #[error("worker pool is shut down")]
    ShutDown,

    /// The submitted job could not be initialized.
    #[error(transparent)]
    Job(#[from] JobError),
}
