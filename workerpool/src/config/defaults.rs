//! Default values for pool settings.

use super::settings::PoolConfig;

/// Workers a pool starts with: the dispatcher's base worker only.
pub const DEFAULT_WORKERS: usize = 1;

/// Jobs that can wait in the dispatch queue before `send` starts waiting.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Cancellation requests that can wait for the mediator.
pub const DEFAULT_CANCEL_QUEUE_CAPACITY: usize = 500;

pub const DEFAULT_RECORD_METRICS: bool = true;

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cancel_queue_capacity: DEFAULT_CANCEL_QUEUE_CAPACITY,
            record_metrics: DEFAULT_RECORD_METRICS,
        }
    }
}
