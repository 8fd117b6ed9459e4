//! The pool settings struct.

/// Settings for a [`Pool`](crate::Pool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Target worker count. Values below 1 are treated as 1.
    pub workers: usize,
    /// Capacity of the dispatch queue.
    pub queue_capacity: usize,
    /// Capacity of the registry's cancellation queue.
    pub cancel_queue_capacity: usize,
    /// Whether status buckets are maintained from the start.
    pub record_metrics: bool,
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_cancel_queue_capacity(mut self, capacity: usize) -> Self {
        self.cancel_queue_capacity = capacity;
        self
    }

    pub fn with_record_metrics(mut self, enabled: bool) -> Self {
        self.record_metrics = enabled;
        self
    }
}
