//! INI section and key names.

pub(super) const SECTION: &str = "pool";

pub(super) const WORKERS: &str = "workers";
pub(super) const QUEUE_CAPACITY: &str = "queue_capacity";
pub(super) const CANCEL_QUEUE_CAPACITY: &str = "cancel_queue_capacity";
pub(super) const RECORD_METRICS: &str = "record_metrics";
