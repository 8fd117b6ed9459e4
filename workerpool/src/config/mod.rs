//! Pool configuration.
//!
//! [`PoolConfig`] holds the knobs a [`Pool`](crate::Pool) is created with.
//! It can be built in code or read from the `[pool]` section of an INI file:
//!
//! ```ini
//! [pool]
//! workers = 4
//! queue_capacity = 10000
//! cancel_queue_capacity = 500
//! record_metrics = true
//! ```
//!
//! Keys that are absent keep their default.
//!
//! ```
//! use workerpool::config::PoolConfig;
//!
//! let config = PoolConfig::default()
//!     .with_workers(4)
//!     .with_record_metrics(false);
//! assert_eq!(config.workers, 4);
//! ```

mod defaults;
mod file;
mod keys;
mod parser;
mod settings;

pub use defaults::{
    DEFAULT_CANCEL_QUEUE_CAPACITY, DEFAULT_QUEUE_CAPACITY, DEFAULT_RECORD_METRICS, DEFAULT_WORKERS,
};
pub use file::ConfigError;
pub use settings::PoolConfig;
