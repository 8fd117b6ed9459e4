//! Logging abstraction used by the pool, its registry and every job.
//!
//! Components hold an `Arc<dyn Logger>` and never talk to `tracing`
//! directly, so a pool can be silenced in tests or redirected at runtime.
//!
//! - [`Logger`]: the sink interface, plus the `log_*!` macros
//! - [`TracingLogger`]: default sink, forwards to the `tracing` crate
//! - [`NoOpLogger`]: discards everything
//! - [`SwappableLogger`]: indirection that lets [`Pool::set_logger`] replace
//!   the sink for components that were handed the pool's logger earlier
//!
//! ```
//! use std::sync::Arc;
//! use workerpool::log::{Logger, NoOpLogger};
//! use workerpool::log_info;
//!
//! let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
//! log_info!(logger, "workerpool: {} workers started", 4);
//! ```
//!
//! [`Pool::set_logger`]: crate::Pool::set_logger

mod noop;
mod swappable;
mod tracing_adapter;
mod r#trait;

pub use noop::NoOpLogger;
pub use r#trait::{LogLevel, Logger};
pub use swappable::SwappableLogger;
pub use tracing_adapter::TracingLogger;

#[cfg(test)]
pub(crate) use r#trait::test_support;
