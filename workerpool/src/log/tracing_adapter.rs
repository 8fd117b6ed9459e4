//! Adapter from [`Logger`] to the `tracing` crate.

use crate::log::{LogLevel, Logger};
use std::fmt::Arguments;

/// Default pool logger: every message becomes a `tracing` event under the
/// `workerpool` target, so subscribers can filter it with
/// `RUST_LOG=workerpool=debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "workerpool", "{}", args),
            LogLevel::Debug => tracing::debug!(target: "workerpool", "{}", args),
            LogLevel::Info => tracing::info!(target: "workerpool", "{}", args),
            LogLevel::Warn => tracing::warn!(target: "workerpool", "{}", args),
            LogLevel::Error => tracing::error!(target: "workerpool", "{}", args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_logger_without_subscriber() {
        // No subscriber installed: events are dropped without panicking.
        let logger: Box<dyn Logger> = Box::new(TracingLogger::new());
        logger.info(format_args!("job started"));
        logger.error(format_args!("job failed"));
    }
}
