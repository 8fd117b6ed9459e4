//! Logger indirection that can be re-pointed at runtime.

use crate::log::{LogLevel, Logger, TracingLogger};
use parking_lot::RwLock;
use std::fmt::{self, Arguments};
use std::sync::Arc;

/// A [`Logger`] that forwards to a replaceable inner logger.
///
/// The pool hands an `Arc` of this to its registry and dispatcher, so
/// swapping the inner sink redirects all of them at once.
pub struct SwappableLogger {
    inner: RwLock<Arc<dyn Logger>>,
}

impl SwappableLogger {
    pub fn new(initial: Arc<dyn Logger>) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    /// Replaces the inner logger. Messages already being written finish on
    /// the previous one.
    pub fn swap(&self, logger: Arc<dyn Logger>) {
        *self.inner.write() = logger;
    }

    /// Returns the logger currently receiving messages.
    pub fn current(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.inner.read())
    }
}

impl Default for SwappableLogger {
    fn default() -> Self {
        Self::new(Arc::new(TracingLogger))
    }
}

impl Logger for SwappableLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        self.inner.read().log(level, args);
    }
}

impl fmt::Debug for SwappableLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwappableLogger").finish_non_exhaustive()
    }
}
