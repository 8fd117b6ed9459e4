//! Panic trace capture for job recovery boundaries.
//!
//! A recovered panic payload carries only a message; the stack it unwound
//! from is gone by the time `catch_unwind` returns. This module installs a
//! process-wide panic hook that records the panic location and a backtrace in
//! a thread-local slot while the stack is still intact. The job's recovery
//! boundary runs on the same thread right after unwinding and takes the
//! trace with [`take_trace`].
//!
//! The hook chains to whatever hook was installed before it, so default
//! panic output (or an application's own hook) is preserved.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, PanicHookInfo};
use std::sync::Once;

static INSTALL: Once = Once::new();

thread_local! {
    static LAST_TRACE: RefCell<Option<PanicTrace>> = const { RefCell::new(None) };
}

/// Where a panic happened and the stack that led there.
#[derive(Debug, Clone)]
pub struct PanicTrace {
    /// `file:line:column` of the panic, when the runtime reports it.
    pub location: Option<String>,
    /// Rendered backtrace captured inside the panic hook.
    pub backtrace: String,
}

impl fmt::Display for PanicTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            writeln!(f, "at {}", location)?;
        }
        f.write_str(&self.backtrace)
    }
}

/// Installs the trace-recording panic hook.
///
/// Safe to call any number of times; only the first call installs the hook.
/// [`Pool::new`](crate::Pool::new) and [`Job::init`](crate::Job::init) call it.
pub fn init() {
    INSTALL.call_once(|| {
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            record(info);
            original_hook(info);
        }));
    });
}

/// Takes the trace of the most recent panic on the current thread.
pub fn take_trace() -> Option<PanicTrace> {
    LAST_TRACE.with(|slot| slot.borrow_mut().take())
}

/// Renders a `catch_unwind` payload as text.
///
/// `panic!` produces `&'static str` or `String` payloads; `panic_any` with an
/// error value is rendered through its `Display`.
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(err) = payload.downcast_ref::<Box<dyn std::error::Error + Send + Sync>>() {
        err.to_string()
    } else {
        "panic with non-string payload".to_string()
    }
}

fn record(info: &PanicHookInfo<'_>) {
    let location = info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
    let trace = PanicTrace {
        location,
        backtrace: Backtrace::force_capture().to_string(),
    };
    // try_with: the slot may already be destroyed during thread teardown.
    let _ = LAST_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_records_trace_for_caught_panic() {
        init();
        let _ = take_trace();

        let result = panic::catch_unwind(|| {
            panic!("boom");
        });
        let payload = result.unwrap_err();

        assert_eq!(payload_message(&*payload), "boom");
        let trace = take_trace().expect("trace should be recorded");
        assert!(trace.location.unwrap().contains("panic.rs"));
        assert!(!trace.backtrace.is_empty());
        // Taking clears the slot.
        assert!(take_trace().is_none());
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        let result = panic::catch_unwind(|| {
            panic!("{}", String::from("formatted"));
        });
        assert_eq!(payload_message(&*result.unwrap_err()), "formatted");
        assert!(take_trace().is_some());
    }

    #[test]
    fn test_payload_message_non_string() {
        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(
            payload_message(&*payload),
            "panic with non-string payload"
        );
    }
}
