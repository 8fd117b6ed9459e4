//! Job error taxonomy.

use crate::panic::PanicTrace;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error type returned by user callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pipeline stage (or hook) that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Before,
    Action,
    After,
    /// The job's cancel callback.
    Cancel,
    /// The `on_status_change` hook.
    StatusChange,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::Action => "action",
            Self::After => "after",
            Self::Cancel => "cancel",
            Self::StatusChange => "status change",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job failed, or why a job operation was refused.
///
/// The error recorded on a job is the first one that occurred; later errors
/// only reach the job's error handler.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// The job was submitted without an action.
    #[error("action function is not defined")]
    ActionNotDefined,

    /// A callback returned an error.
    #[error("{stage} callback failed: {source}")]
    Callback {
        stage: Stage,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A callback panicked; the panic was contained at the job boundary.
    #[error("{stage} callback panicked: {message}")]
    Panicked {
        stage: Stage,
        message: String,
        trace: Option<Arc<PanicTrace>>,
    },

    /// The pipeline task was torn down before finishing, e.g. because the
    /// runtime shut down underneath it.
    #[error("job pipeline was aborted")]
    Aborted,

    /// `init` or `set_cancellation_parent` was called on an initialized job.
    #[error("job is already initialized")]
    AlreadyInitialized,
}

impl JobError {
    pub(crate) fn callback(stage: Stage, source: CallbackError) -> Self {
        Self::Callback {
            stage,
            source: Arc::from(source),
        }
    }

    /// Returns the stage that failed, if the error came from a callback.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Callback { stage, .. } | Self::Panicked { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_callback_error_keeps_source() {
        let err = JobError::callback(Stage::After, "42".into());
        assert_eq!(err.to_string(), "after callback failed: 42");
        assert_eq!(err.stage(), Some(Stage::After));
        assert_eq!(err.source().map(|s| s.to_string()), Some("42".to_string()));
        assert!(!err.is_panic());
    }

    #[test]
    fn test_panicked_display() {
        let err = JobError::Panicked {
            stage: Stage::Action,
            message: "index out of bounds".to_string(),
            trace: None,
        };
        assert_eq!(
            err.to_string(),
            "action callback panicked: index out of bounds"
        );
        assert!(err.is_panic());
    }

    #[test]
    fn test_configuration_error_has_no_stage() {
        assert_eq!(JobError::ActionNotDefined.stage(), None);
        assert_eq!(
            JobError::ActionNotDefined.to_string(),
            "action function is not defined"
        );
    }
}
