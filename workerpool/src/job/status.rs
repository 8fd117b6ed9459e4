//! Job status and its transition table.

use serde::Serialize;
use std::fmt;

/// Lifecycle status of a job.
///
/// ```text
///            ┌──────────► Cancelled ◄──────────┐
///            │                                 │
/// (init) ─► Pending ───────────────────────► Running ─► Completed
///   │        │                                 │
///   └────────┴──► Failed ◄─────────────────────┘
/// ```
///
/// `Pending -> Failed` only happens for jobs rejected at initialization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Initialized and queued, waiting for a worker.
    #[default]
    Pending,
    /// The pipeline is executing.
    Running,
    /// Every stage returned `Ok`.
    Completed,
    /// A stage returned an error or panicked, or the job was misconfigured.
    Failed,
    /// Cancelled through [`Job::cancel`](crate::Job::cancel).
    Cancelled,
}

impl JobStatus {
    /// All statuses, in pipeline order.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// Returns true for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true while the job still occupies the registry directory.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns whether a job may move from `self` to `next`.
    ///
    /// Terminal statuses have no outgoing transitions.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    /// Lowercase name, as used in logs and serialized metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Running.is_active());
    }

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Cancelled));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Cancelled));
    }

    #[test]
    fn test_backward_and_terminal_transitions_rejected() {
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Running));
        for terminal in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            for next in JobStatus::ALL {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_index_matches_all_order() {
        for (i, status) in JobStatus::ALL.iter().enumerate() {
            assert_eq!(status.index(), i);
        }
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(JobStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(JobStatus::default(), JobStatus::Pending);
    }
}
