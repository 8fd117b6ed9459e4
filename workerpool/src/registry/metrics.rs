//! Job status counts.

use crate::job::JobStatus;
use serde::Serialize;
use std::fmt;

/// Snapshot of the registry's status buckets.
///
/// Every status is always present, zero included. Terminal counts keep
/// growing until [`Registry::reset_statuses`](super::Registry::reset_statuses)
/// is called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobsMetrics {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl JobsMetrics {
    pub(crate) fn from_counts(counts: [usize; 5]) -> Self {
        let [pending, running, completed, failed, cancelled] = counts;
        Self {
            pending,
            running,
            completed,
            failed,
            cancelled,
        }
    }

    pub fn get(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Running => self.running,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
            JobStatus::Cancelled => self.cancelled,
        }
    }

    /// Sum over all buckets.
    pub fn total(&self) -> usize {
        self.iter().map(|(_, count)| count).sum()
    }

    /// Iterates `(status, count)` pairs in lifecycle order.
    pub fn iter(&self) -> impl Iterator<Item = (JobStatus, usize)> + '_ {
        JobStatus::ALL
            .into_iter()
            .map(move |status| (status, self.get(status)))
    }
}

impl fmt::Display for JobsMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (status, count) in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{}={}", status, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_map_to_statuses() {
        let metrics = JobsMetrics::from_counts([1, 2, 3, 4, 5]);
        assert_eq!(metrics.get(JobStatus::Pending), 1);
        assert_eq!(metrics.get(JobStatus::Running), 2);
        assert_eq!(metrics.get(JobStatus::Completed), 3);
        assert_eq!(metrics.get(JobStatus::Failed), 4);
        assert_eq!(metrics.get(JobStatus::Cancelled), 5);
        assert_eq!(metrics.total(), 15);
    }

    #[test]
    fn test_display_lists_every_status() {
        let metrics = JobsMetrics {
            completed: 3,
            ..Default::default()
        };
        assert_eq!(
            metrics.to_string(),
            "pending=0 running=0 completed=3 failed=0 cancelled=0"
        );
    }

    #[test]
    fn test_serializes_all_fields() {
        let json = serde_json::to_value(JobsMetrics::default()).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 5);
        assert_eq!(object["cancelled"], 0);
    }
}
