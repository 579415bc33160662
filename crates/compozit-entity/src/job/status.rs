//! Job status enumeration and its transition graph.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a job.
///
/// ```text
/// Queued --> Processing --> Completed
/// Processing --(retry)--> Queued
/// Processing --> Failed
/// Queued | Processing --> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the dispatch channel (or for a retry delay to elapse).
    Queued,
    /// Claimed by a worker and currently executing.
    Processing,
    /// Finished successfully.
    Completed,
    /// Failed after exhausting retries, or failed permanently.
    Failed,
    /// Cancelled by its owner.
    Cancelled,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if an owner may cancel a job in this state.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    ///
    /// `Processing -> Processing` is allowed for progress updates.
    /// `Queued -> Failed` covers a retry that could not be re-dispatched.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Queued, Processing | Cancelled | Failed) => true,
            (Processing, Processing | Completed | Failed | Queued | Cancelled) => true,
            _ => false,
        }
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    #[test]
    fn test_terminal_states_have_no_exit() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn test_queued_cannot_complete_directly() {
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Queued));
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("Cancelled".parse::<JobStatus>(), Ok(JobStatus::Cancelled));
        assert!("running".parse::<JobStatus>().is_err());
        assert_eq!(JobStatus::Processing.to_string(), "processing");
    }
}
