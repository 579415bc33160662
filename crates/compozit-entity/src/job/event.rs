//! Lifecycle events emitted after every accepted job mutation.

use serde::{Deserialize, Serialize};

use super::model::Job;

/// What happened to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    /// Accepted and placed on the dispatch channel.
    Queued,
    /// Claimed, progressed, or re-queued for retry.
    Updated,
    /// Finished successfully.
    Completed,
    /// Failed terminally.
    Failed,
    /// Cancelled by its owner.
    Cancelled,
}

/// A job lifecycle change together with the record as it stood afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Event kind.
    pub kind: JobEventKind,
    /// Snapshot of the job after the change.
    pub job: Job,
}

impl JobEvent {
    /// Create a new event.
    pub fn new(kind: JobEventKind, job: Job) -> Self {
        Self { kind, job }
    }
}

/// Receiver of job lifecycle events.
///
/// Publishing is fire-and-forget: implementations must not block and must
/// not call back into the job registry.
pub trait JobEventSink: Send + Sync + std::fmt::Debug {
    /// Publish one event.
    fn publish(&self, event: JobEvent);
}
