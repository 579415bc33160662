//! Job registry: the single owner of job record mutation.
//!
//! Every state change goes through a [`JobRegistry`] method that applies it
//! atomically for one job id. Callers only ever hold snapshots.

pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use compozit_core::result::AppResult;
use compozit_core::types::{JobId, UserId};
use compozit_entity::{Job, JobStatus, JobUpdate};

pub use memory::MemoryJobRegistry;

/// Result of an [`JobRegistry::update_status`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The update was applied; carries the new snapshot.
    Applied(Job),
    /// The update was not a legal transition and was dropped; carries the
    /// unchanged snapshot.
    Ignored(Job),
}

impl UpdateOutcome {
    /// Whether the update took effect.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The job snapshot, whichever way the update went.
    pub fn job(&self) -> &Job {
        match self {
            Self::Applied(job) | Self::Ignored(job) => job,
        }
    }
}

/// Result of recording a processing failure.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// The job is back to `queued`; `attempt` is the new `retry_count`.
    Retry {
        /// Retry number, starting at 1.
        attempt: u32,
        /// Snapshot after the change.
        job: Job,
    },
    /// Retries were exhausted and the job is now `failed`.
    Exhausted(Job),
    /// The job left `processing` meanwhile (e.g. was cancelled); nothing changed.
    Abandoned(Job),
}

/// Per-status counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Jobs waiting for a worker or a retry delay.
    pub queued: usize,
    /// Jobs currently executing.
    pub processing: usize,
    /// Jobs finished successfully.
    pub completed: usize,
    /// Jobs failed terminally.
    pub failed: usize,
    /// Jobs cancelled by their owner.
    pub cancelled: usize,
}

impl RegistryStats {
    /// Count one job.
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
    }

    /// Total number of jobs.
    pub fn total(&self) -> usize {
        self.queued + self.processing + self.completed + self.failed + self.cancelled
    }
}

/// Concurrent store of job records keyed by id, with a per-owner index.
///
/// Implementations must apply each method atomically per job id. A durable
/// store can be swapped in behind this trait without touching dispatch,
/// workers, or notification.
pub trait JobRegistry: Send + Sync + std::fmt::Debug {
    /// Store a new record. Fails with `Conflict` if the id already exists.
    fn insert(&self, job: Job) -> AppResult<()>;

    /// Point lookup.
    fn get(&self, id: &JobId) -> Option<Job>;

    /// Unordered snapshot of every job owned by `owner`.
    fn list_by_owner(&self, owner: &UserId) -> Vec<Job>;

    /// Compare-and-set of a job's mutable fields.
    ///
    /// Illegal transitions, including any mutation of a terminal job, are a
    /// no-op reported as [`UpdateOutcome::Ignored`].
    fn update_status(&self, id: &JobId, update: JobUpdate) -> AppResult<UpdateOutcome>;

    /// Move a `queued` or `processing` job to `cancelled`.
    ///
    /// Fails with `AlreadyTerminal` (record unchanged) for terminal jobs.
    fn cancel(&self, id: &JobId) -> AppResult<Job>;

    /// Record a processing failure and decide between retry and `failed`.
    fn schedule_retry(&self, id: &JobId, error: &str) -> AppResult<RetryDecision>;

    /// Force a non-terminal job to `failed`.
    fn fail(&self, id: &JobId, error: &str) -> AppResult<UpdateOutcome>;

    /// Per-status counts.
    fn stats(&self) -> RegistryStats;
}

/// Apply `update` to `job` in place. Returns `false` when the update is not
/// a legal transition, leaving `job` untouched.
///
/// `Queued` is never reachable through this path: re-queueing is reserved
/// for [`apply_retry`]. Leaving `Queued` for `Processing` requires a claiming
/// update; progress reports against a queued job are dropped.
pub fn apply_update(job: &mut Job, update: JobUpdate, now: DateTime<Utc>) -> bool {
    if update.status == JobStatus::Queued || !job.status.can_transition_to(update.status) {
        return false;
    }
    let claims = job.status == JobStatus::Queued && update.status == JobStatus::Processing;
    if claims && !update.claim {
        return false;
    }

    match update.status {
        JobStatus::Processing => {
            if job.status == JobStatus::Queued {
                job.progress = update.progress.unwrap_or(0).min(100);
                job.started_at.get_or_insert(now);
            } else if let Some(progress) = update.progress {
                // progress never moves backwards while processing
                job.progress = job.progress.max(progress.min(100));
            }
        }
        JobStatus::Completed => {
            job.progress = 100;
            job.result = update.result;
            job.error = None;
            job.last_error = None;
            job.completed_at = Some(now);
        }
        JobStatus::Failed => {
            job.result = None;
            job.error = update
                .error
                .or_else(|| job.last_error.take())
                .or_else(|| Some("unknown error".to_string()));
            job.last_error = None;
            job.completed_at = Some(now);
        }
        JobStatus::Cancelled => {
            job.completed_at = Some(now);
        }
        JobStatus::Queued => unreachable!("rejected above"),
    }

    job.status = update.status;
    job.updated_at = now;
    true
}

/// Apply failure bookkeeping for a job that was `processing`.
pub fn apply_retry(job: &mut Job, error: &str, now: DateTime<Utc>) -> RetryDecision {
    if job.status != JobStatus::Processing {
        return RetryDecision::Abandoned(job.clone());
    }

    if job.retry_count < job.max_retries {
        job.retry_count += 1;
        job.status = JobStatus::Queued;
        job.progress = 0;
        job.last_error = Some(error.to_string());
        job.updated_at = now;
        RetryDecision::Retry {
            attempt: job.retry_count,
            job: job.clone(),
        }
    } else {
        apply_update(job, JobUpdate::failed(error), now);
        RetryDecision::Exhausted(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use compozit_entity::{JobKind, NewJob};

    use super::*;

    fn queued_job(max_retries: u32) -> Job {
        Job::from_new(UserId::from("user-a"), NewJob::new(JobKind::QuickRender), max_retries)
    }

    #[test]
    fn test_claim_sets_started_at_once() {
        let mut job = queued_job(1);
        let first = Utc::now();
        assert!(apply_update(&mut job, JobUpdate::processing(), first));
        assert_eq!(job.started_at, Some(first));

        apply_retry(&mut job, "boom", Utc::now());
        assert!(apply_update(&mut job, JobUpdate::processing(), Utc::now()));
        assert_eq!(job.started_at, Some(first));
    }

    #[test]
    fn test_progress_is_monotone_while_processing() {
        let mut job = queued_job(0);
        apply_update(&mut job, JobUpdate::processing(), Utc::now());
        apply_update(&mut job, JobUpdate::progress(40), Utc::now());
        apply_update(&mut job, JobUpdate::progress(25), Utc::now());
        assert_eq!(job.progress, 40);
    }

    #[test]
    fn test_progress_does_not_claim_queued_job() {
        let mut job = queued_job(1);
        let snapshot = job.clone();

        assert!(!apply_update(&mut job, JobUpdate::progress(20), Utc::now()));
        assert_eq!(job, snapshot);

        apply_update(&mut job, JobUpdate::processing(), Utc::now());
        assert!(matches!(
            apply_retry(&mut job, "flaky", Utc::now()),
            RetryDecision::Retry { .. }
        ));
        assert!(!apply_update(&mut job, JobUpdate::progress(60), Utc::now()));
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
    }

    #[test]
    fn test_terminal_job_is_frozen() {
        let mut job = queued_job(0);
        apply_update(&mut job, JobUpdate::processing(), Utc::now());
        assert!(apply_update(&mut job, JobUpdate::completed(json!({"ok": true})), Utc::now()));
        let snapshot = job.clone();

        assert!(!apply_update(&mut job, JobUpdate::progress(10), Utc::now()));
        assert!(!apply_update(&mut job, JobUpdate::failed("late"), Utc::now()));
        assert_eq!(job, snapshot);
    }

    #[test]
    fn test_queued_cannot_jump_to_completed() {
        let mut job = queued_job(0);
        assert!(!apply_update(&mut job, JobUpdate::completed(json!({})), Utc::now()));
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn test_retry_until_exhausted() {
        let mut job = queued_job(2);
        for expected in 1..=2 {
            apply_update(&mut job, JobUpdate::processing(), Utc::now());
            apply_update(&mut job, JobUpdate::progress(50), Utc::now());
            match apply_retry(&mut job, "flaky", Utc::now()) {
                RetryDecision::Retry { attempt, job: snap } => {
                    assert_eq!(attempt, expected);
                    assert_eq!(snap.status, JobStatus::Queued);
                    assert_eq!(snap.progress, 0);
                    assert_eq!(snap.last_error.as_deref(), Some("flaky"));
                }
                other => panic!("expected retry, got {other:?}"),
            }
        }

        apply_update(&mut job, JobUpdate::processing(), Utc::now());
        match apply_retry(&mut job, "still flaky", Utc::now()) {
            RetryDecision::Exhausted(snap) => {
                assert_eq!(snap.status, JobStatus::Failed);
                assert_eq!(snap.retry_count, 2);
                assert_eq!(snap.error.as_deref(), Some("still flaky"));
                assert!(snap.completed_at.is_some());
            }
            other => panic!("expected exhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_retry_on_cancelled_job_is_abandoned() {
        let mut job = queued_job(3);
        apply_update(&mut job, JobUpdate::processing(), Utc::now());
        apply_update(&mut job, JobUpdate::cancelled(), Utc::now());
        assert!(matches!(
            apply_retry(&mut job, "boom", Utc::now()),
            RetryDecision::Abandoned(_)
        ));
        assert_eq!(job.retry_count, 0);
    }
}
