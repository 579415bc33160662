//! Job queue facade: the entry point request handlers and processors use.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing;

use compozit_core::config::WorkerConfig;
use compozit_core::error::AppError;
use compozit_core::result::AppResult;
use compozit_core::types::{JobId, UserId};
use compozit_entity::{Job, JobEvent, JobEventKind, JobEventSink, JobStatus, JobUpdate, NewJob};

use crate::dispatch::{DispatchError, DispatchSender};
use crate::inflight::InFlightJobs;
use crate::processor::ProcessorRegistry;
use crate::registry::{JobRegistry, RegistryStats, UpdateOutcome};

/// Listing filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
    /// Only jobs in this status.
    pub status: Option<JobStatus>,
    /// Page size, capped by `worker.list_limit_max`.
    pub limit: Option<usize>,
}

/// Queue statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    /// Counts per status
    pub jobs: RegistryStats,
    /// Ids waiting on the dispatch channel
    pub depth: usize,
    /// Dispatch channel capacity
    pub capacity: usize,
    /// Jobs currently held by a worker
    pub in_flight: usize,
}

/// Submits, reads, updates, and cancels jobs.
///
/// Every mutation goes through the registry; an event is published only
/// after the registry call has returned and the change was applied.
#[derive(Debug)]
pub struct JobQueue {
    registry: Arc<dyn JobRegistry>,
    dispatch: DispatchSender,
    events: Arc<dyn JobEventSink>,
    inflight: Arc<InFlightJobs>,
    processors: Arc<ProcessorRegistry>,
    config: WorkerConfig,
}

impl JobQueue {
    /// Create a new job queue
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        dispatch: DispatchSender,
        events: Arc<dyn JobEventSink>,
        inflight: Arc<InFlightJobs>,
        processors: Arc<ProcessorRegistry>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            registry,
            dispatch,
            events,
            inflight,
            processors,
            config,
        }
    }

    /// Accept a new job for `owner` and hand it to the worker pool.
    ///
    /// A full dispatch channel rejects the submission with `QueueFull`
    /// before anything is stored.
    pub fn submit(&self, owner: &UserId, new: NewJob) -> AppResult<Job> {
        self.validate(owner, &new)?;

        let permit = self.dispatch.try_reserve().map_err(|e| match e {
            DispatchError::Full => {
                tracing::warn!(
                    owner_id = %owner,
                    capacity = self.dispatch.max_capacity(),
                    "Dispatch queue full, rejecting job"
                );
                AppError::queue_full("Job queue is full, try again later")
            }
            DispatchError::Closed => AppError::service_unavailable("Job queue is shutting down"),
        })?;

        let max_retries = new.max_retries.unwrap_or(self.config.max_retries);
        let job = Job::from_new(owner.clone(), new, max_retries);
        self.registry.insert(job.clone())?;

        self.publish(JobEventKind::Queued, job.clone());
        permit.send(job.id.clone());

        tracing::info!(
            job_id = %job.id,
            owner_id = %owner,
            kind = %job.kind,
            max_retries = job.max_retries,
            "Job queued"
        );
        Ok(job)
    }

    fn validate(&self, owner: &UserId, new: &NewJob) -> AppResult<()> {
        if owner.is_blank() {
            return Err(AppError::validation("Owner id must not be empty"));
        }
        if let Some(id) = &new.id {
            if id.is_blank() {
                return Err(AppError::validation("Job id must not be empty"));
            }
            if id.as_str().len() > JobId::MAX_LEN {
                return Err(AppError::validation(format!(
                    "Job id must be at most {} characters",
                    JobId::MAX_LEN
                )));
            }
        }
        if !self.processors.has_processor(new.kind) {
            return Err(AppError::validation(format!(
                "No processor registered for job type '{}'",
                new.kind
            )));
        }
        match new.max_retries {
            Some(max) if max > self.config.max_retries_ceiling => Err(AppError::validation(
                format!(
                    "max_retries must be at most {}",
                    self.config.max_retries_ceiling
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Point lookup without an ownership check.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.registry.get(id)
    }

    /// Lookup scoped to `owner`.
    pub fn get_for_owner(&self, owner: &UserId, id: &JobId) -> AppResult<Job> {
        let job = self
            .registry
            .get(id)
            .ok_or_else(|| AppError::not_found(format!("Job '{id}' not found")))?;

        if !job.is_owned_by(owner) {
            return Err(AppError::forbidden("Job belongs to another user"));
        }
        Ok(job)
    }

    /// Jobs of `owner`, newest first.
    pub fn list_for_owner(&self, owner: &UserId, filter: &JobFilter) -> Vec<Job> {
        let limit = filter
            .limit
            .unwrap_or(self.config.list_limit_max)
            .min(self.config.list_limit_max);

        let mut jobs: Vec<Job> = self
            .registry
            .list_by_owner(owner)
            .into_iter()
            .filter(|job| filter.status.is_none_or(|s| job.status == s))
            .collect();

        jobs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        jobs.truncate(limit);
        jobs
    }

    /// Apply an update and publish the matching event if it took effect.
    pub fn update_status(&self, id: &JobId, update: JobUpdate) -> AppResult<UpdateOutcome> {
        let outcome = self.registry.update_status(id, update)?;

        match &outcome {
            UpdateOutcome::Applied(job) => {
                self.publish(event_kind_for(job.status), job.clone());
            }
            UpdateOutcome::Ignored(job) => {
                tracing::debug!(job_id = %id, status = %job.status, "Ignored update");
            }
        }
        Ok(outcome)
    }

    /// Record processor progress.
    pub fn report_progress(&self, id: &JobId, progress: u8) -> AppResult<()> {
        self.update_status(id, JobUpdate::progress(progress))?;
        Ok(())
    }

    /// Cancel a `queued` or `processing` job owned by `owner`.
    ///
    /// A job held by a worker has its cancellation token triggered; the
    /// processor is expected to stop at its next checkpoint.
    pub fn cancel(&self, owner: &UserId, id: &JobId) -> AppResult<Job> {
        self.get_for_owner(owner, id)?;
        let job = self.registry.cancel(id)?;

        if self.inflight.cancel(id) {
            tracing::debug!(job_id = %id, "Signalled in-flight job to stop");
        }

        tracing::info!(job_id = %id, owner_id = %owner, "Job cancelled");
        self.publish(JobEventKind::Cancelled, job.clone());
        Ok(job)
    }

    /// Force a job to `failed`.
    pub fn fail_job(&self, id: &JobId, error: &str) -> AppResult<UpdateOutcome> {
        let outcome = self.registry.fail(id, error)?;
        if let UpdateOutcome::Applied(job) = &outcome {
            tracing::warn!(job_id = %id, error = %error, "Job failed");
            self.publish(JobEventKind::Failed, job.clone());
        }
        Ok(outcome)
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            jobs: self.registry.stats(),
            depth: self.dispatch.depth(),
            capacity: self.dispatch.max_capacity(),
            in_flight: self.inflight.len(),
        }
    }

    /// Worker configuration in effect.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &Arc<dyn JobRegistry> {
        &self.registry
    }

    pub(crate) fn dispatch(&self) -> &DispatchSender {
        &self.dispatch
    }

    pub(crate) fn inflight(&self) -> &Arc<InFlightJobs> {
        &self.inflight
    }

    pub(crate) fn processors(&self) -> &Arc<ProcessorRegistry> {
        &self.processors
    }

    pub(crate) fn publish(&self, kind: JobEventKind, job: Job) {
        self.events.publish(JobEvent::new(kind, job));
    }
}

/// Event kind announcing that a job entered `status`.
pub(crate) fn event_kind_for(status: JobStatus) -> JobEventKind {
    match status {
        JobStatus::Queued | JobStatus::Processing => JobEventKind::Updated,
        JobStatus::Completed => JobEventKind::Completed,
        JobStatus::Failed => JobEventKind::Failed,
        JobStatus::Cancelled => JobEventKind::Cancelled,
    }
}
