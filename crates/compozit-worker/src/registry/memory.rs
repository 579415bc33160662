//! In-memory job registry backed by `DashMap`.
//!
//! `DashMap` shards its entries by key hash, so every operation here holds
//! at most one shard lock for one job id. The owner index is a separate map
//! and is never locked at the same time as a job entry.

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use compozit_core::error::AppError;
use compozit_core::result::AppResult;
use compozit_core::types::{JobId, UserId};
use compozit_entity::{Job, JobUpdate};

use super::{JobRegistry, RegistryStats, RetryDecision, UpdateOutcome, apply_retry, apply_update};

/// Job registry that lives for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryJobRegistry {
    /// Job ID → record.
    jobs: DashMap<JobId, Job>,
    /// Owner → job ids, in submission order.
    by_owner: DashMap<UserId, Vec<JobId>>,
}

impl MemoryJobRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the registry holds no jobs.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn not_found(id: &JobId) -> AppError {
        AppError::not_found(format!("Job '{id}' not found"))
    }
}

impl JobRegistry for MemoryJobRegistry {
    fn insert(&self, job: Job) -> AppResult<()> {
        let owner = job.owner_id.clone();
        let id = job.id.clone();

        match self.jobs.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(AppError::conflict(format!("Job '{id}' already exists")));
            }
            Entry::Vacant(slot) => {
                slot.insert(job);
            }
        }

        self.by_owner.entry(owner).or_default().push(id);
        Ok(())
    }

    fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    fn list_by_owner(&self, owner: &UserId) -> Vec<Job> {
        let ids = self
            .by_owner
            .get(owner)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        ids.iter()
            .filter_map(|id| self.get(id))
            .filter(|job| &job.owner_id == owner)
            .collect()
    }

    fn update_status(&self, id: &JobId, update: JobUpdate) -> AppResult<UpdateOutcome> {
        let mut entry = self.jobs.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        let job = entry.value_mut();

        if apply_update(job, update, Utc::now()) {
            Ok(UpdateOutcome::Applied(job.clone()))
        } else {
            Ok(UpdateOutcome::Ignored(job.clone()))
        }
    }

    fn cancel(&self, id: &JobId) -> AppResult<Job> {
        let mut entry = self.jobs.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        let job = entry.value_mut();

        if !job.status.is_cancellable() {
            return Err(AppError::already_terminal(format!(
                "Job '{id}' is already {}",
                job.status
            )));
        }

        apply_update(job, JobUpdate::cancelled(), Utc::now());
        Ok(job.clone())
    }

    fn schedule_retry(&self, id: &JobId, error: &str) -> AppResult<RetryDecision> {
        let mut entry = self.jobs.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        Ok(apply_retry(entry.value_mut(), error, Utc::now()))
    }

    fn fail(&self, id: &JobId, error: &str) -> AppResult<UpdateOutcome> {
        self.update_status(id, JobUpdate::failed(error))
    }

    fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for entry in self.jobs.iter() {
            stats.record(entry.value().status);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use compozit_core::error::ErrorKind;
    use compozit_entity::{JobKind, JobStatus, NewJob};

    use super::*;

    fn job_for(owner: &str) -> Job {
        Job::from_new(UserId::from(owner), NewJob::new(JobKind::QuickRender), 3)
    }

    #[test]
    fn test_insert_and_get() {
        let registry = MemoryJobRegistry::new();
        let job = job_for("user-a");
        registry.insert(job.clone()).expect("insert");

        let stored = registry.get(&job.id).expect("stored");
        assert_eq!(stored.status, JobStatus::Queued);
        assert_eq!(stored.progress, 0);
        assert!(registry.get(&JobId::from("missing")).is_none());
    }

    #[test]
    fn test_duplicate_id_is_conflict() {
        let registry = MemoryJobRegistry::new();
        let job = job_for("user-a");
        registry.insert(job.clone()).expect("insert");

        let err = registry.insert(job).expect_err("duplicate");
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_by_owner_is_isolated() {
        let registry = MemoryJobRegistry::new();
        for _ in 0..3 {
            registry.insert(job_for("user-a")).expect("insert");
        }
        registry.insert(job_for("user-b")).expect("insert");

        let a = registry.list_by_owner(&UserId::from("user-a"));
        assert_eq!(a.len(), 3);
        assert!(a.iter().all(|j| j.owner_id.as_str() == "user-a"));

        let b = registry.list_by_owner(&UserId::from("user-b"));
        assert_eq!(b.len(), 1);
        assert!(registry.list_by_owner(&UserId::from("user-c")).is_empty());
    }

    #[test]
    fn test_cancel_queued_job() {
        let registry = MemoryJobRegistry::new();
        let job = job_for("user-a");
        registry.insert(job.clone()).expect("insert");

        let cancelled = registry.cancel(&job.id).expect("cancel");
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());
    }

    #[test]
    fn test_cancel_completed_job_is_already_terminal() {
        let registry = MemoryJobRegistry::new();
        let job = job_for("user-a");
        registry.insert(job.clone()).expect("insert");
        registry
            .update_status(&job.id, JobUpdate::processing())
            .expect("claim");
        registry
            .update_status(&job.id, JobUpdate::completed(json!({"url": "r.png"})))
            .expect("complete");
        let before = registry.get(&job.id).expect("stored");

        let err = registry.cancel(&job.id).expect_err("terminal");
        assert_eq!(err.kind, ErrorKind::AlreadyTerminal);
        assert_eq!(registry.get(&job.id).expect("stored"), before);
    }

    #[test]
    fn test_update_unknown_job_is_not_found() {
        let registry = MemoryJobRegistry::new();
        let err = registry
            .update_status(&JobId::from("nope"), JobUpdate::processing())
            .expect_err("missing");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_update_after_terminal_is_ignored_without_error() {
        let registry = MemoryJobRegistry::new();
        let job = job_for("user-a");
        registry.insert(job.clone()).expect("insert");
        registry.cancel(&job.id).expect("cancel");

        let outcome = registry
            .update_status(&job.id, JobUpdate::processing())
            .expect("no error");
        assert!(!outcome.is_applied());
        assert_eq!(outcome.job().status, JobStatus::Cancelled);
    }

    #[test]
    fn test_stats_counts_by_status() {
        let registry = MemoryJobRegistry::new();
        let a = job_for("user-a");
        let b = job_for("user-a");
        registry.insert(a.clone()).expect("insert");
        registry.insert(b).expect("insert");
        registry.cancel(&a.id).expect("cancel");

        let stats = registry.stats();
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total(), 2);
    }

    #[test]
    fn test_concurrent_inserts_keep_index_consistent() {
        let registry = Arc::new(MemoryJobRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        registry
                            .insert(job_for(&format!("user-{}", t % 2)))
                            .expect("insert");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread");
        }

        assert_eq!(registry.len(), 2000);
        assert_eq!(registry.list_by_owner(&UserId::from("user-0")).len(), 1000);
        assert_eq!(registry.list_by_owner(&UserId::from("user-1")).len(), 1000);
    }
}
