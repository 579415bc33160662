//! Response DTOs.

use serde::{Deserialize, Serialize};

use compozit_core::types::JobId;
use compozit_entity::{Job, JobStatus};
use compozit_worker::QueueStats;

/// Body of a `202 Accepted` submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJobResponse {
    /// Id of the accepted job.
    pub job_id: JobId,
    /// Always `queued` at acceptance time.
    pub status: JobStatus,
}

/// A caller's jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListResponse {
    /// Jobs, newest first.
    pub jobs: Vec<Job>,
    /// Number of jobs returned.
    pub total: usize,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Queue counters.
    pub queue: QueueStats,
    /// Open WebSocket connections.
    pub connections: usize,
    /// Users with at least one connection.
    pub users: usize,
}
