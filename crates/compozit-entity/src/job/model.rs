//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use compozit_core::types::{JobId, UserId};

use super::kind::JobKind;
use super::status::JobStatus;

/// One unit of asynchronous work and its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Submitting user; every read and cancel is scoped to it.
    pub owner_id: UserId,
    /// Opaque correlation tag, passed through unvalidated.
    pub project_id: String,
    /// Which processor handles the job.
    #[serde(rename = "type")]
    pub kind: JobKind,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Progress percentage (0-100).
    pub progress: u8,
    /// Type-specific input, never interpreted by the core.
    pub payload: Map<String, Value>,
    /// Outcome on `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error text on `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Most recent processing error while a retry is pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Number of retries already scheduled.
    pub retry_count: u32,
    /// Retry ceiling.
    pub max_retries: u32,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// When a worker first claimed the job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build a fresh `queued` record from a submission.
    pub fn from_new(owner_id: UserId, new: NewJob, max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            id: new.id.unwrap_or_else(JobId::generate),
            owner_id,
            project_id: new.project_id,
            kind: new.kind,
            status: JobStatus::Queued,
            progress: 0,
            payload: new.payload,
            result: None,
            error: None,
            last_error: None,
            retry_count: 0,
            max_retries,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// Whether `user` owns this job.
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }
}

/// Data required to submit a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    /// Optional caller-supplied id; generated when absent.
    #[serde(default)]
    pub id: Option<JobId>,
    /// Job kind.
    #[serde(rename = "type")]
    pub kind: JobKind,
    /// Correlation tag.
    #[serde(default)]
    pub project_id: String,
    /// Opaque input.
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Override for the configured retry ceiling.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl NewJob {
    /// Submission of `kind` with an empty payload.
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: None,
            kind,
            project_id: String::new(),
            payload: Map::new(),
            max_retries: None,
        }
    }

    /// Set the project correlation tag.
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    /// Set the opaque payload from a JSON object; other values are ignored.
    pub fn with_payload(mut self, payload: Value) -> Self {
        if let Value::Object(map) = payload {
            self.payload = map;
        }
        self
    }

    /// Override the retry ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Supply an explicit id.
    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A requested change to a job's mutable fields.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    /// Target status.
    pub status: JobStatus,
    /// New progress; `None` leaves it unchanged.
    pub progress: Option<u8>,
    /// Result to record (only honoured on `completed`).
    pub result: Option<Value>,
    /// Error to record (only honoured on `failed`).
    pub error: Option<String>,
    /// Whether this update may move a `queued` job into `processing`.
    /// Only the worker that pulled the job from dispatch claims it.
    pub claim: bool,
}

impl JobUpdate {
    /// A worker claimed the job.
    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            progress: Some(0),
            result: None,
            error: None,
            claim: true,
        }
    }

    /// Intermediate progress while processing.
    pub fn progress(progress: u8) -> Self {
        Self {
            status: JobStatus::Processing,
            progress: Some(progress.min(100)),
            result: None,
            error: None,
            claim: false,
        }
    }

    /// Successful completion.
    pub fn completed(result: Value) -> Self {
        Self {
            status: JobStatus::Completed,
            progress: Some(100),
            result: Some(result),
            error: None,
            claim: false,
        }
    }

    /// Terminal failure.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            progress: None,
            result: None,
            error: Some(error.into()),
            claim: false,
        }
    }

    /// Cancellation requested by the owner.
    pub fn cancelled() -> Self {
        Self {
            status: JobStatus::Cancelled,
            progress: None,
            result: None,
            error: None,
            claim: false,
        }
    }
}
