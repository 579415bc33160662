//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use compozit_core::error::AppError;
use compozit_core::types::JobId;
use compozit_entity::{JobKind, JobStatus, NewJob};
use compozit_worker::JobFilter;

/// Submit job request body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitJobRequest {
    /// Job kind wire name, e.g. `"quick_render"`.
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "Job type is required"))]
    pub kind: String,
    /// Correlation tag.
    #[serde(default)]
    #[validate(length(max = 256))]
    pub project_id: Option<String>,
    /// Opaque processor input; must be a JSON object when present.
    #[serde(default)]
    pub payload: Option<Value>,
    /// Override for the configured retry ceiling.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Caller-supplied id.
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub id: Option<String>,
}

impl SubmitJobRequest {
    /// Validate and convert into a submission.
    pub fn into_new_job(self) -> Result<NewJob, AppError> {
        self.validate()
            .map_err(|e| AppError::validation(format!("Invalid request: {e}")))?;

        let kind: JobKind = serde_json::from_value(Value::String(self.kind.clone()))
            .map_err(|_| AppError::validation(format!("Unknown job type '{}'", self.kind)))?;

        let payload = match self.payload {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(AppError::validation("payload must be a JSON object")),
        };

        Ok(NewJob {
            id: self.id.map(JobId::from),
            kind,
            project_id: self.project_id.unwrap_or_default(),
            payload,
            max_retries: self.max_retries,
        })
    }
}

/// Query parameters for `GET /api/jobs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListJobsQuery {
    /// Only jobs in this status.
    pub status: Option<String>,
    /// Maximum number of jobs returned.
    pub limit: Option<usize>,
}

impl ListJobsQuery {
    /// Converts to a `JobFilter`.
    pub fn into_filter(self) -> Result<JobFilter, AppError> {
        let status = self
            .status
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<JobStatus>()
                    .map_err(|_| AppError::validation(format!("Unknown status '{s}'")))
            })
            .transpose()?;

        Ok(JobFilter {
            status,
            limit: self.limit,
        })
    }
}
