//! Job handlers.
//!
//! Every route acts on behalf of the caller identified by [`AuthUser`];
//! jobs owned by other users are never visible.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use compozit_core::error::AppError;
use compozit_core::types::JobId;
use compozit_entity::Job;

use crate::dto::request::{ListJobsQuery, SubmitJobRequest};
use crate::dto::response::{JobListResponse, SubmitJobResponse};
use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/jobs
pub async fn submit_job(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    let Json(req) = body.map_err(|e| AppError::validation(e.body_text()))?;
    let new = req.into_new_job()?;

    let job = state.queue.submit(&auth, new)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id: job.id,
            status: job.status,
        }),
    ))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state.queue.get_for_owner(&auth, &JobId::from(id))?;
    Ok(Json(job))
}

/// GET /api/jobs?status=&limit=
pub async fn list_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
    query: Result<Query<ListJobsQuery>, QueryRejection>,
) -> ApiResult<Json<JobListResponse>> {
    let Query(query) = query.map_err(|e| AppError::validation(e.body_text()))?;
    let filter = query.into_filter()?;

    let jobs = state.queue.list_for_owner(&auth, &filter);
    let total = jobs.len();
    Ok(Json(JobListResponse { jobs, total }))
}

/// POST /api/jobs/{id}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state.queue.cancel(&auth, &JobId::from(id))?;
    Ok(Json(job))
}
