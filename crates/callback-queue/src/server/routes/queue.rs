//! Job submission and inspection endpoints

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{JobRecord, JobStatus, NewJob, QueueStats};

/// Body of `POST /queue`
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub callback_url: String,
    pub file: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl From<SubmitRequest> for NewJob {
    fn from(req: SubmitRequest) -> Self {
        Self {
            callback_url: req.callback_url,
            file: req.file,
            metadata: req.metadata,
        }
    }
}

/// POST /queue - Submit a job
pub async fn submit_job(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<JobRecord>> {
    let Json(req) = payload?;
    let job = NewJob::from(req);
    let record = state.coordinator().submit_record(&job)?;
    Ok(Json(record))
}

/// Query string of `GET /queue`
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<JobStatus>,
}

/// GET /queue - List jobs, oldest first, optionally filtered by status
pub async fn list_jobs(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<JobRecord>>> {
    let Query(query) = query?;
    let jobs = match query.status {
        Some(status) => state.store().list_by_status(status)?,
        None => state.store().list_all()?,
    };
    Ok(Json(jobs))
}

/// GET /queue/:id - Get one job
pub async fn get_job(
    State(state): State<AppState>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<JobRecord>> {
    let Path(id) = id?;
    let job = state.store().get(id)?.ok_or(Error::NotFound(id))?;
    Ok(Json(job))
}

/// DELETE /queue/:id - Remove a job
pub async fn delete_job(
    State(state): State<AppState>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<StatusCode> {
    let Path(id) = id?;
    state.store().remove(id)?;
    tracing::info!(job.id = id, "Job removed");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /queue/stats - Per-status counts
pub async fn queue_stats(State(state): State<AppState>) -> Result<Json<QueueStats>> {
    Ok(Json(state.store().stats()?))
}

/// Body of `POST /queue/retry`
#[derive(Debug, Default, Deserialize)]
pub struct RetryRequest {
    /// Overrides the configured attempt limit
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub retried: usize,
}

/// POST /queue/retry - Return eligible failed jobs to pending
///
/// An empty body uses the configured limit; anything else must be a valid `RetryRequest`.
pub async fn retry_failed(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RetryResponse>> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RetryRequest::default()
    } else {
        serde_json::from_slice::<RetryRequest>(&body)?
    };
    let retried = match request.max_attempts {
        Some(max_attempts) => state.coordinator().retry_failed_below(max_attempts)?,
        None => state.coordinator().retry_failed()?,
    };
    Ok(Json(RetryResponse { retried }))
}
