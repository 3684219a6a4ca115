//! AI matching endpoints: background scan jobs and saved results. Matchmakers only.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use matchmaker_database::MatchingJob;
use matchmaker_orchestrator::MatchSearch;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use utoipa::ToSchema;

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::{auth_middleware, AuthUser};
use crate::rest::ErrorResponse;
use crate::state::GatewayState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub target_user_id: i64,
    /// Only `algorithmic` is supported
    pub method: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_id: String,
    pub target_user_id: i64,
    pub method: String,
    pub status: String,
    pub progress: i64,
    pub progress_message: Option<String>,
    pub matches_found: Option<i64>,
    pub total_candidates: Option<i64>,
    pub error: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub result: Option<Value>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl From<MatchingJob> for JobResponse {
    fn from(job: MatchingJob) -> Self {
        let result = job.result.as_deref().and_then(|raw| match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(job_id = %job.public_id, error = %err, "stored job result is not valid JSON");
                None
            }
        });

        Self {
            job_id: job.public_id,
            target_user_id: job.target_user_id,
            method: job.method,
            status: job.status.to_string(),
            progress: job.progress,
            progress_message: job.progress_message,
            matches_found: job.matches_found,
            total_candidates: job.total_candidates,
            error: job.error,
            result,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

/// Create matching routes
pub fn create_matching_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/matching/jobs", post(create_job))
        .route("/matching/jobs/:job_id", get(job_status))
        .route("/matching/saved/:user_id", get(saved_search).delete(delete_saved_search))
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware))
}

#[utoipa::path(
    post,
    path = "/api/matching/jobs",
    tag = "Matching",
    request_body = CreateJobRequest,
    responses(
        (status = 202, description = "Job queued and started in the background", body = JobResponse),
        (status = 403, description = "Matchmaker access required", body = ErrorResponse),
        (status = 503, description = "AI matching is not configured", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_job(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Json(payload): Json<CreateJobRequest>,
) -> GatewayResult<(StatusCode, Json<JobResponse>)> {
    auth.require_staff()?;
    let method = payload.method.as_deref().filter(|m| !m.trim().is_empty());
    if method.is_some_and(|m| m != "algorithmic") {
        return Err(GatewayError::InvalidRequest(format!(
            "unsupported matching method: {}",
            method.unwrap_or_default()
        )));
    }

    let job = state
        .matching()?
        .jobs
        .submit(payload.target_user_id, auth.id, method)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(job.into())))
}

#[utoipa::path(
    get,
    path = "/api/matching/jobs/{job_id}",
    tag = "Matching",
    params(("job_id" = String, Path, description = "Job public id")),
    responses(
        (status = 200, description = "Job progress, and results once completed", body = JobResponse),
        (status = 404, description = "Job not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn job_status(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Path(job_id): Path<String>,
) -> GatewayResult<Json<JobResponse>> {
    auth.require_staff()?;
    let job = state.matching()?.jobs.status(&job_id).await?;
    Ok(Json(job.into()))
}

#[utoipa::path(
    get,
    path = "/api/matching/saved/{user_id}",
    tag = "Matching",
    params(("user_id" = i64, Path, description = "Target user id")),
    responses(
        (status = 200, description = "Last saved scan for the user"),
        (status = 404, description = "No saved scan", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn saved_search(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> GatewayResult<Json<MatchSearch>> {
    auth.require_staff()?;
    state
        .matching()?
        .engine
        .load_saved(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| GatewayError::NotFound(format!("no saved matches for user {user_id}")))
}

#[utoipa::path(
    delete,
    path = "/api/matching/saved/{user_id}",
    tag = "Matching",
    params(("user_id" = i64, Path, description = "Target user id")),
    responses(
        (status = 204, description = "Saved scan deleted"),
        (status = 404, description = "No saved scan", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete_saved_search(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> GatewayResult<StatusCode> {
    auth.require_staff()?;
    if state.matching()?.engine.delete_saved(user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(GatewayError::NotFound(format!("no saved matches for user {user_id}")))
    }
}
