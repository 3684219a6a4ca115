//! Candidate priority triage endpoints. Matchmakers only.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use matchmaker_matching::{PrioritySummary, UpdateCounts, UserPriority};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::{auth_middleware, AuthUser};
use crate::rest::ErrorResponse;
use crate::state::GatewayState;

const DEFAULT_TOP_LIMIT: usize = 20;
const MAX_TOP_LIMIT: usize = 100;

#[derive(Debug, Deserialize, IntoParams)]
pub struct TopPriorityQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct RecalculateQuery {
    /// Recalculate a single user instead of everyone
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecalculateResponse {
    pub updated: usize,
    pub failed: usize,
}

impl From<UpdateCounts> for RecalculateResponse {
    fn from(counts: UpdateCounts) -> Self {
        Self {
            updated: counts.updated,
            failed: counts.failed,
        }
    }
}

/// Create priority routes
pub fn create_priority_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/priority/summary", get(priority_summary))
        .route("/priority/top", get(top_priority))
        .route("/priority/new", get(new_users))
        .route("/priority/neglected", get(neglected_users))
        .route("/priority/users/:user_id", get(user_priority))
        .route("/priority/recalculate", post(recalculate))
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware))
}

#[utoipa::path(
    get,
    path = "/api/priority/summary",
    tag = "Priority",
    responses(
        (status = 200, description = "Available candidates grouped by priority category"),
        (status = 403, description = "Matchmaker access required", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn priority_summary(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
) -> GatewayResult<Json<PrioritySummary>> {
    auth.require_staff()?;
    Ok(Json(state.priority.summary().await?))
}

#[utoipa::path(
    get,
    path = "/api/priority/top",
    tag = "Priority",
    params(TopPriorityQuery),
    responses(
        (status = 200, description = "Most urgent candidates first"),
        (status = 403, description = "Matchmaker access required", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn top_priority(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Query(params): Query<TopPriorityQuery>,
) -> GatewayResult<Json<Vec<UserPriority>>> {
    auth.require_staff()?;
    let limit = params.limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, MAX_TOP_LIMIT);
    Ok(Json(state.priority.top_priority(limit).await?))
}

#[utoipa::path(
    get,
    path = "/api/priority/new",
    tag = "Priority",
    responses(
        (status = 200, description = "New candidates who never received a suggestion"),
        (status = 403, description = "Matchmaker access required", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn new_users(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
) -> GatewayResult<Json<Vec<UserPriority>>> {
    auth.require_staff()?;
    Ok(Json(state.priority.new_users_without_suggestion().await?))
}

#[utoipa::path(
    get,
    path = "/api/priority/neglected",
    tag = "Priority",
    responses(
        (status = 200, description = "Candidates waiting too long for a suggestion"),
        (status = 403, description = "Matchmaker access required", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn neglected_users(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
) -> GatewayResult<Json<Vec<UserPriority>>> {
    auth.require_staff()?;
    Ok(Json(state.priority.neglected_users().await?))
}

#[utoipa::path(
    get,
    path = "/api/priority/users/{user_id}",
    tag = "Priority",
    params(("user_id" = i64, Path, description = "Internal user id")),
    responses(
        (status = 200, description = "Score breakdown for one candidate"),
        (status = 404, description = "User or profile not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn user_priority(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> GatewayResult<Json<UserPriority>> {
    auth.require_staff()?;
    state
        .priority
        .calculate_user_priority(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| GatewayError::NotFound(format!("no profile for user {user_id}")))
}

#[utoipa::path(
    post,
    path = "/api/priority/recalculate",
    tag = "Priority",
    params(RecalculateQuery),
    responses(
        (status = 200, description = "Stored priority scores refreshed", body = RecalculateResponse),
        (status = 403, description = "Matchmaker access required", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn recalculate(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Query(params): Query<RecalculateQuery>,
) -> GatewayResult<Json<RecalculateResponse>> {
    auth.require_staff()?;
    let counts = match params.user_id {
        Some(user_id) => {
            let updated = state.priority.update_user_in_db(user_id).await?;
            UpdateCounts {
                updated: usize::from(updated),
                failed: usize::from(!updated),
            }
        }
        None => state.priority.update_all_in_db().await?,
    };
    info!(matchmaker_id = auth.id, updated = counts.updated, failed = counts.failed, "priority recalculation requested");
    Ok(Json(counts.into()))
}
