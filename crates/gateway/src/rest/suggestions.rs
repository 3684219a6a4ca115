//! Match suggestion endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware as axum_middleware,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use matchmaker_database::{Meeting, StatusHistoryEntry, SuggestionPatch};
use matchmaker_matching::{CreateSuggestion, StatusAction, StatusUpdate, SuggestionView};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::GatewayResult;
use crate::middleware::{auth_middleware, request_locale, AuthUser};
use crate::rest::ErrorResponse;
use crate::state::GatewayState;

const DEFAULT_LIST_LIMIT: i64 = 50;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListSuggestionsQuery {
    pub limit: Option<i64>,
}

/// Create suggestion routes
pub fn create_suggestion_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/suggestions", get(list_suggestions).post(create_suggestion))
        .route(
            "/suggestions/:suggestion_id",
            get(get_suggestion).put(update_suggestion).delete(delete_suggestion),
        )
        .route("/suggestions/:suggestion_id/status", patch(update_status))
        .route("/suggestions/:suggestion_id/history", get(suggestion_history))
        .route("/suggestions/:suggestion_id/actions", get(suggestion_actions))
        .route("/suggestions/:suggestion_id/meetings", get(suggestion_meetings))
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware))
}

#[utoipa::path(
    get,
    path = "/api/suggestions",
    tag = "Suggestions",
    params(ListSuggestionsQuery),
    responses(
        (status = 200, description = "Suggestions the caller owns or is part of")
    ),
    security(("bearer" = []))
)]
pub async fn list_suggestions(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Query(params): Query<ListSuggestionsQuery>,
) -> GatewayResult<Json<Vec<SuggestionView>>> {
    let locale = request_locale(&headers);
    let now = Utc::now();
    let suggestions = state
        .suggestions
        .list_for_user(auth.actor(), params.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(
        suggestions
            .into_iter()
            .map(|suggestion| SuggestionView::new(suggestion, locale, now))
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/api/suggestions",
    tag = "Suggestions",
    responses(
        (status = 201, description = "Suggestion created and sent to the first party"),
        (status = 403, description = "Matchmaker access required", body = ErrorResponse),
        (status = 409, description = "A party is already in an active suggestion", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_suggestion(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<CreateSuggestion>,
) -> GatewayResult<(StatusCode, Json<SuggestionView>)> {
    auth.require_staff()?;
    let suggestion = state.suggestions.create_suggestion(auth.actor(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuggestionView::new(suggestion, request_locale(&headers), Utc::now())),
    ))
}

#[utoipa::path(
    get,
    path = "/api/suggestions/{suggestion_id}",
    tag = "Suggestions",
    params(("suggestion_id" = String, Path, description = "Suggestion public id")),
    responses(
        (status = 200, description = "Suggestion with its display fields"),
        (status = 403, description = "Caller may not view this suggestion", body = ErrorResponse),
        (status = 404, description = "Suggestion not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_suggestion(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(suggestion_id): Path<String>,
) -> GatewayResult<Json<SuggestionView>> {
    let suggestion = state.suggestions.get(auth.actor(), &suggestion_id).await?;
    Ok(Json(SuggestionView::new(suggestion, request_locale(&headers), Utc::now())))
}

#[utoipa::path(
    put,
    path = "/api/suggestions/{suggestion_id}",
    tag = "Suggestions",
    params(("suggestion_id" = String, Path, description = "Suggestion public id")),
    responses(
        (status = 200, description = "Suggestion details updated"),
        (status = 403, description = "Only the owning matchmaker may edit", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update_suggestion(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(suggestion_id): Path<String>,
    Json(payload): Json<SuggestionPatch>,
) -> GatewayResult<Json<SuggestionView>> {
    auth.require_staff()?;
    let suggestion = state
        .suggestions
        .update_suggestion(auth.actor(), &suggestion_id, payload)
        .await?;
    Ok(Json(SuggestionView::new(suggestion, request_locale(&headers), Utc::now())))
}

#[utoipa::path(
    delete,
    path = "/api/suggestions/{suggestion_id}",
    tag = "Suggestions",
    params(("suggestion_id" = String, Path, description = "Suggestion public id")),
    responses(
        (status = 204, description = "Suggestion deleted"),
        (status = 403, description = "Only the owning matchmaker may delete", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete_suggestion(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Path(suggestion_id): Path<String>,
) -> GatewayResult<StatusCode> {
    auth.require_staff()?;
    state.suggestions.delete(auth.actor(), &suggestion_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/api/suggestions/{suggestion_id}/status",
    tag = "Suggestions",
    params(("suggestion_id" = String, Path, description = "Suggestion public id")),
    responses(
        (status = 200, description = "Status changed, follow-up transition applied"),
        (status = 400, description = "Transition not allowed", body = ErrorResponse),
        (status = 409, description = "Caller already has an active suggestion", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update_status(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(suggestion_id): Path<String>,
    Json(payload): Json<StatusUpdate>,
) -> GatewayResult<Json<SuggestionView>> {
    let suggestion = state
        .suggestions
        .update_status(auth.actor(), &suggestion_id, payload)
        .await?;
    Ok(Json(SuggestionView::new(suggestion, request_locale(&headers), Utc::now())))
}

#[utoipa::path(
    get,
    path = "/api/suggestions/{suggestion_id}/history",
    tag = "Suggestions",
    params(("suggestion_id" = String, Path, description = "Suggestion public id")),
    responses(
        (status = 200, description = "Status history, oldest first")
    ),
    security(("bearer" = []))
)]
pub async fn suggestion_history(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Path(suggestion_id): Path<String>,
) -> GatewayResult<Json<Vec<StatusHistoryEntry>>> {
    Ok(Json(state.suggestions.history(auth.actor(), &suggestion_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/suggestions/{suggestion_id}/actions",
    tag = "Suggestions",
    params(("suggestion_id" = String, Path, description = "Suggestion public id")),
    responses(
        (status = 200, description = "Status changes the caller may make next")
    ),
    security(("bearer" = []))
)]
pub async fn suggestion_actions(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(suggestion_id): Path<String>,
) -> GatewayResult<Json<Vec<StatusAction>>> {
    let actions = state
        .suggestions
        .actions(auth.actor(), &suggestion_id, request_locale(&headers))
        .await?;
    Ok(Json(actions))
}

#[utoipa::path(
    get,
    path = "/api/suggestions/{suggestion_id}/meetings",
    tag = "Suggestions",
    params(("suggestion_id" = String, Path, description = "Suggestion public id")),
    responses(
        (status = 200, description = "Meetings scheduled for the suggestion")
    ),
    security(("bearer" = []))
)]
pub async fn suggestion_meetings(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Path(suggestion_id): Path<String>,
) -> GatewayResult<Json<Vec<Meeting>>> {
    Ok(Json(state.suggestions.meetings(auth.actor(), &suggestion_id).await?))
}
