//! Availability inquiry endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use matchmaker_database::{AvailabilityInquiry, AvailabilityStats, InquiryFilter, InquiryOrder};
use matchmaker_matching::InquiryDetails;
use matchmaker_notifications::Locale;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::{auth_middleware, request_locale, AuthUser};
use crate::rest::ErrorResponse;
use crate::state::GatewayState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendInquiryRequest {
    pub first_party_id: i64,
    pub note: Option<String>,
    /// `he` or `en`; defaults to the request's Accept-Language
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InquiryResponseRequest {
    pub is_available: bool,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListInquiriesQuery {
    /// pending, completed or expired
    #[param(value_type = Option<String>)]
    pub status: Option<InquiryFilter>,
    /// created_at or updated_at
    #[param(value_type = Option<String>)]
    pub order_by: Option<InquiryOrder>,
    pub limit: Option<i64>,
}

/// Create availability routes
pub fn create_availability_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/availability/inquiries", get(list_inquiries).post(send_inquiry))
        .route("/availability/inquiries/:inquiry_id", get(get_inquiry))
        .route("/availability/inquiries/:inquiry_id/respond", post(respond_to_inquiry))
        .route("/availability/stats", get(availability_stats))
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware))
}

#[utoipa::path(
    post,
    path = "/api/availability/inquiries",
    tag = "Availability",
    request_body = SendInquiryRequest,
    responses(
        (status = 201, description = "Inquiry created and emailed to the candidate"),
        (status = 403, description = "Matchmaker access required", body = ErrorResponse),
        (status = 409, description = "The candidate already has an open inquiry", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn send_inquiry(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<SendInquiryRequest>,
) -> GatewayResult<(StatusCode, Json<AvailabilityInquiry>)> {
    auth.require_staff()?;
    let locale = payload
        .locale
        .as_deref()
        .map(|tag| Locale::from_tag(Some(tag)))
        .unwrap_or_else(|| request_locale(&headers));

    let inquiry = state
        .availability
        .send_inquiry(auth.id, payload.first_party_id, payload.note.as_deref(), locale)
        .await?;
    Ok((StatusCode::CREATED, Json(inquiry)))
}

#[utoipa::path(
    post,
    path = "/api/availability/inquiries/{inquiry_id}/respond",
    tag = "Availability",
    params(("inquiry_id" = String, Path, description = "Inquiry public id")),
    request_body = InquiryResponseRequest,
    responses(
        (status = 200, description = "Response recorded"),
        (status = 403, description = "Caller is not a party to the inquiry", body = ErrorResponse),
        (status = 410, description = "Inquiry expired", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn respond_to_inquiry(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Path(inquiry_id): Path<String>,
    Json(payload): Json<InquiryResponseRequest>,
) -> GatewayResult<Json<AvailabilityInquiry>> {
    let inquiry = state
        .availability
        .update_response(&inquiry_id, auth.id, payload.is_available, payload.note.as_deref())
        .await?;
    Ok(Json(inquiry))
}

#[utoipa::path(
    get,
    path = "/api/availability/inquiries/{inquiry_id}",
    tag = "Availability",
    params(("inquiry_id" = String, Path, description = "Inquiry public id")),
    responses(
        (status = 200, description = "Inquiry with its participants"),
        (status = 404, description = "Inquiry not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_inquiry(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Path(inquiry_id): Path<String>,
) -> GatewayResult<Json<InquiryDetails>> {
    let details = state.availability.get_inquiry(&inquiry_id).await?;
    if !auth.is_staff() && !details.inquiry.is_party(auth.id) {
        return Err(GatewayError::forbidden("not a party to this inquiry"));
    }
    Ok(Json(details))
}

#[utoipa::path(
    get,
    path = "/api/availability/inquiries",
    tag = "Availability",
    params(ListInquiriesQuery),
    responses(
        (status = 200, description = "Inquiries involving the caller")
    ),
    security(("bearer" = []))
)]
pub async fn list_inquiries(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Query(params): Query<ListInquiriesQuery>,
) -> GatewayResult<Json<Vec<AvailabilityInquiry>>> {
    let inquiries = state
        .availability
        .list_inquiries(
            auth.id,
            params.status.unwrap_or_default(),
            params.order_by.unwrap_or_default(),
            params.limit,
        )
        .await?;
    Ok(Json(inquiries))
}

#[utoipa::path(
    get,
    path = "/api/availability/stats",
    tag = "Availability",
    responses(
        (status = 200, description = "Availability of every candidate the matchmaker asked about"),
        (status = 403, description = "Matchmaker access required", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn availability_stats(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
) -> GatewayResult<Json<AvailabilityStats>> {
    auth.require_staff()?;
    Ok(Json(state.availability.stats(auth.id).await?))
}
