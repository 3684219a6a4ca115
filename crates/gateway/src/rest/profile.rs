//! Candidate profile endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use matchmaker_database::{Profile, UserRepository};
use matchmaker_users::ProfileUpdate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::{auth_middleware, AuthUser};
use crate::rest::ErrorResponse;
use crate::state::GatewayState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ProfileQuery {
    /// Public id of another user; matchmakers only
    pub user_id: Option<String>,
}

/// Fields left out are unchanged. Empty strings clear text fields.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    /// MALE or FEMALE
    pub gender: Option<String>,
    /// YYYY-MM-DD, at least 18 years ago
    pub birth_date: Option<String>,
    pub religious_level: Option<String>,
    pub city: Option<String>,
    pub occupation: Option<String>,
    pub education: Option<String>,
    /// Up to 2000 characters
    pub about: Option<String>,
    /// Centimetres, 120 to 220
    pub height: Option<i64>,
    pub marital_status: Option<String>,
    pub origin: Option<String>,
    pub service_type: Option<String>,
    pub character_traits: Option<Vec<String>>,
    pub hobbies: Option<Vec<String>>,
    pub preferred_age_min: Option<i64>,
    pub preferred_age_max: Option<i64>,
    pub preferred_religious_levels: Option<Vec<String>>,
    pub matching_notes: Option<String>,
    pub readiness_level: Option<String>,
    pub is_profile_visible: Option<bool>,
    pub availability_status: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(request: UpdateProfileRequest) -> Self {
        Self {
            gender: request.gender,
            birth_date: request.birth_date,
            religious_level: request.religious_level,
            city: request.city,
            occupation: request.occupation,
            education: request.education,
            about: request.about,
            height: request.height,
            marital_status: request.marital_status,
            origin: request.origin,
            service_type: request.service_type,
            character_traits: request.character_traits,
            hobbies: request.hobbies,
            preferred_age_min: request.preferred_age_min,
            preferred_age_max: request.preferred_age_max,
            preferred_religious_levels: request.preferred_religious_levels,
            matching_notes: request.matching_notes,
            readiness_level: request.readiness_level,
            is_profile_visible: request.is_profile_visible,
            availability_status: request.availability_status,
        }
    }
}

/// Create profile routes
pub fn create_profile_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware))
}

#[utoipa::path(
    get,
    path = "/api/profile",
    tag = "Profile",
    params(ProfileQuery),
    responses(
        (status = 200, description = "The caller's profile, or another user's for matchmakers"),
        (status = 403, description = "Candidates may only read their own profile", body = ErrorResponse),
        (status = 404, description = "User or profile not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_profile(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Query(query): Query<ProfileQuery>,
) -> GatewayResult<Json<Profile>> {
    let user_id = match query.user_id.as_deref() {
        Some(public_id) if public_id != auth.public_id => {
            auth.require_staff()?;
            UserRepository::new(state.pool.clone())
                .find_by_public_id(public_id)
                .await?
                .ok_or_else(|| GatewayError::NotFound(format!("user {public_id}")))?
                .id
        }
        _ => auth.id,
    };

    Ok(Json(state.profiles.get(user_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/profile",
    tag = "Profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile"),
        (status = 400, description = "A field is out of range or malformed", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update_profile(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> GatewayResult<Json<Profile>> {
    let profile = state.profiles.update(auth.id, payload.into()).await?;
    Ok(Json(profile))
}
