//! Referral campaign endpoints: click tracking, referrer signup, stats and the leaderboard

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware as axum_middleware,
    routing::{get, patch, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use matchmaker_database::{Referral, ReferralCampaign, Referrer};
use matchmaker_referrals::{
    CampaignPatch, CampaignRequest, CampaignStats, ClickContext, ClickOutcome, LeaderboardEntry, ReferralCookie,
    ReferrerStats, RegisterReferrer,
};
use serde::Deserialize;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::{auth_middleware, client_ip, optional_auth_middleware, AuthUser};
use crate::rest::ErrorResponse;
use crate::state::{GatewayState, ReferralCookieSettings};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackClickRequest {
    pub code: String,
    pub session_id: Option<String>,
    pub landing_page: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CampaignQuery {
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    /// Defaults to the running campaign
    pub campaign_id: Option<i64>,
    pub limit: Option<i64>,
    /// Referral code to flag as the current user
    pub code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkReferralRequest {
    /// Falls back to the referral cookie when absent
    pub referral_id: Option<String>,
    pub session_id: Option<String>,
}

/// Create referral routes
pub fn create_referral_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    let authenticated = Router::new()
        .route("/referrals/campaigns", post(create_campaign))
        .route("/referrals/campaigns/:campaign_id", patch(update_campaign))
        .route("/referrals/campaigns/:campaign_id/stats", get(campaign_stats))
        .route("/referrals/link", post(link_referral))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/referrals/track", post(track_click))
        .route("/referrals/campaign", get(active_campaign))
        .route("/referrals/referrers", post(create_referrer))
        .route("/referrals/referrers/:code/stats", get(referrer_stats))
        .route("/referrals/leaderboard", get(leaderboard))
        .route_layer(axum_middleware::from_fn_with_state(state, optional_auth_middleware))
        .merge(authenticated)
}

fn referral_cookie(settings: &ReferralCookieSettings, value: String) -> GatewayResult<Cookie<'static>> {
    let max_age = settings.max_age_days.max(0) * 24 * 60 * 60;
    Cookie::parse(format!(
        "{}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax",
        settings.name
    ))
    .map_err(|err| GatewayError::InternalError(format!("invalid referral cookie: {err}")))
}

#[utoipa::path(
    post,
    path = "/api/referrals/track",
    tag = "Referrals",
    request_body = TrackClickRequest,
    responses(
        (status = 200, description = "Click recorded; the referral cookie is set unless the IP cap was reached"),
        (status = 400, description = "Campaign is not running", body = ErrorResponse),
        (status = 404, description = "Unknown referral code", body = ErrorResponse)
    )
)]
pub async fn track_click(
    State(state): State<Arc<GatewayState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<TrackClickRequest>,
) -> GatewayResult<(CookieJar, Json<ClickOutcome>)> {
    let click = ClickContext {
        code: payload.code,
        ip_address: client_ip(&headers, connect_info.as_ref(), state.trust_proxy_headers),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        session_id: payload.session_id,
        landing_page: payload.landing_page,
    };

    let outcome = state.referrals.track_click(click).await?;
    let jar = match outcome.cookie.clone() {
        Some(value) => jar.add(referral_cookie(&state.referral_cookie, value)?),
        None => jar,
    };
    Ok((jar, Json(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/referrals/campaign",
    tag = "Referrals",
    params(CampaignQuery),
    responses(
        (status = 200, description = "The running campaign, or the one named by slug"),
        (status = 404, description = "No such campaign", body = ErrorResponse)
    )
)]
pub async fn active_campaign(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<CampaignQuery>,
) -> GatewayResult<Json<ReferralCampaign>> {
    state
        .referrals
        .get_active_campaign(params.slug.as_deref())
        .await?
        .map(Json)
        .ok_or_else(|| GatewayError::NotFound("campaign not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/referrals/campaigns/{campaign_id}/stats",
    tag = "Referrals",
    params(("campaign_id" = i64, Path, description = "Campaign id")),
    responses(
        (status = 200, description = "Campaign funnel totals"),
        (status = 403, description = "Matchmaker access required", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn campaign_stats(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Path(campaign_id): Path<i64>,
) -> GatewayResult<Json<CampaignStats>> {
    auth.require_staff()?;
    Ok(Json(state.referrals.campaign_with_stats(campaign_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/referrals/campaigns",
    tag = "Referrals",
    responses(
        (status = 201, description = "Campaign created and active"),
        (status = 400, description = "Invalid name, slug, dates or settings", body = ErrorResponse),
        (status = 403, description = "Matchmaker access required", body = ErrorResponse),
        (status = 409, description = "Slug is taken", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_campaign(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Json(payload): Json<CampaignRequest>,
) -> GatewayResult<(StatusCode, Json<ReferralCampaign>)> {
    auth.require_staff()?;
    let campaign = state.referrals.create_campaign(payload).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

#[utoipa::path(
    patch,
    path = "/api/referrals/campaigns/{campaign_id}",
    tag = "Referrals",
    params(("campaign_id" = i64, Path, description = "Campaign id")),
    responses(
        (status = 200, description = "Campaign updated"),
        (status = 403, description = "Matchmaker access required", body = ErrorResponse),
        (status = 404, description = "Campaign not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update_campaign(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Path(campaign_id): Path<i64>,
    Json(payload): Json<CampaignPatch>,
) -> GatewayResult<Json<ReferralCampaign>> {
    auth.require_staff()?;
    Ok(Json(state.referrals.update_campaign(campaign_id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/referrals/referrers",
    tag = "Referrals",
    responses(
        (status = 201, description = "Referrer registered with a referral code"),
        (status = 400, description = "Invalid name or code", body = ErrorResponse),
        (status = 409, description = "Preferred code is taken", body = ErrorResponse)
    )
)]
pub async fn create_referrer(
    State(state): State<Arc<GatewayState>>,
    auth: Option<AuthUser>,
    Json(mut payload): Json<RegisterReferrer>,
) -> GatewayResult<(StatusCode, Json<Referrer>)> {
    payload.user_id = auth.map(|user| user.id);
    let referrer = state.referrals.create_referrer(payload).await?;
    Ok((StatusCode::CREATED, Json(referrer)))
}

#[utoipa::path(
    get,
    path = "/api/referrals/referrers/{code}/stats",
    tag = "Referrals",
    params(("code" = String, Path, description = "Referral code")),
    responses(
        (status = 200, description = "Referrer dashboard: counters, rank and prizes"),
        (status = 404, description = "Unknown referral code", body = ErrorResponse)
    )
)]
pub async fn referrer_stats(
    State(state): State<Arc<GatewayState>>,
    Path(code): Path<String>,
) -> GatewayResult<Json<ReferrerStats>> {
    Ok(Json(state.referrals.referrer_stats(&code).await?))
}

#[utoipa::path(
    get,
    path = "/api/referrals/leaderboard",
    tag = "Referrals",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Referrers ranked by verified referrals"),
        (status = 404, description = "No running campaign", body = ErrorResponse)
    )
)]
pub async fn leaderboard(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<LeaderboardQuery>,
) -> GatewayResult<Json<Vec<LeaderboardEntry>>> {
    let campaign_id = match params.campaign_id {
        Some(id) => id,
        None => state
            .referrals
            .get_active_campaign(None)
            .await?
            .map(|campaign| campaign.id)
            .ok_or_else(|| GatewayError::NotFound("no running campaign".to_string()))?,
    };

    let board = state
        .referrals
        .leaderboard(campaign_id, params.limit, params.code.as_deref())
        .await?;
    Ok(Json(board))
}

#[utoipa::path(
    post,
    path = "/api/referrals/link",
    tag = "Referrals",
    request_body = LinkReferralRequest,
    responses(
        (status = 200, description = "Referral linked to the caller"),
        (status = 404, description = "No referral to link", body = ErrorResponse),
        (status = 409, description = "Referral belongs to another user", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn link_referral(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    jar: CookieJar,
    Json(payload): Json<LinkReferralRequest>,
) -> GatewayResult<Json<Referral>> {
    let referral_id = match payload.referral_id {
        Some(id) => id,
        None => jar
            .get(&state.referral_cookie.name)
            .and_then(|cookie| ReferralCookie::parse(cookie.value(), chrono::Utc::now()))
            .map(|cookie| cookie.referral_id)
            .unwrap_or_default(),
    };
    if referral_id.is_empty() && payload.session_id.is_none() {
        warn!(user_id = auth.id, "referral link requested without referral id, cookie or session");
        return Err(GatewayError::NotFound("no referral to link".to_string()));
    }

    let referral = state
        .referrals
        .link_user_to_referral(auth.id, &referral_id, payload.session_id.as_deref())
        .await?;
    Ok(Json(referral))
}
