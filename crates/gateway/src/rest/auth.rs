//! Account REST endpoints: registration, login and verification codes

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use matchmaker_database::{ReferralStatus, User, VerificationType};
use matchmaker_referrals::{ReferralError, ReferralLookup};
use matchmaker_notifications::Locale;
use matchmaker_users::{normalize_phone, RegistrationRequest};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::{auth_middleware, client_ip, request_locale, AuthUser};
use crate::rest::{ErrorResponse, MessageResponse};
use crate::state::GatewayState;

const REGISTRATION_WINDOW: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub marketing_consent: bool,
}

impl From<RegisterRequest> for RegistrationRequest {
    fn from(request: RegisterRequest) -> Self {
        Self {
            email: request.email,
            password: request.password,
            first_name: request.first_name,
            last_name: request.last_name,
            phone: request.phone,
            language: request.language,
            marketing_consent: request.marketing_consent,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPhoneRequest {
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendPhoneCodeRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResendEmailCodeRequest {
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub status: String,
    pub is_verified: bool,
    pub is_phone_verified: bool,
    pub is_profile_complete: bool,
    pub language: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.public_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            role: user.role.to_string(),
            status: user.status.to_string(),
            is_verified: user.is_verified,
            is_phone_verified: user.is_phone_verified,
            is_profile_complete: user.is_profile_complete,
            language: user.language,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LocaleQuery {
    /// `he` or `en`; falls back to `Accept-Language`
    pub locale: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub email: String,
    pub user_id: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub user: UserResponse,
}

/// Create authentication routes
pub fn create_auth_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    let protected = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/verify-phone", post(verify_phone))
        .route("/auth/send-phone-code", post(send_phone_code))
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/resend-email-code", post(resend_email_code))
        .merge(protected)
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    params(LocaleQuery),
    responses(
        (status = 201, description = "Account created and verification email sent", body = RegisterResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 429, description = "Too many registrations from this address", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<Arc<GatewayState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<LocaleQuery>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> GatewayResult<(StatusCode, CookieJar, Json<RegisterResponse>)> {
    let ip = client_ip(&headers, connect_info.as_ref(), state.trust_proxy_headers)
        .unwrap_or_else(|| "unknown".to_string());
    state
        .rate_limiter
        .hit(&format!("register:{ip}"), state.registration_per_hour, REGISTRATION_WINDOW)
        .await?;

    let locale = match query.locale.as_deref() {
        Some(tag) => Locale::from_tag(Some(tag)),
        None => request_locale(&headers),
    };
    let outcome = state.accounts.register(payload.into(), locale).await?;

    let mut jar = jar;
    let referral_cookie = jar.get(&state.referral_cookie.name).map(|c| c.value().to_string());
    if let Some(value) = referral_cookie {
        match state.referrals.link_from_cookie(outcome.user.id, &value).await {
            Ok(Some(referral)) => {
                info!(user_id = outcome.user.id, referral_id = %referral.public_id, "registration linked to referral");
                jar = jar.remove(Cookie::build(state.referral_cookie.name.clone()).path("/"));
            }
            Ok(None) => {}
            Err(err) => warn!(user_id = outcome.user.id, error = %err, "could not link registration to referral"),
        }
    }

    Ok((
        StatusCode::CREATED,
        jar,
        Json(RegisterResponse {
            success: true,
            message: outcome.message,
            email: outcome.user.email.clone(),
            user_id: outcome.user.public_id.clone(),
            user: outcome.user.into(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed bearer token", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account blocked", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<GatewayState>>,
    Json(payload): Json<LoginRequest>,
) -> GatewayResult<Json<LoginResponse>> {
    let outcome = state.accounts.login(&payload.email, &payload.password).await?;
    Ok(Json(LoginResponse {
        token: outcome.token,
        expires_at: outcome.expires_at.to_rfc3339(),
        user: outcome.user.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "The authenticated account", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn me(State(state): State<Arc<GatewayState>>, auth: AuthUser) -> GatewayResult<Json<UserResponse>> {
    let user = state.accounts.me(auth.id).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-email",
    tag = "Auth",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = UserResponse),
        (status = 400, description = "Wrong or unknown code", body = ErrorResponse),
        (status = 410, description = "Code expired", body = ErrorResponse)
    )
)]
pub async fn verify_email(
    State(state): State<Arc<GatewayState>>,
    Json(payload): Json<VerifyEmailRequest>,
) -> GatewayResult<Json<UserResponse>> {
    let user = state
        .verifications
        .verify_code(&payload.code, VerificationType::Email, &payload.email)
        .await?;

    let lookup = ReferralLookup {
        user_id: Some(user.id),
        ..ReferralLookup::default()
    };
    match state.referrals.update_referral_status(lookup, ReferralStatus::Verified).await {
        Ok(progress) => info!(user_id = user.id, referral_id = %progress.referral_id, "referral verified"),
        Err(ReferralError::NoReferral) => {}
        Err(err) => warn!(user_id = user.id, error = %err, "could not advance referral after email verification"),
    }

    Ok(Json(user.into()))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-phone",
    tag = "Auth",
    request_body = VerifyPhoneRequest,
    responses(
        (status = 200, description = "Phone verified", body = UserResponse),
        (status = 400, description = "Wrong code or no phone on file", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn verify_phone(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Json(payload): Json<VerifyPhoneRequest>,
) -> GatewayResult<Json<UserResponse>> {
    let user = state.accounts.me(auth.id).await?;
    let phone = user
        .phone
        .as_deref()
        .ok_or_else(|| GatewayError::InvalidRequest("no phone number on file".to_string()))?;

    let user = state
        .verifications
        .verify_code(&payload.code, VerificationType::PhoneWhatsapp, phone)
        .await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    post,
    path = "/api/auth/send-phone-code",
    tag = "Auth",
    request_body = SendPhoneCodeRequest,
    responses(
        (status = 200, description = "WhatsApp code sent", body = MessageResponse),
        (status = 400, description = "Invalid phone number", body = ErrorResponse),
        (status = 429, description = "A code was sent moments ago", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn send_phone_code(
    State(state): State<Arc<GatewayState>>,
    auth: AuthUser,
    Json(payload): Json<SendPhoneCodeRequest>,
) -> GatewayResult<Json<MessageResponse>> {
    let phone = normalize_phone(&payload.phone)?;
    let user = state.accounts.me(auth.id).await?;
    state.verifications.send_phone_code(&user, &phone).await?;
    Ok(Json(MessageResponse::new("Verification code sent")))
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-email-code",
    tag = "Auth",
    request_body = ResendEmailCodeRequest,
    responses(
        (status = 200, description = "A new code was emailed", body = MessageResponse),
        (status = 400, description = "No account awaiting verification", body = ErrorResponse),
        (status = 429, description = "A code was sent moments ago", body = ErrorResponse)
    )
)]
pub async fn resend_email_code(
    State(state): State<Arc<GatewayState>>,
    Json(payload): Json<ResendEmailCodeRequest>,
) -> GatewayResult<Json<MessageResponse>> {
    state.verifications.resend(VerificationType::Email, &payload.email).await?;
    Ok(Json(MessageResponse::new("Verification code sent")))
}
