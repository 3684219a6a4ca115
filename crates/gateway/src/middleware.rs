//! Middleware for authentication and other cross-cutting concerns

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use matchmaker_database::UserRole;
use matchmaker_matching::Actor;
use matchmaker_notifications::Locale;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

/// The caller behind a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub public_id: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Matchmaker console routes are closed to candidates.
    pub fn require_staff(&self) -> GatewayResult<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(GatewayError::forbidden("matchmaker access required"))
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| GatewayError::AuthenticationFailed("User not authenticated".to_string()))
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| GatewayError::AuthenticationFailed("Missing authentication token".to_string()))?;

    let (_claims, user) = state.accounts.authenticate(token).await?;

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        public_id: user.public_id,
        role: user.role,
    });

    Ok(next.run(request).await)
}

/// Like [`auth_middleware`] but lets anonymous callers through. A valid
/// token still attaches the [`AuthUser`].
pub async fn optional_auth_middleware(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        if let Ok((_claims, user)) = state.accounts.authenticate(token).await {
            request.extensions_mut().insert(AuthUser {
                id: user.id,
                public_id: user.public_id,
                role: user.role,
            });
        }
    }

    next.run(request).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The caller's address. Proxy headers are consulted only when `trust_proxy` is set,
/// otherwise the socket address is used.
pub fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> Option<String> {
    let socket_ip = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());
    if !trust_proxy {
        return socket_ip;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded.or(real_ip).map(str::to_string).or(socket_ip)
}

/// Locale from the first `Accept-Language` tag, Hebrew otherwise.
pub fn request_locale(headers: &HeaderMap) -> Locale {
    let tag = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|value| value.split(['-', ';']).next());
    Locale::from_tag(tag)
}

/// Logging middleware for request/response logging
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

/// CORS middleware for cross-origin requests
pub fn create_cors_middleware() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE, header::ACCEPT_LANGUAGE])
}
