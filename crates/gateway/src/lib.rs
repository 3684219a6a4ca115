//! # Matchmaker Gateway Crate
//!
//! HTTP API for the matchmaking backend. Routes requests to the domain services
//! (accounts, profiles, suggestions, availability, priority, referrals and AI matching).
//!
//! ## Architecture
//!
//! - **REST**: HTTP API endpoints with OpenAPI documentation
//! - **State**: Shared services built once at startup
//! - **Middleware**: Authentication, CORS, logging and locale detection
//! - **Rate limiting**: Redis-backed counters with an in-process fallback
//!
//! ## Usage
//!
//! ```rust,ignore
//! use matchmaker_gateway::{create_router, GatewayState, RateLimiter};
//!
//! let state = GatewayState::new(pool, &config, dispatcher, provider, RateLimiter::in_memory());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;
//! ```

pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod rest;
pub mod state;

pub use error::{GatewayError, GatewayResult};
pub use middleware::{auth_middleware, AuthUser};
pub use rate_limit::RateLimiter;
pub use state::{GatewayState, MatchingServices, ReferralCookieSettings};

pub use create_router as build_router;

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);
    #[allow(unused_mut)]
    let mut router = rest::create_rest_routes(arc_state.clone())
        .with_state(arc_state)
        .layer(middleware::create_cors_middleware())
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    #[cfg(debug_assertions)]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        router = router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs::ApiDoc::openapi()));
    }

    router
}

#[cfg(debug_assertions)]
mod docs {
    use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
    use utoipa::{Modify, OpenApi};

    use crate::rest;

    #[derive(OpenApi)]
    #[openapi(
        paths(
            rest::health::health_check,
            rest::auth::register,
            rest::auth::login,
            rest::auth::me,
            rest::auth::verify_email,
            rest::auth::verify_phone,
            rest::auth::send_phone_code,
            rest::auth::resend_email_code,
            rest::suggestions::list_suggestions,
            rest::suggestions::create_suggestion,
            rest::suggestions::get_suggestion,
            rest::suggestions::update_suggestion,
            rest::suggestions::delete_suggestion,
            rest::suggestions::update_status,
            rest::suggestions::suggestion_history,
            rest::suggestions::suggestion_actions,
            rest::suggestions::suggestion_meetings,
            rest::availability::send_inquiry,
            rest::availability::respond_to_inquiry,
            rest::availability::get_inquiry,
            rest::availability::list_inquiries,
            rest::availability::availability_stats,
            rest::priority::priority_summary,
            rest::priority::top_priority,
            rest::priority::new_users,
            rest::priority::neglected_users,
            rest::priority::user_priority,
            rest::priority::recalculate,
            rest::profile::get_profile,
            rest::profile::update_profile,
            rest::referrals::track_click,
            rest::referrals::active_campaign,
            rest::referrals::create_campaign,
            rest::referrals::update_campaign,
            rest::referrals::campaign_stats,
            rest::referrals::create_referrer,
            rest::referrals::referrer_stats,
            rest::referrals::leaderboard,
            rest::referrals::link_referral,
            rest::matching::create_job,
            rest::matching::job_status,
            rest::matching::saved_search,
            rest::matching::delete_saved_search,
        ),
        components(
            schemas(
                rest::ErrorResponse,
                rest::MessageResponse,
                rest::health::HealthResponse,
                rest::auth::RegisterRequest,
                rest::auth::LoginRequest,
                rest::auth::VerifyEmailRequest,
                rest::auth::VerifyPhoneRequest,
                rest::auth::SendPhoneCodeRequest,
                rest::auth::ResendEmailCodeRequest,
                rest::auth::UserResponse,
                rest::auth::RegisterResponse,
                rest::auth::LoginResponse,
                rest::availability::SendInquiryRequest,
                rest::availability::InquiryResponseRequest,
                rest::priority::RecalculateResponse,
                rest::profile::UpdateProfileRequest,
                rest::referrals::TrackClickRequest,
                rest::referrals::LinkReferralRequest,
                rest::matching::CreateJobRequest,
                rest::matching::JobResponse,
            )
        ),
        modifiers(&BearerAuth),
        tags(
            (name = "Health", description = "Liveness and dependency status"),
            (name = "Auth", description = "Registration, login and contact verification"),
            (name = "Suggestions", description = "Match suggestions and their status workflow"),
            (name = "Availability", description = "Availability inquiries sent by matchmakers"),
            (name = "Priority", description = "Candidate priority triage"),
            (name = "Profile", description = "Candidate profiles"),
            (name = "Referrals", description = "Referral campaigns and leaderboard"),
            (name = "Matching", description = "AI candidate scoring"),
        )
    )]
    pub struct ApiDoc;

    struct BearerAuth;

    impl Modify for BearerAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            let components = openapi.components.get_or_insert_with(Default::default);

            let mut scheme = SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer));
            if let SecurityScheme::Http(http) = &mut scheme {
                http.bearer_format = Some("JWT".to_string());
            }

            components.security_schemes.insert("bearer".to_string(), scheme);
        }
    }
}
