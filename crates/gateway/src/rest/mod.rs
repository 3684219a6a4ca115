//! REST API endpoints for the gateway

pub mod auth;
pub mod availability;
pub mod health;
pub mod matching;
pub mod priority;
pub mod profile;
pub mod referrals;
pub mod suggestions;

use std::sync::Arc;

use axum::{routing::get, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::GatewayState;

/// Error body produced by [`crate::GatewayError`].
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Create all REST API routes
pub fn create_rest_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    let api = Router::new()
        .merge(auth::create_auth_routes(state.clone()))
        .merge(availability::create_availability_routes(state.clone()))
        .merge(suggestions::create_suggestion_routes(state.clone()))
        .merge(priority::create_priority_routes(state.clone()))
        .merge(profile::create_profile_routes(state.clone()))
        .merge(referrals::create_referral_routes(state.clone()))
        .merge(matching::create_matching_routes(state));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api)
}
