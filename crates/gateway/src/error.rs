//! Error types for the gateway layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use matchmaker_database::DatabaseError;
use matchmaker_matching::{AvailabilityError, SuggestionError};
use matchmaker_orchestrator::OrchestratorError;
use matchmaker_referrals::ReferralError;
use matchmaker_users::{UserError, VerificationError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Gone(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AuthorizationFailed(_) => StatusCode::FORBIDDEN,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::Gone(_) => StatusCode::GONE,
            GatewayError::InternalError(_) | GatewayError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            GatewayError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        GatewayError::AuthorizationFailed(reason.into())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let error_response = json!({
            "error": status.as_str(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<DatabaseError> for GatewayError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(what) => GatewayError::NotFound(what),
            DatabaseError::Duplicate(what) => GatewayError::Conflict(what),
            DatabaseError::InvalidValue { field, value } => {
                GatewayError::InvalidRequest(format!("invalid {field}: {value}"))
            }
            other => GatewayError::DatabaseError(other.to_string()),
        }
    }
}

impl From<UserError> for GatewayError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::MissingField(_) | UserError::Validation(_) => GatewayError::InvalidRequest(error.to_string()),
            UserError::EmailTaken => GatewayError::Conflict(error.to_string()),
            UserError::InvalidCredentials | UserError::InvalidToken(_) => {
                GatewayError::AuthenticationFailed(error.to_string())
            }
            UserError::AccountBlocked => GatewayError::AuthorizationFailed(error.to_string()),
            UserError::UserNotFound | UserError::ProfileNotFound => GatewayError::NotFound(error.to_string()),
            UserError::TokenCreationFailed(_) | UserError::PasswordHash(_) => {
                GatewayError::InternalError(error.to_string())
            }
            UserError::Verification(inner) => inner.into(),
            UserError::Database(inner) => inner.into(),
        }
    }
}

impl From<VerificationError> for GatewayError {
    fn from(error: VerificationError) -> Self {
        match error {
            VerificationError::NoActiveRequest
            | VerificationError::WrongCode
            | VerificationError::AlreadyUsed
            | VerificationError::NotPending(_) => GatewayError::InvalidRequest(error.to_string()),
            VerificationError::Expired => GatewayError::Gone(error.to_string()),
            VerificationError::ResendTooSoon(_) => GatewayError::RateLimitExceeded,
            VerificationError::MissingUser(_) => GatewayError::InternalError(error.to_string()),
            VerificationError::Delivery(_) => GatewayError::UpstreamError(error.to_string()),
            VerificationError::Database(inner) => inner.into(),
        }
    }
}

impl From<SuggestionError> for GatewayError {
    fn from(error: SuggestionError) -> Self {
        match error {
            SuggestionError::NotFound { .. }
            | SuggestionError::PartyNotFound { .. }
            | SuggestionError::ProfileNotFound { .. } => {
                GatewayError::NotFound(error.to_string())
            }
            SuggestionError::Forbidden { .. } => GatewayError::AuthorizationFailed(error.to_string()),
            SuggestionError::Conflict { .. } => GatewayError::Conflict(error.to_string()),
            SuggestionError::InvalidTransition { .. } | SuggestionError::Validation { .. } => {
                GatewayError::InvalidRequest(error.to_string())
            }
            SuggestionError::Database(inner) => inner.into(),
        }
    }
}

impl From<AvailabilityError> for GatewayError {
    fn from(error: AvailabilityError) -> Self {
        match error {
            AvailabilityError::NotFound { .. }
            | AvailabilityError::UserNotFound { .. }
            | AvailabilityError::ProfileNotFound { .. } => {
                GatewayError::NotFound(error.to_string())
            }
            AvailabilityError::AlreadyActive => GatewayError::Conflict(error.to_string()),
            AvailabilityError::Expired => GatewayError::Gone(error.to_string()),
            AvailabilityError::NotAParty => GatewayError::AuthorizationFailed(error.to_string()),
            AvailabilityError::Database(inner) => inner.into(),
        }
    }
}

impl From<ReferralError> for GatewayError {
    fn from(error: ReferralError) -> Self {
        match error {
            ReferralError::InvalidCodeFormat | ReferralError::Validation(_) | ReferralError::CampaignInactive => {
                GatewayError::InvalidRequest(error.to_string())
            }
            ReferralError::CodeTaken(_) | ReferralError::SlugTaken(_) | ReferralError::ReferralAlreadyUsed => {
                GatewayError::Conflict(error.to_string())
            }
            ReferralError::InvalidCode(_)
            | ReferralError::CampaignNotFound(_)
            | ReferralError::NoReferral
            | ReferralError::ReferralNotFound => GatewayError::NotFound(error.to_string()),
            ReferralError::Database(inner) => inner.into(),
        }
    }
}

impl From<OrchestratorError> for GatewayError {
    fn from(error: OrchestratorError) -> Self {
        match error {
            OrchestratorError::TargetNotFound(_) | OrchestratorError::JobNotFound(_) => {
                GatewayError::NotFound(error.to_string())
            }
            OrchestratorError::TargetIncomplete(_) => GatewayError::InvalidRequest(error.to_string()),
            OrchestratorError::ApiKeyMissing => GatewayError::ServiceUnavailable(error.to_string()),
            OrchestratorError::ProviderHttp(_)
            | OrchestratorError::ProviderStatus { .. }
            | OrchestratorError::ProviderResponse(_) => GatewayError::UpstreamError(error.to_string()),
            OrchestratorError::Database(inner) => inner.into(),
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(error: sqlx::Error) -> Self {
        GatewayError::DatabaseError(error.to_string())
    }
}
