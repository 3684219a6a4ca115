//! Error types for suggestions and availability inquiries.

use matchmaker_database::{DatabaseError, SuggestionStatus};
use thiserror::Error;

pub type SuggestionResult<T> = Result<T, SuggestionError>;
pub type AvailabilityResult<T> = Result<T, AvailabilityError>;

#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("Suggestion not found: {id}")]
    NotFound { id: String },

    #[error("User not found: {id}")]
    PartyNotFound { id: i64 },

    #[error("Profile not found for user {user_id}")]
    ProfileNotFound { user_id: i64 },

    #[error("Permission denied: {reason}")]
    Forbidden { reason: String },

    #[error("{reason}")]
    Conflict { reason: String },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: SuggestionStatus, to: SuggestionStatus },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl SuggestionError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden { reason: reason.into() }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict { reason: reason.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }
}

impl From<sqlx::Error> for SuggestionError {
    fn from(err: sqlx::Error) -> Self {
        SuggestionError::Database(err.into())
    }
}

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error("Availability inquiry not found: {id}")]
    NotFound { id: String },

    #[error("User not found: {id}")]
    UserNotFound { id: i64 },

    #[error("Profile not found for user {user_id}")]
    ProfileNotFound { user_id: i64 },

    #[error("An active availability inquiry already exists for this user")]
    AlreadyActive,

    #[error("Availability inquiry has expired")]
    Expired,

    #[error("Not allowed to respond to this inquiry")]
    NotAParty,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for AvailabilityError {
    fn from(err: sqlx::Error) -> Self {
        AvailabilityError::Database(err.into())
    }
}
