//! Error types for referral campaigns.

use matchmaker_database::DatabaseError;
use thiserror::Error;

pub type ReferralResult<T> = Result<T, ReferralError>;

#[derive(Debug, Error)]
pub enum ReferralError {
    #[error("Referral code must be 3-15 letters or digits")]
    InvalidCodeFormat,

    #[error("Referral code {0} is already taken")]
    CodeTaken(String),

    #[error("Unknown referral code: {0}")]
    InvalidCode(String),

    #[error("Campaign is not running")]
    CampaignInactive,

    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("Campaign slug {0} is already taken")]
    SlugTaken(String),

    #[error("No referral is linked to this visitor")]
    NoReferral,

    #[error("Referral not found")]
    ReferralNotFound,

    #[error("Referral already belongs to another user")]
    ReferralAlreadyUsed,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ReferralError {
    /// Stable machine-readable code returned to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            ReferralError::InvalidCodeFormat => "INVALID_CODE_FORMAT",
            ReferralError::CodeTaken(_) => "CODE_TAKEN",
            ReferralError::InvalidCode(_) => "INVALID_CODE",
            ReferralError::CampaignInactive => "CAMPAIGN_INACTIVE",
            ReferralError::CampaignNotFound(_) => "CAMPAIGN_NOT_FOUND",
            ReferralError::SlugTaken(_) => "SLUG_TAKEN",
            ReferralError::NoReferral => "NO_REFERRAL",
            ReferralError::ReferralNotFound => "REFERRAL_NOT_FOUND",
            ReferralError::ReferralAlreadyUsed => "REFERRAL_ALREADY_USED",
            ReferralError::Validation(_) => "VALIDATION_ERROR",
            ReferralError::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<sqlx::Error> for ReferralError {
    fn from(err: sqlx::Error) -> Self {
        ReferralError::Database(err.into())
    }
}
