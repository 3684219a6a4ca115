//! Error types for accounts and verification codes.

use matchmaker_database::{DatabaseError, VerificationType};
use matchmaker_notifications::NotificationError;
use thiserror::Error;

pub type UserResult<T> = Result<T, UserError>;
pub type VerificationResult<T> = Result<T, VerificationError>;

/// Account-level errors: registration, login and token handling.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("a user with this email already exists")]
    EmailTaken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is blocked")]
    AccountBlocked,

    #[error("user not found")]
    UserNotFound,

    #[error("profile not found")]
    ProfileNotFound,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token creation failed: {0}")]
    TokenCreationFailed(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

/// One-time code errors.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("invalid code or no active verification request")]
    NoActiveRequest,

    #[error("code already used")]
    AlreadyUsed,

    #[error("code expired")]
    Expired,

    #[error("wrong code")]
    WrongCode,

    #[error("verification {0} has no associated user")]
    MissingUser(i64),

    #[error("no account is awaiting {0} verification for this target")]
    NotPending(VerificationType),

    #[error("please wait {0} seconds before requesting a new code")]
    ResendTooSoon(i64),

    #[error("failed to deliver verification code: {0}")]
    Delivery(#[from] NotificationError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for UserError {
    fn from(err: sqlx::Error) -> Self {
        UserError::Database(err.into())
    }
}

impl From<sqlx::Error> for VerificationError {
    fn from(err: sqlx::Error) -> Self {
        VerificationError::Database(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(UserError::MissingField("email").to_string(), "missing required field: email");
        assert_eq!(VerificationError::WrongCode.to_string(), "wrong code");
        assert_eq!(
            VerificationError::NotPending(VerificationType::PhoneWhatsapp).to_string(),
            "no account is awaiting PHONE_WHATSAPP verification for this target"
        );
    }

    #[test]
    fn verification_errors_pass_through_user_error() {
        let err: UserError = VerificationError::Expired.into();
        assert_eq!(err.to_string(), "code expired");
    }
}
