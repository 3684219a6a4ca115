use matchmaker_database::DatabaseError;
use thiserror::Error;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("missing Gemini API key")]
    ApiKeyMissing,
    #[error("provider http request failed: {0}")]
    ProviderHttp(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    ProviderStatus { status: u16, body: String },
    #[error("invalid provider response: {0}")]
    ProviderResponse(String),
    #[error("target user {0} not found or has no profile")]
    TargetNotFound(i64),
    #[error("target user {0} needs a gender and birth date before matching")]
    TargetIncomplete(i64),
    #[error("matching job {0} not found")]
    JobNotFound(String),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        OrchestratorError::ProviderResponse(err.to_string())
    }
}
