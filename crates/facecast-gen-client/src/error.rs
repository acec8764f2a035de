//! Generative client error types.

use thiserror::Error;

pub type GenResult<T> = Result<T, GenError>;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("Generative API key is not configured")]
    MissingApiKey,

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("Generative service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Generation failed: {0}")]
    OperationFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenError::ServiceUnavailable(_) => true,
            GenError::Network(e) => !e.is_builder() && !e.is_decode(),
            _ => false,
        }
    }

    /// Failures caused by missing or rejected credentials/configuration.
    pub fn is_configuration(&self) -> bool {
        match self {
            GenError::MissingApiKey | GenError::InvalidConfig(_) => true,
            GenError::RequestFailed { status, .. } => matches!(status, 401 | 403 | 404),
            _ => false,
        }
    }

    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            GenError::ServiceUnavailable(format!("{}: {}", status, body))
        } else {
            GenError::RequestFailed {
                status: status.as_u16(),
                body,
            }
        }
    }
}
