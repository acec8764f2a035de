//! Worker error types.

use facecast_gen_client::GenError;
use facecast_media::MediaError;
use facecast_models::{ErrorCode, JobFailure, MediaKind};
use facecast_storage::StorageError;
use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;
pub type SubmitResult<T> = Result<T, SubmitError>;

/// Terminal failure of one sub-job.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Renderer unavailable: {0}")]
    RendererUnavailable(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Render timed out: {0}")]
    Timeout(String),

    #[error("Render aborted")]
    Aborted,

    #[error("Render failed: {0}")]
    Failed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::RendererUnavailable(msg.into())
    }

    pub fn unsupported_input(msg: impl Into<String>) -> Self {
        Self::UnsupportedInput(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Stable code surfaced in job status.
    pub fn code(&self) -> ErrorCode {
        match self {
            RenderError::RendererUnavailable(_) => ErrorCode::RendererUnavailable,
            RenderError::UnsupportedInput(_) => ErrorCode::UnsupportedInput,
            RenderError::Timeout(_) => ErrorCode::RenderTimeout,
            RenderError::Aborted => ErrorCode::RenderAborted,
            RenderError::Failed(_) | RenderError::Storage(_) | RenderError::Io(_) => ErrorCode::Internal,
        }
    }

    pub fn to_failure(&self) -> JobFailure {
        JobFailure::new(self.code(), self.to_string())
    }
}

impl From<MediaError> for RenderError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::FfmpegNotFound | MediaError::FfprobeNotFound => {
                RenderError::RendererUnavailable(err.to_string())
            }
            MediaError::InvalidVideo(_) | MediaError::FfprobeFailed { .. } | MediaError::FileNotFound(_) => {
                RenderError::UnsupportedInput(err.to_string())
            }
            MediaError::Timeout(_) => RenderError::Timeout(err.to_string()),
            MediaError::Cancelled => RenderError::Aborted,
            MediaError::Io(e) => RenderError::Io(e),
            other => RenderError::Failed(other.to_string()),
        }
    }
}

impl From<GenError> for RenderError {
    fn from(err: GenError) -> Self {
        if err.is_configuration() || err.is_retryable() {
            return RenderError::RendererUnavailable(err.to_string());
        }
        match err {
            GenError::RequestFailed { status: 400, .. } => RenderError::UnsupportedInput(err.to_string()),
            GenError::Io(e) => RenderError::Io(e),
            other => RenderError::Failed(other.to_string()),
        }
    }
}

/// Rejection of a job before any sub-job starts.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Missing required asset: {0}")]
    MissingAsset(MediaKind),

    #[error("At least one layout must be requested")]
    NoLayouts,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SubmitError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SubmitError::MissingAsset(_) | SubmitError::NoLayouts => ErrorCode::MissingAsset,
            SubmitError::Storage(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_error_mapping() {
        assert_eq!(RenderError::from(MediaError::FfmpegNotFound).code(), ErrorCode::RendererUnavailable);
        assert_eq!(
            RenderError::from(MediaError::invalid_video("no stream")).code(),
            ErrorCode::UnsupportedInput
        );
        assert_eq!(RenderError::from(MediaError::Timeout(10)).code(), ErrorCode::RenderTimeout);
        assert_eq!(RenderError::from(MediaError::Cancelled).code(), ErrorCode::RenderAborted);
        assert_eq!(RenderError::from(MediaError::internal("boom")).code(), ErrorCode::Internal);
    }

    #[test]
    fn test_gen_error_mapping() {
        assert_eq!(RenderError::from(GenError::MissingApiKey).code(), ErrorCode::RendererUnavailable);
        let forbidden = GenError::RequestFailed {
            status: 403,
            body: "denied".into(),
        };
        assert_eq!(RenderError::from(forbidden).code(), ErrorCode::RendererUnavailable);
        let bad_request = GenError::RequestFailed {
            status: 400,
            body: "image too large".into(),
        };
        assert_eq!(RenderError::from(bad_request).code(), ErrorCode::UnsupportedInput);
    }

    #[test]
    fn test_failure_carries_message() {
        let failure = RenderError::timeout("exceeded 900s").to_failure();
        assert_eq!(failure.code, ErrorCode::RenderTimeout);
        assert!(failure.message.contains("900s"));
    }
}
