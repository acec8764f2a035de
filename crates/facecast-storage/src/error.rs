//! Storage error types.

use facecast_models::{ErrorCode, MediaKind};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Declared type '{mime_type}' is not valid for {kind}")]
    InvalidMediaKind { kind: MediaKind, mime_type: String },

    #[error("Upload for {0} is empty")]
    EmptyPayload(MediaKind),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Storage misconfigured: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Stable code for API responses.
    pub fn code(&self) -> ErrorCode {
        match self {
            StorageError::InvalidMediaKind { .. } => ErrorCode::InvalidMediaKind,
            StorageError::EmptyPayload(_) => ErrorCode::EmptyPayload,
            _ => ErrorCode::Internal,
        }
    }
}
