//! Stable error codes surfaced to API clients.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Programmatic error code attached to every validation error and
/// every terminal sub-job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ErrorCode {
    MissingAsset,
    InvalidMediaKind,
    EmptyPayload,
    InvalidColor,
    InvalidFormat,
    RendererUnavailable,
    UnsupportedInput,
    RenderTimeout,
    RenderAborted,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingAsset => "MissingAsset",
            ErrorCode::InvalidMediaKind => "InvalidMediaKind",
            ErrorCode::EmptyPayload => "EmptyPayload",
            ErrorCode::InvalidColor => "InvalidColor",
            ErrorCode::InvalidFormat => "InvalidFormat",
            ErrorCode::RendererUnavailable => "RendererUnavailable",
            ErrorCode::UnsupportedInput => "UnsupportedInput",
            ErrorCode::RenderTimeout => "RenderTimeout",
            ErrorCode::RenderAborted => "RenderAborted",
            ErrorCode::Internal => "Internal",
        }
    }

    /// Validation codes are returned synchronously from submission and never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ErrorCode::MissingAsset
                | ErrorCode::InvalidMediaKind
                | ErrorCode::EmptyPayload
                | ErrorCode::InvalidColor
                | ErrorCode::InvalidFormat
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal failure: stable code plus human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl JobFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
