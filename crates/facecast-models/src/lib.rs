//! Shared data models for the Facecast backend.
//!
//! This crate provides Serde-serializable types for:
//! - Uploaded media assets and their scratch handles
//! - Layout geometry for the vertical and horizontal outputs
//! - Render jobs, sub-jobs and their state machine
//! - Finished artifacts
//! - Stable error codes surfaced to clients
//! - Encoding configuration

pub mod asset;
pub mod color;
pub mod encoding;
pub mod error_code;
pub mod job;
pub mod layout;
pub mod rect;

// Re-export common types
pub use asset::{AssetHandle, MediaAsset, MediaCategory, MediaKind};
pub use color::{ColorError, HexColor, Rgba};
pub use encoding::EncodingConfig;
pub use error_code::{ErrorCode, JobFailure};
pub use job::{
    JobAssets, JobId, JobState, LayoutSelection, RenderArtifact, RenderJob, SubJobState,
    SubJobStatus,
};
pub use layout::{
    layout_for, Corners, Fit, LayoutId, LayoutSpec, PixelRegion, Region, ResolvedLayout,
    SourceRole,
};
pub use rect::NormalizedRect;
