//! Local filesystem storage for Facecast.
//!
//! This crate provides:
//! - The scratch namespace for uploaded inputs (`AssetStore`)
//! - The public namespace for finished artifacts (`ResultStore`)
//! - HMAC-signed opaque artifact tokens
//! - Cross-device-safe file moves

pub mod assets;
pub mod config;
pub mod delivery;
pub mod error;
pub mod fs_utils;
pub mod results;

pub use assets::{AssetStore, ReleaseOutcome};
pub use config::StorageConfig;
pub use delivery::{ArtifactToken, DeliveryConfig};
pub use error::{StorageError, StorageResult};
pub use fs_utils::move_file;
pub use results::ResultStore;
