//! Axum HTTP API server.
//!
//! This crate provides:
//! - Multipart job submission, status, cancellation and artifact download
//! - Signed opaque download links
//! - Rate limiting and security headers
//! - Prometheus metrics
//! - Background artifact expiry

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use services::ArtifactSweeper;
pub use state::AppState;
