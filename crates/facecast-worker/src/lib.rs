//! Render backends and job orchestration.
//!
//! This crate provides:
//! - The `RenderBackend` contract with local (FFmpeg) and remote (generative) variants
//! - An in-memory job registry
//! - The orchestrator driving sub-jobs, timeouts, cancellation and cleanup
//! - Retry and structured job logging helpers

pub mod backend;
pub mod config;
pub mod error;
pub mod local;
pub mod logging;
pub mod orchestrator;
pub mod progress;
pub mod prompt;
pub mod registry;
pub mod remote;
pub mod retry;

pub use backend::{RenderBackend, RenderRequest, RenderedVideo};
pub use config::{BackendKind, WorkerConfig};
pub use error::{RenderError, RenderResult, SubmitError, SubmitResult};
pub use local::LocalFilterRenderer;
pub use logging::JobLogger;
pub use orchestrator::{CancelOutcome, JobOrchestrator, JobSubmission};
pub use progress::ProgressReporter;
pub use registry::JobRegistry;
pub use remote::RemoteGenerativeRenderer;
