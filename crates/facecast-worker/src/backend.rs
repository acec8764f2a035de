//! The renderer contract.

use std::path::PathBuf;

use async_trait::async_trait;
use facecast_models::{HexColor, JobAssets, JobId, LayoutSpec};
use tokio::sync::watch;

use crate::error::RenderResult;
use crate::progress::ProgressReporter;

/// Everything a renderer needs for one layout of one job.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub job_id: JobId,
    pub layout: LayoutSpec,
    pub assets: JobAssets,
    pub background_color: HexColor,
    /// Staging path the finished video must be written to.
    pub output: PathBuf,
}

/// A finished render, still in staging.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedVideo {
    pub path: PathBuf,
    pub duration_seconds: f64,
}

/// A pluggable renderer.
///
/// Implementations report progress through `progress`, stop with
/// `RenderError::Aborted` once `cancel` flips to `true`, and either write a
/// complete file to `request.output` or return an error. The orchestrator
/// owns the terminal event; renderers never report 100%.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Short name stamped on jobs (`local`, `remote`).
    fn name(&self) -> &'static str;

    /// Cheap readiness check used by the health endpoint.
    async fn check_ready(&self) -> RenderResult<()>;

    async fn render(
        &self,
        request: &RenderRequest,
        progress: &ProgressReporter,
        cancel: watch::Receiver<bool>,
    ) -> RenderResult<RenderedVideo>;
}

/// Resolve once `cancel` is set. Never resolves if the sender is dropped
/// without cancelling.
pub(crate) async fn cancelled(mut cancel: watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
