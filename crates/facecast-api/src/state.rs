//! Application state.

use std::sync::Arc;

use facecast_gen_client::GenClientConfig;
use facecast_storage::{AssetStore, DeliveryConfig, ResultStore, StorageConfig};
use facecast_worker::{BackendKind, JobOrchestrator, LocalFilterRenderer, RemoteGenerativeRenderer, RenderBackend, WorkerConfig};
use tracing::info;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: JobOrchestrator,
    pub delivery: Arc<DeliveryConfig>,
}

impl AppState {
    /// Build state from loaded configuration.
    ///
    /// The render backend is chosen here, once, and stamped on every job.
    pub fn build(config: ApiConfig, storage: &StorageConfig, worker: WorkerConfig) -> Self {
        let backend: Arc<dyn RenderBackend> = match worker.backend {
            BackendKind::Local => Arc::new(LocalFilterRenderer::new(worker.encoding.clone())),
            BackendKind::Remote => Arc::new(RemoteGenerativeRenderer::new(
                GenClientConfig::from_env(),
                worker.encoding.clone(),
            )),
        };
        info!(
            backend = backend.name(),
            scratch = %storage.scratch_dir.display(),
            public = %storage.public_dir.display(),
            "Render backend selected"
        );

        let orchestrator = JobOrchestrator::new(
            AssetStore::new(&storage.scratch_dir),
            ResultStore::new(&storage.public_dir, storage.artifact_ttl),
            backend,
            worker,
        );

        Self::new(config, orchestrator, DeliveryConfig::from_env())
    }

    pub fn new(config: ApiConfig, orchestrator: JobOrchestrator, delivery: DeliveryConfig) -> Self {
        Self {
            config,
            orchestrator,
            delivery: Arc::new(delivery),
        }
    }
}
