//! Job orchestration.
//!
//! A job moves `Submitted -> Running -> {Complete, Failed}`. Every requested
//! layout becomes a sub-job run on the configured backend under a wall-clock
//! bound and the job's cancellation signal. When the last sub-job is
//! terminal the job's scratch assets are released, each exactly once, and
//! the job is finalized.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use facecast_models::{
    layout_for, HexColor, JobAssets, JobId, JobState, LayoutId, LayoutSelection, MediaAsset, RenderJob,
};
use facecast_storage::{AssetStore, ReleaseOutcome, ResultStore};
use futures::future::join_all;
use metrics::{counter, histogram};
use tokio::sync::watch;
use tracing::{info, Instrument};

use crate::backend::{cancelled, RenderBackend, RenderRequest, RenderedVideo};
use crate::config::WorkerConfig;
use crate::error::{RenderError, RenderResult, SubmitError, SubmitResult};
use crate::logging::JobLogger;
use crate::progress::ProgressReporter;
use crate::registry::{JobEntry, JobRegistry};

pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "facecast_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "facecast_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "facecast_jobs_failed_total";
    pub const RENDER_DURATION_SECONDS: &str = "facecast_render_duration_seconds";
    pub const SUB_JOBS_FAILED_TOTAL: &str = "facecast_sub_jobs_failed_total";
    pub const CLEANUP_FAILURES_TOTAL: &str = "facecast_cleanup_failures_total";
}

/// A request to start a job. Assets must already be ingested under `job_id`.
#[derive(Debug, Clone)]
pub struct JobSubmission {
    pub job_id: JobId,
    pub screen: Option<MediaAsset>,
    pub face: Option<MediaAsset>,
    pub background: Option<MediaAsset>,
    pub background_color: HexColor,
    pub layouts: LayoutSelection,
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Requested,
    AlreadyTerminal(JobState),
    NotFound,
}

/// Drives jobs from submission to a terminal state.
#[derive(Clone)]
pub struct JobOrchestrator {
    registry: JobRegistry,
    assets: AssetStore,
    results: ResultStore,
    backend: Arc<dyn RenderBackend>,
    config: WorkerConfig,
}

impl JobOrchestrator {
    pub fn new(
        assets: AssetStore,
        results: ResultStore,
        backend: Arc<dyn RenderBackend>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            registry: JobRegistry::new(),
            assets,
            results,
            backend,
            config,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn asset_store(&self) -> &AssetStore {
        &self.assets
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn check_backend(&self) -> RenderResult<()> {
        self.backend.check_ready().await
    }

    /// Validate and start a job.
    ///
    /// On rejection every asset handed over is released, so a failed
    /// submission leaves nothing behind in scratch storage.
    pub async fn submit(&self, submission: JobSubmission) -> SubmitResult<JobId> {
        let JobSubmission {
            job_id,
            screen,
            face,
            background,
            background_color,
            layouts,
        } = submission;

        if layouts.is_empty() {
            self.release_all(&job_id, [screen, face, background].into_iter().flatten())
                .await;
            return Err(SubmitError::NoLayouts);
        }

        let provided: Vec<MediaAsset> = [&screen, &face, &background]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        let assets = match JobAssets::from_parts(screen, face, background) {
            Ok(assets) => assets,
            Err(missing) => {
                self.release_all(&job_id, provided).await;
                return Err(SubmitError::MissingAsset(missing));
            }
        };

        let backend = self.backend.name();
        let mut job = RenderJob::new(job_id.clone(), assets, background_color, layouts, backend);
        job.start();

        let (cancel, cancel_rx) = watch::channel(false);
        let progress: BTreeMap<LayoutId, ProgressReporter> = job
            .requested_layouts
            .iter()
            .map(|layout| (layout, ProgressReporter::new()))
            .collect();

        let logger = JobLogger::new(&job_id, "render");
        logger.log_start(&format!(
            "{} layout(s) on the {} backend, background {}",
            job.requested_layouts.len(),
            backend,
            job.background_color
        ));

        self.registry
            .insert(JobEntry {
                job: job.clone(),
                cancel,
                progress: progress.clone(),
            })
            .await;
        counter!(names::JOBS_SUBMITTED_TOTAL, "backend" => backend).increment(1);

        let this = self.clone();
        let span = logger.create_span();
        tokio::spawn(
            async move {
                this.run_job(job, progress, cancel_rx, logger).await;
            }
            .instrument(span),
        );

        Ok(job_id)
    }

    /// Point-in-time status of a job.
    pub async fn status(&self, job_id: &JobId) -> Option<RenderJob> {
        self.registry.snapshot(job_id).await
    }

    /// Request cancellation. Running sub-jobs fail with `RenderAborted`;
    /// cleanup still runs.
    pub async fn cancel(&self, job_id: &JobId) -> CancelOutcome {
        let outcome = self
            .registry
            .update(job_id, |entry| {
                if entry.job.state.is_terminal() {
                    CancelOutcome::AlreadyTerminal(entry.job.state)
                } else {
                    entry.cancel.send_replace(true);
                    CancelOutcome::Requested
                }
            })
            .await
            .unwrap_or(CancelOutcome::NotFound);

        if outcome == CancelOutcome::Requested {
            JobLogger::new(job_id, "render").log_warning("Cancellation requested");
        }
        outcome
    }

    /// Delete expired artifacts and forget old terminal jobs.
    /// Returns (artifacts removed, jobs pruned).
    pub async fn expire(&self, now: DateTime<Utc>) -> (usize, usize) {
        let artifacts = self.results.sweep_expired(now).await;
        let ttl = chrono::Duration::from_std(self.results.ttl()).unwrap_or_else(|_| chrono::Duration::days(1));
        let jobs = self.registry.prune_finished(now - ttl).await;
        (artifacts, jobs)
    }

    async fn run_job(
        self,
        job: RenderJob,
        progress: BTreeMap<LayoutId, ProgressReporter>,
        cancel: watch::Receiver<bool>,
        logger: JobLogger,
    ) {
        let sub_jobs = job.requested_layouts.iter().map(|layout| {
            let reporter = progress.get(&layout).cloned().unwrap_or_default();
            self.run_sub_job(&job, layout, reporter, cancel.clone(), logger.for_layout(layout))
        });

        if self.config.parallel_layouts {
            join_all(sub_jobs).await;
        } else {
            for sub_job in sub_jobs {
                sub_job.await;
            }
        }

        // Every sub-job has stopped reading the inputs.
        let mut warnings = Vec::new();
        for asset in job.assets.iter() {
            if let ReleaseOutcome::Failed(reason) = self.assets.release(&asset.storage_handle).await {
                counter!(names::CLEANUP_FAILURES_TOTAL).increment(1);
                logger.log_warning(&format!("Cleanup failed: {}", reason));
                warnings.push(reason);
            }
        }
        self.assets.remove_job_dir(&job.job_id).await;

        let finished = self
            .registry
            .update(&job.job_id, |entry| {
                for warning in warnings {
                    entry.job.record_cleanup_warning(warning);
                }
                entry.job.finalize();
                (entry.job.state, entry.job.overall_error().cloned())
            })
            .await;

        let backend = self.backend.name();
        match finished {
            Some((JobState::Complete, _)) => {
                counter!(names::JOBS_COMPLETED_TOTAL, "backend" => backend).increment(1);
                logger.log_completion("all layouts rendered");
            }
            Some((state, error)) => {
                counter!(names::JOBS_FAILED_TOTAL, "backend" => backend).increment(1);
                let cause = error.map(|e| e.to_string()).unwrap_or_else(|| state.to_string());
                logger.log_error(&format!("job failed: {}", cause));
            }
            None => logger.log_warning("job record vanished before finalization"),
        }
    }

    async fn run_sub_job(
        &self,
        job: &RenderJob,
        layout: LayoutId,
        progress: ProgressReporter,
        cancel: watch::Receiver<bool>,
        logger: JobLogger,
    ) {
        let job_id = &job.job_id;
        self.registry
            .update(job_id, |entry| entry.job.start_sub_job(layout))
            .await;
        logger.log_start("rendering");

        let started = Instant::now();
        let staged = match self.results.staging_path(job_id, layout).await {
            Ok(path) => path,
            Err(e) => {
                self.record_failure(job_id, layout, RenderError::from(e), &logger).await;
                return;
            }
        };

        let request = RenderRequest {
            job_id: job_id.clone(),
            layout: layout_for(layout),
            assets: job.assets.clone(),
            background_color: job.background_color,
            output: staged.clone(),
        };

        let outcome = match self.render_bounded(request, progress, cancel).await {
            Ok(video) => self
                .results
                .publish(job_id, layout, &video.path, video.duration_seconds)
                .await
                .map_err(RenderError::from),
            Err(e) => Err(e),
        };

        let labels = [("layout", layout.as_str()), ("backend", self.backend.name())];
        histogram!(names::RENDER_DURATION_SECONDS, &labels).record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(artifact) => {
                let bytes = artifact.byte_size;
                self.registry
                    .update(job_id, |entry| {
                        entry.settle_progress(layout);
                        entry.job.complete_sub_job(layout, artifact)
                    })
                    .await;
                logger.log_completion(&format!("{} bytes in {:.1}s", bytes, started.elapsed().as_secs_f64()));
            }
            Err(e) => {
                self.results.discard_staged(&staged).await;
                self.record_failure(job_id, layout, e, &logger).await;
            }
        }
    }

    /// Run the backend in its own task so a timeout, a cancellation or a
    /// panic still yields a terminal result.
    async fn render_bounded(
        &self,
        request: RenderRequest,
        progress: ProgressReporter,
        cancel: watch::Receiver<bool>,
    ) -> RenderResult<RenderedVideo> {
        if *cancel.borrow() {
            return Err(RenderError::Aborted);
        }

        let backend = Arc::clone(&self.backend);
        let render_cancel = cancel.clone();
        let mut task = tokio::spawn(async move { backend.render(&request, &progress, render_cancel).await });

        let timeout = self.config.render_timeout;
        tokio::select! {
            joined = &mut task => joined.unwrap_or_else(|e| {
                Err(RenderError::failed(format!("Renderer task failed: {}", e)))
            }),
            _ = tokio::time::sleep(timeout) => {
                task.abort();
                let _ = task.await;
                Err(RenderError::timeout(format!("exceeded {}s", timeout.as_secs_f64())))
            }
            _ = cancelled(cancel) => {
                task.abort();
                let _ = task.await;
                Err(RenderError::Aborted)
            }
        }
    }

    async fn record_failure(&self, job_id: &JobId, layout: LayoutId, error: RenderError, logger: &JobLogger) {
        let failure = error.to_failure();
        counter!(names::SUB_JOBS_FAILED_TOTAL, "code" => failure.code.as_str()).increment(1);
        logger.log_error(&failure.to_string());
        self.registry
            .update(job_id, |entry| {
                entry.settle_progress(layout);
                entry.job.fail_sub_job(layout, failure)
            })
            .await;
    }

    async fn release_all(&self, job_id: &JobId, assets: impl IntoIterator<Item = MediaAsset>) {
        for asset in assets {
            self.assets.release(&asset.storage_handle).await;
        }
        self.assets.remove_job_dir(job_id).await;
        info!(job_id = %job_id, "Released assets of rejected submission");
    }
}
