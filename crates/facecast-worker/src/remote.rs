//! Remote generative renderer.
//!
//! Submits one generation request described by the layout prompt, polls the
//! long-running operation, downloads the result and (when FFmpeg is present)
//! normalises it onto the layout canvas with the job's encoding settings.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use facecast_gen_client::{GenClient, GenClientConfig, GenError, GenerateVideoRequest, InlineImage, Operation};
use facecast_media::{build_normalize_command, check_ffmpeg, probe_video, FfmpegRunner};
use facecast_models::EncodingConfig;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{cancelled, RenderBackend, RenderRequest, RenderedVideo};
use crate::error::{RenderError, RenderResult};
use crate::progress::ProgressReporter;
use crate::prompt::describe_layout;
use crate::retry::{retry_async, RetryConfig, RetryResult};

/// Progress milestones.
const SUBMITTED: u8 = 10;
const GENERATED: u8 = 70;
const DOWNLOADED: u8 = 85;

/// Renders by asking a generative video model for the composition.
#[derive(Debug, Clone)]
pub struct RemoteGenerativeRenderer {
    client: Result<GenClient, String>,
    poll_interval: Duration,
    poll_retry: RetryConfig,
    clip_seconds: u32,
    encoding: EncodingConfig,
}

impl RemoteGenerativeRenderer {
    /// Never fails: a missing key or bad URL surfaces as `RendererUnavailable`
    /// on the first render, before any network call.
    pub fn new(config: GenClientConfig, encoding: EncodingConfig) -> Self {
        let poll_interval = config.poll_interval;
        let clip_seconds = config.clip_seconds;
        let poll_retry = RetryConfig::new("generation_poll")
            .with_max_retries(config.max_retries)
            .with_base_delay(poll_interval.min(Duration::from_secs(1)));

        let client = GenClient::new(config).map_err(|e| e.to_string());
        if let Err(reason) = &client {
            warn!("Remote renderer is not configured: {}", reason);
        }

        Self {
            client,
            poll_interval,
            poll_retry,
            clip_seconds,
            encoding,
        }
    }

    fn client(&self) -> RenderResult<&GenClient> {
        self.client.as_ref().map_err(|reason| RenderError::unavailable(reason.clone()))
    }

    /// Poll until the operation is done. Transient failures are retried with
    /// backoff; an exhausted budget is a timeout.
    async fn wait_for_operation(
        &self,
        client: &GenClient,
        mut operation: Operation,
        progress: &ProgressReporter,
    ) -> RenderResult<Operation> {
        let mut polls: u32 = 0;
        while !operation.done {
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;

            let name = operation.name.clone();
            operation = match retry_async(&self.poll_retry, GenError::is_retryable, || client.get_operation(&name)).await
            {
                RetryResult::Success(op) => op,
                RetryResult::Aborted(e) => return Err(e.into()),
                RetryResult::Exhausted { error, attempts } => {
                    return Err(RenderError::timeout(format!(
                        "Lost contact with the generation service after {} attempts: {}",
                        attempts, error
                    )));
                }
            };
            debug!(operation = %operation.name, polls, done = operation.done, "Polled generation");

            // The service reports no percentage; each poll nudges towards the milestone.
            progress.report_stage(SUBMITTED, GENERATED - 1, 1.0 - 0.9f64.powi(polls as i32));
        }
        Ok(operation)
    }

    async fn generate(
        &self,
        request: &RenderRequest,
        progress: &ProgressReporter,
        work_path: &Path,
    ) -> RenderResult<RenderedVideo> {
        let client = self.client()?;

        let background = &request.assets.background;
        let image_bytes = tokio::fs::read(background.path()).await.map_err(|e| {
            RenderError::unsupported_input(format!("Background image is unreadable: {}", e))
        })?;

        let generation = GenerateVideoRequest {
            prompt: describe_layout(&request.layout, &request.background_color),
            aspect_ratio: request.layout.layout_id.aspect_ratio().to_string(),
            duration_seconds: self.clip_seconds,
            reference_image: Some(InlineImage::from_bytes(&image_bytes, background.mime_type.clone())),
        };

        let operation = client.submit(&generation).await?;
        info!(
            job_id = %request.job_id,
            layout = %request.layout.layout_id,
            operation = %operation.name,
            "Generation submitted"
        );
        progress.report(SUBMITTED);

        let operation = self.wait_for_operation(client, operation, progress).await?;
        if let Some(error) = &operation.error {
            let message = format!("Generation failed ({}): {}", error.code, error.message);
            // 3 = INVALID_ARGUMENT
            return Err(if error.code == 3 {
                RenderError::unsupported_input(message)
            } else {
                RenderError::failed(message)
            });
        }
        let uri = operation
            .video_uri()
            .ok_or_else(|| RenderError::failed("Generation finished without a video"))?
            .to_string();
        progress.report(GENERATED);

        client.download_to(&uri, work_path).await?;
        progress.report(DOWNLOADED);

        Ok(RenderedVideo {
            path: work_path.to_path_buf(),
            duration_seconds: self.clip_seconds as f64,
        })
    }

    /// Re-encode onto the layout canvas, or keep the bytes as-is without FFmpeg.
    async fn normalize(
        &self,
        request: &RenderRequest,
        downloaded: RenderedVideo,
        cancel: watch::Receiver<bool>,
    ) -> RenderResult<RenderedVideo> {
        if check_ffmpeg().is_err() {
            warn!(job_id = %request.job_id, "FFmpeg not available, storing generated video as-is");
            tokio::fs::rename(&downloaded.path, &request.output).await?;
            return Ok(RenderedVideo {
                path: request.output.clone(),
                ..downloaded
            });
        }

        let info = probe_video(&downloaded.path).await?;
        let cmd = build_normalize_command(
            &downloaded.path,
            request.layout.canvas_width,
            request.layout.canvas_height,
            &request.background_color,
            &self.encoding,
            info.has_audio,
            &request.output,
        );
        FfmpegRunner::new().with_cancel(cancel).run(&cmd).await?;

        let _ = tokio::fs::remove_file(&downloaded.path).await;
        let output = probe_video(&request.output).await?;
        Ok(RenderedVideo {
            path: request.output.clone(),
            duration_seconds: output.duration,
        })
    }
}

#[async_trait]
impl RenderBackend for RemoteGenerativeRenderer {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn check_ready(&self) -> RenderResult<()> {
        self.client().map(|_| ())
    }

    async fn render(
        &self,
        request: &RenderRequest,
        progress: &ProgressReporter,
        cancel: watch::Receiver<bool>,
    ) -> RenderResult<RenderedVideo> {
        self.client()?;

        let work_path = request.output.with_extension("download.mp4");
        let outcome = tokio::select! {
            result = self.generate(request, progress, &work_path) => result,
            _ = cancelled(cancel.clone()) => Err(RenderError::Aborted),
        };

        let result = match outcome {
            Ok(downloaded) => self.normalize(request, downloaded, cancel).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            let _ = tokio::fs::remove_file(&work_path).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facecast_models::ErrorCode;

    #[tokio::test]
    async fn test_unconfigured_renderer_is_unavailable() {
        let renderer = RemoteGenerativeRenderer::new(GenClientConfig::default(), EncodingConfig::default());
        let err = renderer.check_ready().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RendererUnavailable);
    }
}
