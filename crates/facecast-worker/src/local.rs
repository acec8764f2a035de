//! Local FFmpeg compositing renderer.

use async_trait::async_trait;
use facecast_media::{
    build_composite_command, check_ffmpeg, check_ffprobe, probe_video, CompositeInputs, FfmpegRunner,
};
use facecast_models::EncodingConfig;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::backend::{RenderBackend, RenderRequest, RenderedVideo};
use crate::error::{RenderError, RenderResult};
use crate::progress::ProgressReporter;

/// Share of the progress bar spent probing inputs.
const PROBE_PROGRESS: u8 = 5;

/// Composites every layout region with a single FFmpeg filter graph.
#[derive(Debug, Clone, Default)]
pub struct LocalFilterRenderer {
    encoding: EncodingConfig,
}

impl LocalFilterRenderer {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self { encoding }
    }
}

#[async_trait]
impl RenderBackend for LocalFilterRenderer {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn check_ready(&self) -> RenderResult<()> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(())
    }

    async fn render(
        &self,
        request: &RenderRequest,
        progress: &ProgressReporter,
        cancel: watch::Receiver<bool>,
    ) -> RenderResult<RenderedVideo> {
        self.check_ready().await?;

        let assets = &request.assets;
        let screen = probe_video(assets.screen.path()).await?;
        let face = probe_video(assets.face.path()).await?;
        // Still images probe with zero duration; decoding is all that matters here.
        probe_video(assets.background.path()).await?;
        progress.report(PROBE_PROGRESS);

        let duration = screen.duration.min(face.duration);
        if !duration.is_finite() || duration <= 0.0 {
            return Err(RenderError::unsupported_input(format!(
                "Recordings have no usable duration (screen {:.2}s, face {:.2}s)",
                screen.duration, face.duration
            )));
        }

        let layout = request.layout.resolve_reference();
        let inputs = CompositeInputs {
            screen: assets.screen.path(),
            face: assets.face.path(),
            background: assets.background.path(),
        };
        let cmd = build_composite_command(
            &inputs,
            &layout,
            &request.background_color,
            &self.encoding,
            duration,
            screen.has_audio,
            &request.output,
        );

        info!(
            job_id = %request.job_id,
            layout = %request.layout.layout_id,
            width = layout.width,
            height = layout.height,
            duration,
            "Compositing layout"
        );

        let total_ms = (duration * 1000.0) as i64;
        let reporter = progress.clone();
        FfmpegRunner::new()
            .with_cancel(cancel)
            .run_with_progress(&cmd, move |p| {
                reporter.report_stage(PROBE_PROGRESS, 99, p.percentage(total_ms) / 100.0);
            })
            .await?;

        let output = probe_video(&request.output)
            .await
            .map_err(|e| RenderError::failed(format!("Rendered output is unreadable: {}", e)))?;
        debug!(
            job_id = %request.job_id,
            duration = output.duration,
            bytes = output.size,
            "Composite written"
        );

        Ok(RenderedVideo {
            path: request.output.clone(),
            duration_seconds: output.duration,
        })
    }
}
