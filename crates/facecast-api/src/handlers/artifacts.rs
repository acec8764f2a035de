//! Artifact download handlers.
//!
//! Finished videos are streamed from the public namespace in fixed-size
//! chunks; range requests are not supported.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use facecast_models::{ErrorCode, JobId, LayoutId, RenderArtifact};
use facecast_storage::StorageError;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// GET /api/jobs/:job_id/artifacts/:layout_id
///
/// 404 until the layout's artifact is published, when that layout failed,
/// and after the artifact expired.
pub async fn download_artifact(
    State(state): State<AppState>,
    Path((job_id, layout_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let layout: LayoutId = layout_id
        .parse()
        .map_err(|e: String| ApiError::validation(ErrorCode::InvalidFormat, e))?;

    let response = serve(&state, &JobId::from_string(job_id), layout).await?;
    metrics::record_download(layout.as_str(), "job");
    Ok(response)
}

/// GET /api/artifacts/:token
///
/// Forged, malformed and expired tokens are indistinguishable from a
/// missing artifact.
pub async fn download_by_token(State(state): State<AppState>, Path(token): Path<String>) -> ApiResult<Response> {
    let token = state
        .delivery
        .verify(&token)?
        .ok_or_else(|| ApiError::not_found("Artifact not available"))?;

    let response = serve(&state, &token.job_id(), token.layout).await?;
    metrics::record_download(token.layout.as_str(), "token");
    Ok(response)
}

async fn serve(state: &AppState, job_id: &JobId, layout: LayoutId) -> ApiResult<Response> {
    let (artifact, file) = state
        .orchestrator
        .results()
        .open(job_id, layout)
        .await
        .map_err(|e| match e {
            StorageError::NotFound(_) => ApiError::not_found("Artifact not available"),
            other => ApiError::Storage(other),
        })?;

    stream_artifact(&artifact, file).await
}

async fn stream_artifact(artifact: &RenderArtifact, file: File) -> ApiResult<Response> {
    let length = file.metadata().await.map_err(StorageError::from)?.len();
    debug!(job_id = %artifact.job_id, layout = %artifact.layout_id, bytes = length, "Streaming artifact");

    let disposition = format!(
        "attachment; filename=\"{}_{}.mp4\"",
        artifact.job_id, artifact.layout_id
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, length)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}
