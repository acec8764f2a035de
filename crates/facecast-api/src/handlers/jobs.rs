//! Job submission, status and cancellation handlers.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use facecast_models::{
    ErrorCode, HexColor, JobFailure, JobId, JobState, LayoutId, LayoutSelection, MediaAsset, MediaKind,
    RenderArtifact, RenderJob, SubJobState,
};
use facecast_storage::{AssetStore, DeliveryConfig};
use facecast_worker::{CancelOutcome, JobSubmission};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{from_ingest, ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: String,
    pub state: JobState,
    pub layouts: Vec<LayoutId>,
    pub status_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelJobResponse {
    pub job_id: String,
    pub cancel_requested: bool,
}

/// Download descriptor for one finished layout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResponse {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    pub byte_size: u64,
    pub duration_seconds: f64,
    pub produced_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutStatusResponse {
    pub state: SubJobState,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactResponse>,
}

/// Status snapshot of a job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub state: JobState,
    pub progress: u8,
    pub backend: String,
    pub background_color: HexColor,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub layouts: BTreeMap<LayoutId, LayoutStatusResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup_warnings: Vec<String>,
}

impl JobStatusResponse {
    pub fn from_job(job: RenderJob, delivery: &DeliveryConfig) -> Self {
        let progress = job.overall_progress();
        let error = job.overall_error().cloned();
        let layouts = job
            .sub_jobs
            .into_iter()
            .map(|(layout, status)| {
                let artifact = status.artifact.as_ref().map(|a| artifact_response(a, delivery));
                (
                    layout,
                    LayoutStatusResponse {
                        state: status.state,
                        progress: status.progress,
                        error: status.error,
                        artifact,
                    },
                )
            })
            .collect();

        Self {
            job_id: job.job_id.to_string(),
            state: job.state,
            progress,
            backend: job.backend,
            background_color: job.background_color,
            created_at: job.created_at,
            completed_at: job.completed_at,
            error,
            layouts,
            cleanup_warnings: job.cleanup_warnings,
        }
    }
}

fn artifact_response(artifact: &RenderArtifact, delivery: &DeliveryConfig) -> ArtifactResponse {
    let token = match delivery.issue(&artifact.job_id, artifact.layout_id) {
        Ok(token) => Some(token),
        Err(e) => {
            warn!(job_id = %artifact.job_id, error = %e, "Failed to issue artifact token");
            None
        }
    };

    ArtifactResponse {
        url: format!("/api/jobs/{}/artifacts/{}", artifact.job_id, artifact.layout_id),
        token_url: token.as_ref().map(|t| format!("/api/artifacts/{}", t)),
        token,
        byte_size: artifact.byte_size,
        duration_seconds: artifact.duration_seconds,
        produced_at: artifact.produced_at,
    }
}

// ============================================================================
// Submission
// ============================================================================

/// One file part of the submission form.
struct Upload {
    bytes: Bytes,
    mime_type: String,
}

/// Parts collected from the multipart form.
#[derive(Default)]
struct SubmissionForm {
    screen: Option<Upload>,
    face: Option<Upload>,
    background: Option<Upload>,
    color: Option<String>,
    format: Option<String>,
}

impl SubmissionForm {
    fn slot(&mut self, kind: MediaKind) -> &mut Option<Upload> {
        match kind {
            MediaKind::ScreenRecording => &mut self.screen,
            MediaKind::FaceRecording => &mut self.face,
            MediaKind::BackgroundImage => &mut self.background,
        }
    }

    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "screen" => *form.slot(MediaKind::ScreenRecording) = Some(read_upload(field).await?),
                "face" => *form.slot(MediaKind::FaceRecording) = Some(read_upload(field).await?),
                "background" | "bg" => *form.slot(MediaKind::BackgroundImage) = Some(read_upload(field).await?),
                "color" => form.color = Some(read_text(field).await?),
                "format" => form.format = Some(read_text(field).await?),
                other => warn!(field = other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    /// The first required asset the form lacks.
    fn missing_asset(&self) -> Option<MediaKind> {
        [
            (MediaKind::ScreenRecording, &self.screen),
            (MediaKind::FaceRecording, &self.face),
            (MediaKind::BackgroundImage, &self.background),
        ]
        .into_iter()
        .find_map(|(kind, upload)| upload.is_none().then_some(kind))
    }
}

async fn read_upload(field: Field<'_>) -> ApiResult<Upload> {
    let mime_type = declared_mime(field.content_type(), field.file_name());
    let bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
    Ok(Upload { bytes, mime_type })
}

async fn read_text(field: Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read form field: {}", e)))
}

/// The part's declared type, or one inferred from its file name when the
/// client sent none.
fn declared_mime(content_type: Option<&str>, file_name: Option<&str>) -> String {
    if let Some(ct) = content_type.filter(|ct| !ct.is_empty() && *ct != "application/octet-stream") {
        return ct.to_string();
    }
    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Persist all three uploads. On any failure the ones already written are
/// released and the error is returned.
async fn ingest_all(store: &AssetStore, job_id: &JobId, form: &mut SubmissionForm) -> ApiResult<Vec<MediaAsset>> {
    let mut ingested = Vec::with_capacity(MediaKind::ALL.len());

    for kind in MediaKind::ALL {
        let Some(upload) = form.slot(kind).take() else {
            continue;
        };
        metrics::record_upload(kind.file_prefix(), upload.bytes.len());

        match store.ingest(job_id, kind, &upload.bytes, &upload.mime_type).await {
            Ok(asset) => ingested.push(asset),
            Err(e) => {
                for asset in &ingested {
                    store.release(&asset.storage_handle).await;
                }
                store.remove_job_dir(job_id).await;
                return Err(from_ingest(e));
            }
        }
    }

    Ok(ingested)
}

fn reject(err: ApiError) -> ApiError {
    if let Some(code) = err.code() {
        metrics::record_rejection(code.as_str());
    }
    err
}

/// Submit a job.
///
/// POST /api/jobs (multipart: screen, face, background|bg, color, format)
///
/// Presence of all three assets and the scalar fields are validated before
/// anything is written to scratch storage.
pub async fn create_job(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let mut form = SubmissionForm::read(multipart).await?;

    if let Some(kind) = form.missing_asset() {
        return Err(reject(ApiError::validation(
            ErrorCode::MissingAsset,
            format!("Missing required asset: {}", kind),
        )));
    }

    let background_color = match form.color.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(raw) => HexColor::parse(raw).map_err(|e| reject(ApiError::validation(ErrorCode::InvalidColor, e.to_string())))?,
        None => HexColor::BLACK,
    };

    let layouts = LayoutSelection::parse(form.format.as_deref().unwrap_or_default())
        .map_err(|e| reject(ApiError::validation(ErrorCode::InvalidFormat, e)))?;

    let job_id = JobId::new();
    let store = state.orchestrator.asset_store();
    let mut assets = ingest_all(store, &job_id, &mut form).await.map_err(reject)?.into_iter();

    let submission = JobSubmission {
        job_id: job_id.clone(),
        screen: assets.next(),
        face: assets.next(),
        background: assets.next(),
        background_color,
        layouts: layouts.clone(),
    };
    let job_id = state
        .orchestrator
        .submit(submission)
        .await
        .map_err(|e| reject(ApiError::from(e)))?;

    info!(job_id = %job_id, color = %background_color, layouts = layouts.len(), "Job accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse {
            status_url: format!("/api/jobs/{}", job_id),
            job_id: job_id.to_string(),
            state: JobState::Running,
            layouts: layouts.iter().collect(),
        }),
    ))
}

// ============================================================================
// Status and cancellation
// ============================================================================

/// GET /api/jobs/:job_id
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Json<JobStatusResponse>> {
    let job_id = JobId::from_string(job_id);
    let job = state
        .orchestrator
        .status(&job_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Job {} not found", job_id)))?;

    Ok(Json(JobStatusResponse::from_job(job, &state.delivery)))
}

/// DELETE /api/jobs/:job_id
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<(StatusCode, Json<CancelJobResponse>)> {
    let job_id = JobId::from_string(job_id);

    match state.orchestrator.cancel(&job_id).await {
        CancelOutcome::Requested => Ok((
            StatusCode::ACCEPTED,
            Json(CancelJobResponse {
                job_id: job_id.to_string(),
                cancel_requested: true,
            }),
        )),
        CancelOutcome::AlreadyTerminal(job_state) => Err(ApiError::conflict(format!(
            "Job {} already finished as {}",
            job_id, job_state
        ))),
        CancelOutcome::NotFound => Err(ApiError::not_found(format!("Job {} not found", job_id))),
    }
}
