//! Health check handlers.

use std::future::Future;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub backend: String,
    pub active_jobs: usize,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub renderer: CheckStatus,
    pub scratch: CheckStatus,
    pub public: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

impl CheckStatus {
    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

async fn timed<E: std::fmt::Display>(check: impl Future<Output = Result<(), E>>) -> CheckStatus {
    let start = Instant::now();
    let result = check.await;
    let latency_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(()) => CheckStatus {
            status: "ok".to_string(),
            error: None,
            latency_ms,
        },
        Err(e) => CheckStatus {
            status: "error".to_string(),
            error: Some(e.to_string()),
            latency_ms,
        },
    }
}

/// Readiness check endpoint.
///
/// The renderer check is FFmpeg/ffprobe on PATH for the local backend and
/// credential presence for the remote one. Both storage namespaces must be
/// writable.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let orchestrator = &state.orchestrator;
    let (renderer, scratch, public) = tokio::join!(
        timed(orchestrator.check_backend()),
        timed(orchestrator.asset_store().check_writable()),
        timed(orchestrator.results().check_writable()),
    );

    let all_ok = renderer.is_ok() && scratch.is_ok() && public.is_ok();
    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        backend: orchestrator.backend_name().to_string(),
        active_jobs: orchestrator.registry().active_count().await,
        checks: ReadinessChecks {
            renderer,
            scratch,
            public,
        },
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
