//! Prometheus metrics for the API server.
//!
//! Job and render metrics are recorded by the worker crate; this module owns
//! the HTTP-level series and the exporter.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "facecast_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "facecast_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "facecast_http_requests_in_flight";

    // Uploads
    pub const UPLOAD_BYTES_TOTAL: &str = "facecast_upload_bytes_total";
    pub const SUBMISSIONS_REJECTED_TOTAL: &str = "facecast_submissions_rejected_total";

    // Delivery
    pub const ARTIFACT_DOWNLOADS_TOTAL: &str = "facecast_artifact_downloads_total";

    // Expiry
    pub const ARTIFACTS_EXPIRED_TOTAL: &str = "facecast_artifacts_expired_total";

    // Rate limiting
    pub const RATE_LIMIT_HITS_TOTAL: &str = "facecast_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", route.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record bytes received for one uploaded asset.
pub fn record_upload(kind: &str, bytes: usize) {
    counter!(names::UPLOAD_BYTES_TOTAL, "kind" => kind.to_string()).increment(bytes as u64);
}

/// Record a submission rejected before any job was created.
pub fn record_rejection(code: &str) {
    counter!(names::SUBMISSIONS_REJECTED_TOTAL, "code" => code.to_string()).increment(1);
}

pub fn record_download(layout: &str, via: &'static str) {
    counter!(names::ARTIFACT_DOWNLOADS_TOTAL, "layout" => layout.to_string(), "via" => via).increment(1);
}

pub fn record_expired(artifacts: usize) {
    counter!(names::ARTIFACTS_EXPIRED_TOTAL).increment(artifacts as u64);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", route_label(endpoint, None))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Label for a request path. The matched route template is preferred so job
/// ids and tokens never become label values.
fn route_label(path: &str, matched: Option<&str>) -> String {
    if let Some(route) = matched {
        return route.to_string();
    }
    if path.starts_with("/api/") {
        "/api/:unmatched".to_string()
    } else {
        path.to_string()
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let matched = request.extensions().get::<MatchedPath>().map(|p| p.as_str().to_string());
    let route = route_label(request.uri().path(), matched.as_deref());
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    record_http_request(&method, &route, status, start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_label() {
        assert_eq!(
            route_label("/api/jobs/550e8400-e29b-41d4-a716-446655440000", Some("/api/jobs/:job_id")),
            "/api/jobs/:job_id"
        );
        assert_eq!(route_label("/api/artifacts/abc.def", None), "/api/:unmatched");
        assert_eq!(route_label("/health", None), "/health");
    }
}
