//! HTTP behaviour of the generative client against a mock server.

use std::time::Duration;

use facecast_gen_client::{GenClient, GenClientConfig, GenError, GenerateVideoRequest};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> GenClientConfig {
    GenClientConfig {
        api_key: Some("test-key".to_string()),
        base_url: server.uri(),
        model: "veo-test".to_string(),
        timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(10),
        max_retries: 2,
        clip_seconds: 5,
    }
}

fn request() -> GenerateVideoRequest {
    GenerateVideoRequest {
        prompt: "a screen recording with a face".to_string(),
        aspect_ratio: "16:9".to_string(),
        duration_seconds: 5,
        reference_image: None,
    }
}

#[tokio::test]
async fn test_submit_sends_key_and_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/veo-test:predictLongRunning"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({"parameters": {"aspectRatio": "16:9", "durationSeconds": 5}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "models/veo-test/operations/op1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = GenClient::new(config(&server)).unwrap();
    let op = client.submit(&request()).await.unwrap();
    assert_eq!(op.name, "models/veo-test/operations/op1");
    assert!(!op.done);
}

#[tokio::test]
async fn test_submit_retries_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "operations/op2"})))
        .mount(&server)
        .await;

    let client = GenClient::new(config(&server)).unwrap();
    let op = client.submit(&request()).await.unwrap();
    assert_eq!(op.name, "operations/op2");
}

#[tokio::test]
async fn test_submit_does_not_retry_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .expect(1)
        .mount(&server)
        .await;

    let client = GenClient::new(config(&server)).unwrap();
    let err = client.submit(&request()).await.unwrap_err();
    assert!(matches!(err, GenError::RequestFailed { status: 403, .. }));
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_get_operation_done_with_video() {
    let server = MockServer::start().await;
    let video_uri = format!("{}/files/abc:download", server.uri());
    Mock::given(method("GET"))
        .and(path("/operations/op1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/op1",
            "done": true,
            "response": {"generateVideoResponse": {"generatedSamples": [{"video": {"uri": video_uri}}]}}
        })))
        .mount(&server)
        .await;

    let client = GenClient::new(config(&server)).unwrap();
    let op = client.get_operation("operations/op1").await.unwrap();
    assert!(op.done);
    assert_eq!(op.video_uri(), Some(video_uri.as_str()));
}

#[tokio::test]
async fn test_download_streams_to_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/abc:download"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake mp4".to_vec()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("gen.mp4");
    let client = GenClient::new(config(&server)).unwrap();
    let written = client
        .download_to(&format!("{}/files/abc:download", server.uri()), &dest)
        .await
        .unwrap();

    assert_eq!(written, 8);
    assert_eq!(std::fs::read(&dest).unwrap(), b"fake mp4");
}

#[tokio::test]
async fn test_empty_download_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = GenClient::new(config(&server)).unwrap();
    let err = client
        .download_to(&format!("{}/files/empty", server.uri()), &dir.path().join("x.mp4"))
        .await
        .unwrap_err();
    assert!(matches!(err, GenError::InvalidResponse(_)));
}
