//! Request and operation types.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// What to generate.
#[derive(Debug, Clone)]
pub struct GenerateVideoRequest {
    pub prompt: String,
    /// e.g. `9:16`
    pub aspect_ratio: String,
    pub duration_seconds: u32,
    /// Optional conditioning image.
    pub reference_image: Option<InlineImage>,
}

/// An image sent inline as base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub bytes_base64_encoded: String,
    pub mime_type: String,
}

impl InlineImage {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            bytes_base64_encoded: STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }
}

/// Wire body for `:predictLongRunning`.
#[derive(Debug, Serialize)]
pub(crate) struct PredictRequest<'a> {
    pub instances: Vec<PredictInstance<'a>>,
    pub parameters: PredictParameters<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PredictInstance<'a> {
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<&'a InlineImage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PredictParameters<'a> {
    pub aspect_ratio: &'a str,
    pub duration_seconds: u32,
    pub sample_count: u32,
}

impl<'a> From<&'a GenerateVideoRequest> for PredictRequest<'a> {
    fn from(req: &'a GenerateVideoRequest) -> Self {
        Self {
            instances: vec![PredictInstance {
                prompt: &req.prompt,
                image: req.reference_image.as_ref(),
            }],
            parameters: PredictParameters {
                aspect_ratio: &req.aspect_ratio,
                duration_seconds: req.duration_seconds,
                sample_count: 1,
            },
        }
    }
}

/// A long-running operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<OperationResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    #[serde(default)]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedSample {
    pub video: Option<GeneratedVideo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedVideo {
    pub uri: Option<String>,
}

impl Operation {
    /// URI of the first generated video, if the operation produced one.
    pub fn video_uri(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .iter()
            .find_map(|s| s.video.as_ref()?.uri.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_body_shape() {
        let req = GenerateVideoRequest {
            prompt: "compose".to_string(),
            aspect_ratio: "9:16".to_string(),
            duration_seconds: 5,
            reference_image: Some(InlineImage::from_bytes(b"img", "image/png")),
        };
        let body = serde_json::to_value(PredictRequest::from(&req)).unwrap();
        assert_eq!(body["instances"][0]["prompt"], "compose");
        assert_eq!(body["instances"][0]["image"]["mimeType"], "image/png");
        assert_eq!(body["instances"][0]["image"]["bytesBase64Encoded"], "aW1n");
        assert_eq!(body["parameters"]["aspectRatio"], "9:16");
        assert_eq!(body["parameters"]["durationSeconds"], 5);
    }

    #[test]
    fn test_operation_video_uri() {
        let op: Operation = serde_json::from_str(
            r#"{"name":"operations/1","done":true,"response":{"generateVideoResponse":
                {"generatedSamples":[{"video":{"uri":"https://files/abc:download"}}]}}}"#,
        )
        .unwrap();
        assert_eq!(op.video_uri(), Some("https://files/abc:download"));

        let pending: Operation = serde_json::from_str(r#"{"name":"operations/1"}"#).unwrap();
        assert!(!pending.done);
        assert!(pending.video_uri().is_none());
    }
}
