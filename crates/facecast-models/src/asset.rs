//! Uploaded media assets.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which input slot an upload fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    ScreenRecording,
    FaceRecording,
    BackgroundImage,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [
        MediaKind::ScreenRecording,
        MediaKind::FaceRecording,
        MediaKind::BackgroundImage,
    ];

    /// Short name used in scratch file names.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            MediaKind::ScreenRecording => "screen",
            MediaKind::FaceRecording => "face",
            MediaKind::BackgroundImage => "bg",
        }
    }

    /// Media category the declared MIME type must belong to.
    pub fn expected_category(&self) -> MediaCategory {
        match self {
            MediaKind::ScreenRecording | MediaKind::FaceRecording => MediaCategory::Video,
            MediaKind::BackgroundImage => MediaCategory::Image,
        }
    }

    /// Whether a declared MIME type is acceptable for this slot.
    pub fn accepts_mime(&self, mime_type: &str) -> bool {
        MediaCategory::of_mime(mime_type) == Some(self.expected_category())
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaKind::ScreenRecording => "screen_recording",
            MediaKind::FaceRecording => "face_recording",
            MediaKind::BackgroundImage => "background_image",
        })
    }
}

/// Top-level MIME category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    Video,
    Image,
}

impl MediaCategory {
    /// Category of a MIME type such as `video/mp4` (parameters are ignored).
    pub fn of_mime(mime_type: &str) -> Option<Self> {
        let essence = mime_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let (top, sub) = essence.split_once('/')?;
        if sub.is_empty() {
            return None;
        }
        match top {
            "video" => Some(MediaCategory::Video),
            "image" => Some(MediaCategory::Image),
            _ => None,
        }
    }
}

/// Opaque reference to bytes on scratch storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AssetHandle(pub String);

impl AssetHandle {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().to_string_lossy().to_string())
    }

    pub fn as_path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One uploaded input persisted to scratch storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaAsset {
    pub kind: MediaKind,
    pub mime_type: String,
    pub byte_size: u64,
    pub storage_handle: AssetHandle,
    pub created_at: DateTime<Utc>,
}

impl MediaAsset {
    pub fn path(&self) -> PathBuf {
        self.storage_handle.as_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_categories() {
        assert_eq!(MediaCategory::of_mime("video/mp4"), Some(MediaCategory::Video));
        assert_eq!(MediaCategory::of_mime("Image/JPEG"), Some(MediaCategory::Image));
        assert_eq!(MediaCategory::of_mime("video/webm; codecs=vp9"), Some(MediaCategory::Video));
        assert_eq!(MediaCategory::of_mime("application/octet-stream"), None);
        assert_eq!(MediaCategory::of_mime("video"), None);
        assert_eq!(MediaCategory::of_mime("video/"), None);
    }

    #[test]
    fn test_kind_accepts_matching_category() {
        assert!(MediaKind::ScreenRecording.accepts_mime("video/mp4"));
        assert!(MediaKind::FaceRecording.accepts_mime("video/quicktime"));
        assert!(MediaKind::BackgroundImage.accepts_mime("image/png"));
        assert!(!MediaKind::BackgroundImage.accepts_mime("video/mp4"));
        assert!(!MediaKind::ScreenRecording.accepts_mime("image/jpeg"));
    }
}
