//! Scratch storage for uploaded inputs.
//!
//! Every job gets its own directory under the scratch root, so concurrent
//! jobs never share a path. Files are named `{prefix}_{timestamp_ms}.{ext}`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use facecast_models::{AssetHandle, JobId, MediaAsset, MediaKind};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::fs_utils::ensure_writable;

/// Outcome of a best-effort release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// Nothing to delete; not an error.
    AlreadyGone,
    /// Deletion failed. Logged, never escalated.
    Failed(String),
}

impl ReleaseOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ReleaseOutcome::Failed(_))
    }
}

/// Persists uploads and hands out handles valid for one job.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one job's inputs.
    pub fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.as_str())
    }

    /// Validate and persist one upload.
    ///
    /// Fails with `InvalidMediaKind` when the declared type's category does not
    /// match `kind`, and with `EmptyPayload` for zero bytes. Nothing is written
    /// on failure.
    pub async fn ingest(
        &self,
        job_id: &JobId,
        kind: MediaKind,
        bytes: &[u8],
        declared_mime_type: &str,
    ) -> StorageResult<MediaAsset> {
        if !kind.accepts_mime(declared_mime_type) {
            return Err(StorageError::InvalidMediaKind {
                kind,
                mime_type: declared_mime_type.to_string(),
            });
        }
        if bytes.is_empty() {
            return Err(StorageError::EmptyPayload(kind));
        }

        let dir = self.job_dir(job_id);
        fs::create_dir_all(&dir).await?;

        let stamp = Utc::now().timestamp_millis();
        let ext = extension_for(declared_mime_type);
        let (path, mut file) = create_unique(&dir, kind.file_prefix(), stamp, ext).await?;

        if let Err(e) = write_all(&mut file, bytes).await {
            drop(file);
            let _ = fs::remove_file(&path).await;
            return Err(e);
        }

        debug!(
            job_id = %job_id,
            kind = %kind,
            bytes = bytes.len(),
            path = %path.display(),
            "Ingested asset"
        );

        Ok(MediaAsset {
            kind,
            mime_type: declared_mime_type.to_string(),
            byte_size: bytes.len() as u64,
            storage_handle: AssetHandle::from_path(&path),
            created_at: Utc::now(),
        })
    }

    /// Best-effort delete. Never returns an error; a missing file counts as released.
    pub async fn release(&self, handle: &AssetHandle) -> ReleaseOutcome {
        let path = handle.as_path();

        if !path.starts_with(&self.root) {
            warn!(handle = %handle, "Refusing to release a path outside the scratch root");
            return ReleaseOutcome::Failed(format!("{} is outside the scratch namespace", handle));
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(handle = %handle, "Released asset");
                ReleaseOutcome::Released
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(handle = %handle, "Asset already removed");
                ReleaseOutcome::AlreadyGone
            }
            Err(e) => {
                warn!(handle = %handle, error = %e, "Failed to release asset");
                ReleaseOutcome::Failed(format!("{}: {}", handle, e))
            }
        }
    }

    /// Remove a job's scratch directory if it is empty.
    pub async fn remove_job_dir(&self, job_id: &JobId) {
        let dir = self.job_dir(job_id);
        match fs::remove_dir(&dir).await {
            Ok(()) => info!(job_id = %job_id, "Removed scratch directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => debug!(job_id = %job_id, error = %e, "Scratch directory left in place"),
        }
    }

    /// Readiness probe.
    pub async fn check_writable(&self) -> StorageResult<()> {
        ensure_writable(&self.root).await
    }
}

async fn write_all(file: &mut fs::File, bytes: &[u8]) -> StorageResult<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

/// Create a new file, adding a counter when the timestamped name is taken.
async fn create_unique(
    dir: &Path,
    prefix: &str,
    stamp: i64,
    ext: &str,
) -> StorageResult<(PathBuf, fs::File)> {
    for attempt in 0..100u32 {
        let name = if attempt == 0 {
            format!("{}_{}.{}", prefix, stamp, ext)
        } else {
            format!("{}_{}_{}.{}", prefix, stamp, attempt, ext)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(StorageError::InvalidKey(format!(
        "Could not allocate a unique name for {} in {}",
        prefix,
        dir.display()
    )))
}

/// File extension for a declared MIME type.
fn extension_for(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ if essence.starts_with("video/") => "video",
        _ => "img",
    }
}
