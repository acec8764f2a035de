//! Published artifacts.
//!
//! Artifacts live at `{public_dir}/{job_id}_{layout}.mp4`. Renderers write
//! into a staging directory first and [`ResultStore::publish`] moves the file
//! into place, so a half-written file is never visible at the public path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use facecast_models::{JobId, LayoutId, RenderArtifact};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::fs_utils::{ensure_writable, move_file};

const STAGING_DIR: &str = ".staging";

/// Owns produced artifacts independently of job records.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
    ttl: Duration,
    index: Arc<RwLock<HashMap<(JobId, LayoutId), RenderArtifact>>>,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            root: root.into(),
            ttl,
            index: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Deterministic public path for an artifact.
    pub fn artifact_path(&self, job_id: &JobId, layout: LayoutId) -> PathBuf {
        self.root.join(artifact_file_name(job_id, layout))
    }

    /// Path a renderer should write to before publishing.
    pub async fn staging_path(&self, job_id: &JobId, layout: LayoutId) -> StorageResult<PathBuf> {
        let dir = self.root.join(STAGING_DIR);
        fs::create_dir_all(&dir).await?;
        Ok(dir.join(format!("{}_{}.{}.mp4", job_id, layout, uuid::Uuid::new_v4().simple())))
    }

    /// Move a staged file to its public path and record it.
    pub async fn publish(
        &self,
        job_id: &JobId,
        layout: LayoutId,
        staged: &Path,
        duration_seconds: f64,
    ) -> StorageResult<RenderArtifact> {
        let dest = self.artifact_path(job_id, layout);
        move_file(staged, &dest).await?;

        let byte_size = fs::metadata(&dest).await?.len();
        let artifact = RenderArtifact {
            job_id: job_id.clone(),
            layout_id: layout,
            storage_handle: dest.to_string_lossy().to_string(),
            byte_size,
            duration_seconds,
            produced_at: Utc::now(),
        };

        self.index
            .write()
            .await
            .insert((job_id.clone(), layout), artifact.clone());

        info!(
            job_id = %job_id,
            layout = %layout,
            bytes = byte_size,
            path = %dest.display(),
            "Published artifact"
        );
        Ok(artifact)
    }

    /// Best-effort removal of a staged file that will not be published.
    pub async fn discard_staged(&self, staged: &Path) {
        match fs::remove_file(staged).await {
            Ok(()) => debug!(path = %staged.display(), "Discarded staged output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %staged.display(), error = %e, "Failed to discard staged output"),
        }
    }

    /// Look up a published artifact that is still on disk.
    pub async fn get(&self, job_id: &JobId, layout: LayoutId) -> Option<RenderArtifact> {
        let artifact = self
            .index
            .read()
            .await
            .get(&(job_id.clone(), layout))
            .cloned()?;

        if fs::try_exists(&artifact.storage_handle).await.unwrap_or(false) {
            Some(artifact)
        } else {
            None
        }
    }

    /// Open a published artifact for streaming.
    pub async fn open(&self, job_id: &JobId, layout: LayoutId) -> StorageResult<(RenderArtifact, fs::File)> {
        let artifact = self
            .get(job_id, layout)
            .await
            .ok_or_else(|| StorageError::not_found(artifact_file_name(job_id, layout)))?;

        match fs::File::open(&artifact.storage_handle).await {
            Ok(file) => Ok((artifact, file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(artifact_file_name(job_id, layout)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete artifacts older than the TTL, plus stale staging files.
    /// Returns the number of artifacts removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::days(365 * 100));

        let expired: Vec<((JobId, LayoutId), RenderArtifact)> = {
            let mut index = self.index.write().await;
            let keys: Vec<_> = index
                .iter()
                .filter(|(_, a)| now.signed_duration_since(a.produced_at) >= ttl)
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter()
                .filter_map(|k| index.remove(&k).map(|a| (k, a)))
                .collect()
        };

        for ((job_id, layout), artifact) in &expired {
            match fs::remove_file(&artifact.storage_handle).await {
                Ok(()) => debug!(job_id = %job_id, layout = %layout, "Expired artifact removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(job_id = %job_id, layout = %layout, error = %e, "Failed to remove expired artifact"),
            }
        }

        self.sweep_staging(now, ttl).await;

        if !expired.is_empty() {
            info!(count = expired.len(), "Swept expired artifacts");
        }
        expired.len()
    }

    async fn sweep_staging(&self, now: DateTime<Utc>, ttl: chrono::Duration) {
        let dir = self.root.join(STAGING_DIR);
        let Ok(mut entries) = fs::read_dir(&dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
                continue;
            };
            let modified: DateTime<Utc> = modified.into();
            if now.signed_duration_since(modified) >= ttl {
                let _ = fs::remove_file(entry.path()).await;
            }
        }
    }

    /// Readiness probe.
    pub async fn check_writable(&self) -> StorageResult<()> {
        ensure_writable(&self.root).await
    }
}

fn artifact_file_name(job_id: &JobId, layout: LayoutId) -> String {
    format!("{}_{}.mp4", job_id, layout)
}
