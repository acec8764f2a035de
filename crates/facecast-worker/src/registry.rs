//! In-memory job records.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use facecast_models::{JobId, LayoutId, RenderJob};
use tokio::sync::{watch, RwLock};

use crate::progress::ProgressReporter;

/// A job record plus the handles the orchestrator drives it with.
#[derive(Debug)]
pub(crate) struct JobEntry {
    pub job: RenderJob,
    pub cancel: watch::Sender<bool>,
    pub progress: BTreeMap<LayoutId, ProgressReporter>,
}

impl JobEntry {
    /// Job record with live progress folded in.
    fn snapshot(&self) -> RenderJob {
        let mut job = self.job.clone();
        for (layout, reporter) in &self.progress {
            job.record_progress(*layout, reporter.current());
        }
        job
    }

    /// Persist a layout's live progress on the record. Must run before the
    /// layout turns terminal, after which progress updates are ignored.
    pub fn settle_progress(&mut self, layout: LayoutId) {
        if let Some(reporter) = self.progress.get(&layout) {
            self.job.record_progress(layout, reporter.current());
        }
    }
}

/// Shared registry of jobs, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn insert(&self, entry: JobEntry) {
        self.jobs.write().await.insert(entry.job.job_id.clone(), entry);
    }

    /// Point-in-time copy of a job.
    pub async fn snapshot(&self, job_id: &JobId) -> Option<RenderJob> {
        self.jobs.read().await.get(job_id).map(JobEntry::snapshot)
    }

    /// Apply `f` to a job record under the write lock.
    pub(crate) async fn update<R>(&self, job_id: &JobId, f: impl FnOnce(&mut JobEntry) -> R) -> Option<R> {
        self.jobs.write().await.get_mut(job_id).map(f)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Count of jobs not yet terminal.
    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|e| !e.job.state.is_terminal())
            .count()
    }

    /// Drop terminal jobs that completed before `cutoff`. Returns how many were removed.
    pub async fn prune_finished(&self, cutoff: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, e| {
            !(e.job.state.is_terminal() && e.job.completed_at.map(|t| t < cutoff).unwrap_or(false))
        });
        before - jobs.len()
    }
}
