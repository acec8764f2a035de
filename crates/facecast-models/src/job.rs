//! Render job records and their state machine.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::{MediaAsset, MediaKind};
use crate::color::HexColor;
use crate::error_code::JobFailure;
use crate::layout::LayoutId;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Overall job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Submitted,
    Running,
    Complete,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitted => "submitted",
            JobState::Running => "running",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one per-layout sub-job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubJobState {
    #[default]
    Pending,
    Running,
    Complete,
    Failed,
}

impl SubJobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubJobState::Complete | SubJobState::Failed)
    }
}

/// The set of layouts a job renders. Iterates in `LayoutId` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LayoutSelection(BTreeSet<LayoutId>);

impl LayoutSelection {
    pub fn new(layouts: impl IntoIterator<Item = LayoutId>) -> Self {
        Self(layouts.into_iter().collect())
    }

    pub fn both() -> Self {
        Self::new(LayoutId::ALL)
    }

    /// Parse a `format` value: `vertical`, `horizontal`, `both`, or the aliases
    /// `short` / `long`. Empty input means `both`.
    pub fn parse(format: &str) -> Result<Self, String> {
        let normalized = format.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" | "both" => Ok(Self::both()),
            other => other.parse::<LayoutId>().map(|id| Self::new([id])),
        }
    }

    pub fn contains(&self, layout: LayoutId) -> bool {
        self.0.contains(&layout)
    }

    pub fn iter(&self) -> impl Iterator<Item = LayoutId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for LayoutSelection {
    fn default() -> Self {
        Self::both()
    }
}

/// One finished output video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderArtifact {
    pub job_id: JobId,
    pub layout_id: LayoutId,
    /// Location in the public artifact namespace.
    pub storage_handle: String,
    pub byte_size: u64,
    pub duration_seconds: f64,
    pub produced_at: DateTime<Utc>,
}

/// Progress and outcome of one sub-job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SubJobStatus {
    pub state: SubJobState,
    /// 0-100, never decreases.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<RenderArtifact>,
}

/// The three inputs every job owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobAssets {
    pub screen: MediaAsset,
    pub face: MediaAsset,
    pub background: MediaAsset,
}

impl JobAssets {
    /// Assemble from optional parts. Returns the first missing kind on failure.
    pub fn from_parts(
        screen: Option<MediaAsset>,
        face: Option<MediaAsset>,
        background: Option<MediaAsset>,
    ) -> Result<Self, MediaKind> {
        Ok(Self {
            screen: screen.ok_or(MediaKind::ScreenRecording)?,
            face: face.ok_or(MediaKind::FaceRecording)?,
            background: background.ok_or(MediaKind::BackgroundImage)?,
        })
    }

    pub fn get(&self, kind: MediaKind) -> &MediaAsset {
        match kind {
            MediaKind::ScreenRecording => &self.screen,
            MediaKind::FaceRecording => &self.face,
            MediaKind::BackgroundImage => &self.background,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaAsset> {
        [&self.screen, &self.face, &self.background].into_iter()
    }
}

/// One client request to produce one or more output videos.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderJob {
    pub job_id: JobId,
    pub assets: JobAssets,
    pub background_color: HexColor,
    pub requested_layouts: LayoutSelection,
    pub state: JobState,
    /// Keys always equal `requested_layouts`.
    pub sub_jobs: BTreeMap<LayoutId, SubJobStatus>,
    /// Name of the render backend chosen at submission.
    pub backend: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cleanup_warnings: Vec<String>,
}

impl RenderJob {
    /// Create a job in `Submitted` with one pending sub-job per requested layout.
    pub fn new(
        job_id: JobId,
        assets: JobAssets,
        background_color: HexColor,
        requested_layouts: LayoutSelection,
        backend: impl Into<String>,
    ) -> Self {
        let sub_jobs = requested_layouts
            .iter()
            .map(|layout| (layout, SubJobStatus::default()))
            .collect();

        Self {
            job_id,
            assets,
            background_color,
            requested_layouts,
            state: JobState::Submitted,
            sub_jobs,
            backend: backend.into(),
            created_at: Utc::now(),
            completed_at: None,
            cleanup_warnings: Vec::new(),
        }
    }

    /// `Submitted` -> `Running`. Returns false if the job was not in `Submitted`.
    pub fn start(&mut self) -> bool {
        if self.state != JobState::Submitted {
            return false;
        }
        self.state = JobState::Running;
        true
    }

    /// Mark a pending sub-job as running.
    pub fn start_sub_job(&mut self, layout: LayoutId) -> bool {
        match self.sub_jobs.get_mut(&layout) {
            Some(sub) if sub.state == SubJobState::Pending => {
                sub.state = SubJobState::Running;
                true
            }
            _ => false,
        }
    }

    /// Record progress. Values are clamped to 100 and never move backwards;
    /// updates after a terminal event are ignored.
    pub fn record_progress(&mut self, layout: LayoutId, percent: u8) {
        if let Some(sub) = self.sub_jobs.get_mut(&layout) {
            if sub.state.is_terminal() {
                return;
            }
            if sub.state == SubJobState::Pending {
                sub.state = SubJobState::Running;
            }
            sub.progress = sub.progress.max(percent.min(100));
        }
    }

    /// Terminal success for a sub-job. Returns false if it was already terminal.
    pub fn complete_sub_job(&mut self, layout: LayoutId, artifact: RenderArtifact) -> bool {
        match self.sub_jobs.get_mut(&layout) {
            Some(sub) if !sub.state.is_terminal() => {
                sub.state = SubJobState::Complete;
                sub.progress = 100;
                sub.artifact = Some(artifact);
                true
            }
            _ => false,
        }
    }

    /// Terminal failure for a sub-job. Returns false if it was already terminal.
    pub fn fail_sub_job(&mut self, layout: LayoutId, failure: JobFailure) -> bool {
        match self.sub_jobs.get_mut(&layout) {
            Some(sub) if !sub.state.is_terminal() => {
                sub.state = SubJobState::Failed;
                sub.error = Some(failure);
                true
            }
            _ => false,
        }
    }

    pub fn all_sub_jobs_terminal(&self) -> bool {
        self.sub_jobs.values().all(|s| s.state.is_terminal())
    }

    /// Move to a terminal state once every sub-job has finished.
    ///
    /// `Complete` only if every sub-job succeeded. Returns the new state, or
    /// `None` if the job is already terminal or a sub-job is still in flight.
    pub fn finalize(&mut self) -> Option<JobState> {
        if self.state.is_terminal() || !self.all_sub_jobs_terminal() {
            return None;
        }
        let all_ok = self
            .sub_jobs
            .values()
            .all(|s| s.state == SubJobState::Complete);
        self.state = if all_ok { JobState::Complete } else { JobState::Failed };
        self.completed_at = Some(Utc::now());
        Some(self.state)
    }

    /// Most specific failure: the first failed layout in `LayoutId` order.
    pub fn overall_error(&self) -> Option<&JobFailure> {
        self.sub_jobs.values().find_map(|s| s.error.as_ref())
    }

    /// Mean progress over all sub-jobs.
    pub fn overall_progress(&self) -> u8 {
        if self.sub_jobs.is_empty() {
            return 0;
        }
        let total: u32 = self.sub_jobs.values().map(|s| s.progress as u32).sum();
        (total / self.sub_jobs.len() as u32) as u8
    }

    pub fn artifact(&self, layout: LayoutId) -> Option<&RenderArtifact> {
        self.sub_jobs.get(&layout).and_then(|s| s.artifact.as_ref())
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &RenderArtifact> {
        self.sub_jobs.values().filter_map(|s| s.artifact.as_ref())
    }

    pub fn record_cleanup_warning(&mut self, warning: impl Into<String>) {
        self.cleanup_warnings.push(warning.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetHandle;
    use crate::error_code::ErrorCode;

    fn asset(kind: MediaKind) -> MediaAsset {
        MediaAsset {
            kind,
            mime_type: match kind {
                MediaKind::BackgroundImage => "image/jpeg".to_string(),
                _ => "video/mp4".to_string(),
            },
            byte_size: 10,
            storage_handle: AssetHandle(format!("uploads/job/{}_1.bin", kind.file_prefix())),
            created_at: Utc::now(),
        }
    }

    fn assets() -> JobAssets {
        JobAssets::from_parts(
            Some(asset(MediaKind::ScreenRecording)),
            Some(asset(MediaKind::FaceRecording)),
            Some(asset(MediaKind::BackgroundImage)),
        )
        .unwrap()
    }

    fn artifact(job_id: &JobId, layout: LayoutId) -> RenderArtifact {
        RenderArtifact {
            job_id: job_id.clone(),
            layout_id: layout,
            storage_handle: format!("public/{}_{}.mp4", job_id, layout),
            byte_size: 100,
            duration_seconds: 5.0,
            produced_at: Utc::now(),
        }
    }

    fn job(selection: LayoutSelection) -> RenderJob {
        RenderJob::new(JobId::new(), assets(), HexColor::BLACK, selection, "local")
    }

    #[test]
    fn test_both_creates_two_sub_jobs() {
        let job = job(LayoutSelection::both());
        assert_eq!(job.state, JobState::Submitted);
        assert_eq!(job.sub_jobs.len(), 2);
        assert!(job.sub_jobs.contains_key(&LayoutId::Vertical9x16));
        assert!(job.sub_jobs.contains_key(&LayoutId::Horizontal16x9));
    }

    #[test]
    fn test_selection_parsing() {
        assert_eq!(LayoutSelection::parse("both").unwrap().len(), 2);
        assert_eq!(LayoutSelection::parse("").unwrap().len(), 2);
        assert!(LayoutSelection::parse("short").unwrap().contains(LayoutId::Vertical9x16));
        assert!(LayoutSelection::parse("horizontal").unwrap().contains(LayoutId::Horizontal16x9));
        assert!(LayoutSelection::parse("square").is_err());
    }

    #[test]
    fn test_missing_part_reports_kind() {
        let err = JobAssets::from_parts(Some(asset(MediaKind::ScreenRecording)), None, None).unwrap_err();
        assert_eq!(err, MediaKind::FaceRecording);
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let mut job = job(LayoutSelection::both());
        job.start();
        job.record_progress(LayoutId::Vertical9x16, 40);
        job.record_progress(LayoutId::Vertical9x16, 20);
        assert_eq!(job.sub_jobs[&LayoutId::Vertical9x16].progress, 40);
        job.record_progress(LayoutId::Vertical9x16, 250);
        assert_eq!(job.sub_jobs[&LayoutId::Vertical9x16].progress, 100);
    }

    #[test]
    fn test_complete_only_when_all_succeed() {
        let mut job = job(LayoutSelection::both());
        assert!(job.start());
        let id = job.job_id.clone();

        assert!(job.complete_sub_job(LayoutId::Vertical9x16, artifact(&id, LayoutId::Vertical9x16)));
        assert_eq!(job.finalize(), None);
        assert_eq!(job.state, JobState::Running);

        assert!(job.complete_sub_job(LayoutId::Horizontal16x9, artifact(&id, LayoutId::Horizontal16x9)));
        assert_eq!(job.finalize(), Some(JobState::Complete));
        assert!(job.completed_at.is_some());
        assert_eq!(job.overall_progress(), 100);
    }

    #[test]
    fn test_partial_success_keeps_artifact() {
        let mut job = job(LayoutSelection::both());
        job.start();
        let id = job.job_id.clone();

        job.fail_sub_job(LayoutId::Horizontal16x9, JobFailure::new(ErrorCode::RenderTimeout, "too slow"));
        job.complete_sub_job(LayoutId::Vertical9x16, artifact(&id, LayoutId::Vertical9x16));

        assert_eq!(job.finalize(), Some(JobState::Failed));
        assert!(job.artifact(LayoutId::Vertical9x16).is_some());
        assert_eq!(job.overall_error().unwrap().code, ErrorCode::RenderTimeout);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = job(LayoutSelection::new([LayoutId::Vertical9x16]));
        job.start();
        job.fail_sub_job(LayoutId::Vertical9x16, JobFailure::new(ErrorCode::RenderAborted, "cancelled"));
        assert_eq!(job.finalize(), Some(JobState::Failed));

        let late = artifact(&job.job_id, LayoutId::Vertical9x16);
        assert!(!job.start());
        assert!(!job.complete_sub_job(LayoutId::Vertical9x16, late));
        assert_eq!(job.finalize(), None);
        assert_eq!(job.state, JobState::Failed);
    }

    #[test]
    fn test_overall_error_prefers_first_layout() {
        let mut job = job(LayoutSelection::both());
        job.start();
        job.fail_sub_job(LayoutId::Horizontal16x9, JobFailure::new(ErrorCode::RenderTimeout, "h"));
        job.fail_sub_job(LayoutId::Vertical9x16, JobFailure::new(ErrorCode::UnsupportedInput, "v"));
        assert_eq!(job.overall_error().unwrap().code, ErrorCode::UnsupportedInput);
    }
}
