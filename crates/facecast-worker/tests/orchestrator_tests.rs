//! Orchestrator lifecycle tests driven by fake backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use facecast_models::{
    ErrorCode, HexColor, JobId, JobState, LayoutId, LayoutSelection, MediaAsset, MediaKind, RenderJob,
    SubJobState,
};
use facecast_storage::{AssetStore, ResultStore};
use facecast_worker::{
    CancelOutcome, JobOrchestrator, JobSubmission, ProgressReporter, RenderBackend, RenderError,
    RenderRequest, RenderResult, RenderedVideo, SubmitError, WorkerConfig,
};
use tempfile::TempDir;
use tokio::sync::watch;

/// What the fake does for a given layout.
#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Hang,
    Panic,
}

struct FakeBackend {
    behaviors: HashMap<LayoutId, Behavior>,
    calls: AtomicUsize,
    /// For each hung render torn down: were its inputs still on disk?
    teardowns: Arc<Mutex<Vec<bool>>>,
}

/// Dropped when a hung render future is torn down.
struct InputsGuard {
    inputs: Vec<PathBuf>,
    teardowns: Arc<Mutex<Vec<bool>>>,
}

impl Drop for InputsGuard {
    fn drop(&mut self) {
        let present = self.inputs.iter().all(|p| p.exists());
        self.teardowns.lock().unwrap().push(present);
    }
}

impl FakeBackend {
    fn new(vertical: Behavior, horizontal: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behaviors: HashMap::from([(LayoutId::Vertical9x16, vertical), (LayoutId::Horizontal16x9, horizontal)]),
            calls: AtomicUsize::new(0),
            teardowns: Arc::default(),
        })
    }
}

#[async_trait]
impl RenderBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn check_ready(&self) -> RenderResult<()> {
        Ok(())
    }

    async fn render(
        &self,
        request: &RenderRequest,
        progress: &ProgressReporter,
        _cancel: watch::Receiver<bool>,
    ) -> RenderResult<RenderedVideo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Inputs must still exist while rendering.
        for asset in request.assets.iter() {
            assert!(asset.path().exists(), "asset released before render finished");
        }
        progress.report(30);
        tokio::time::sleep(Duration::from_millis(20)).await;
        progress.report(60);

        match self.behaviors[&request.layout.layout_id] {
            Behavior::Succeed => {
                tokio::fs::write(&request.output, format!("video {}", request.layout.layout_id)).await?;
                Ok(RenderedVideo {
                    path: request.output.clone(),
                    duration_seconds: 10.0,
                })
            }
            Behavior::Fail => Err(RenderError::unsupported_input("face recording has no video stream")),
            Behavior::Hang => {
                let _guard = InputsGuard {
                    inputs: request.assets.iter().map(|a| a.path()).collect(),
                    teardowns: Arc::clone(&self.teardowns),
                };
                std::future::pending::<()>().await;
                unreachable!()
            }
            Behavior::Panic => panic!("renderer bug"),
        }
    }
}

struct Harness {
    _dir: TempDir,
    assets: AssetStore,
    orchestrator: JobOrchestrator,
}

fn harness(backend: Arc<FakeBackend>, config: WorkerConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let assets = AssetStore::new(dir.path().join("uploads"));
    let results = ResultStore::new(dir.path().join("public"), Duration::from_secs(3600));
    let orchestrator = JobOrchestrator::new(assets.clone(), results, backend, config);
    Harness {
        _dir: dir,
        assets,
        orchestrator,
    }
}

async fn ingest(store: &AssetStore, job: &JobId, kind: MediaKind) -> MediaAsset {
    let mime = match kind {
        MediaKind::BackgroundImage => "image/jpeg",
        _ => "video/mp4",
    };
    store.ingest(job, kind, b"payload", mime).await.unwrap()
}

async fn submission(store: &AssetStore, layouts: LayoutSelection) -> JobSubmission {
    let job_id = JobId::new();
    JobSubmission {
        screen: Some(ingest(store, &job_id, MediaKind::ScreenRecording).await),
        face: Some(ingest(store, &job_id, MediaKind::FaceRecording).await),
        background: Some(ingest(store, &job_id, MediaKind::BackgroundImage).await),
        background_color: HexColor::parse("#112233").unwrap(),
        layouts,
        job_id,
    }
}

async fn wait_terminal(orchestrator: &JobOrchestrator, job_id: &JobId) -> RenderJob {
    for _ in 0..500 {
        let job = orchestrator.status(job_id).await.expect("job exists");
        if job.state.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job did not reach a terminal state");
}

#[tokio::test]
async fn test_both_layouts_complete() {
    let backend = FakeBackend::new(Behavior::Succeed, Behavior::Succeed);
    let h = harness(backend.clone(), WorkerConfig::default());
    let sub = submission(&h.assets, LayoutSelection::both()).await;
    let handles = vec![
        sub.screen.as_ref().unwrap().path(),
        sub.face.as_ref().unwrap().path(),
        sub.background.as_ref().unwrap().path(),
    ];

    let job_id = h.orchestrator.submit(sub).await.unwrap();
    let job = wait_terminal(&h.orchestrator, &job_id).await;

    assert_eq!(job.state, JobState::Complete);
    assert_eq!(job.backend, "fake");
    assert_eq!(job.sub_jobs.len(), 2);
    assert!(job.completed_at.is_some());
    for status in job.sub_jobs.values() {
        assert_eq!(status.state, SubJobState::Complete);
        assert_eq!(status.progress, 100);
        assert!(status.artifact.is_some());
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);

    for path in handles {
        assert!(!path.exists(), "{} should be released", path.display());
    }
    assert!(!h.assets.job_dir(&job_id).exists());
    assert!(job.cleanup_warnings.is_empty());

    let results = h.orchestrator.results();
    let vertical = results.get(&job_id, LayoutId::Vertical9x16).await.unwrap();
    assert_eq!(tokio::fs::read(&vertical.storage_handle).await.unwrap(), b"video vertical");
}

#[tokio::test]
async fn test_single_layout_creates_single_sub_job() {
    let backend = FakeBackend::new(Behavior::Succeed, Behavior::Fail);
    let h = harness(backend.clone(), WorkerConfig::default());
    let sub = submission(&h.assets, LayoutSelection::new([LayoutId::Vertical9x16])).await;

    let job_id = h.orchestrator.submit(sub).await.unwrap();
    let job = wait_terminal(&h.orchestrator, &job_id).await;

    assert_eq!(job.state, JobState::Complete);
    assert_eq!(job.sub_jobs.keys().copied().collect::<Vec<_>>(), vec![LayoutId::Vertical9x16]);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_asset_rejected_and_released() {
    let h = harness(FakeBackend::new(Behavior::Succeed, Behavior::Succeed), WorkerConfig::default());
    let mut sub = submission(&h.assets, LayoutSelection::both()).await;
    sub.face = None;
    let screen_path = sub.screen.as_ref().unwrap().path();
    let job_id = sub.job_id.clone();

    let err = h.orchestrator.submit(sub).await.unwrap_err();
    assert!(matches!(err, SubmitError::MissingAsset(MediaKind::FaceRecording)));
    assert_eq!(err.code(), ErrorCode::MissingAsset);
    assert!(!screen_path.exists());
    assert!(h.orchestrator.status(&job_id).await.is_none());
}

#[tokio::test]
async fn test_partial_failure_keeps_successful_artifact() {
    let h = harness(FakeBackend::new(Behavior::Succeed, Behavior::Fail), WorkerConfig::default());
    let sub = submission(&h.assets, LayoutSelection::both()).await;

    let job_id = h.orchestrator.submit(sub).await.unwrap();
    let job = wait_terminal(&h.orchestrator, &job_id).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.sub_jobs[&LayoutId::Vertical9x16].state, SubJobState::Complete);
    assert_eq!(job.sub_jobs[&LayoutId::Horizontal16x9].state, SubJobState::Failed);
    assert_eq!(job.overall_error().unwrap().code, ErrorCode::UnsupportedInput);

    let results = h.orchestrator.results();
    assert!(results.get(&job_id, LayoutId::Vertical9x16).await.is_some());
    assert!(results.get(&job_id, LayoutId::Horizontal16x9).await.is_none());
    assert!(!h.assets.job_dir(&job_id).exists());
}

#[tokio::test]
async fn test_timeout_fails_only_slow_layout() {
    let config = WorkerConfig {
        render_timeout: Duration::from_millis(300),
        ..Default::default()
    };
    let h = harness(FakeBackend::new(Behavior::Succeed, Behavior::Hang), config);
    let sub = submission(&h.assets, LayoutSelection::both()).await;

    let job_id = h.orchestrator.submit(sub).await.unwrap();
    let job = wait_terminal(&h.orchestrator, &job_id).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.sub_jobs[&LayoutId::Vertical9x16].state, SubJobState::Complete);
    let failure = job.sub_jobs[&LayoutId::Horizontal16x9].error.clone().unwrap();
    assert_eq!(failure.code, ErrorCode::RenderTimeout);
    assert!(h.orchestrator.results().get(&job_id, LayoutId::Vertical9x16).await.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timed_out_render_stops_before_cleanup() {
    let config = WorkerConfig {
        render_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let backend = FakeBackend::new(Behavior::Hang, Behavior::Hang);
    let h = harness(Arc::clone(&backend), config);
    let sub = submission(&h.assets, LayoutSelection::both()).await;
    let screen_path = sub.screen.as_ref().unwrap().path();

    let job_id = h.orchestrator.submit(sub).await.unwrap();
    wait_terminal(&h.orchestrator, &job_id).await;

    assert!(!screen_path.exists());
    let teardowns = backend.teardowns.lock().unwrap().clone();
    assert_eq!(teardowns, vec![true, true], "renders must stop before inputs are released");
}

#[tokio::test]
async fn test_cancel_aborts_running_sub_jobs() {
    let h = harness(FakeBackend::new(Behavior::Hang, Behavior::Hang), WorkerConfig::default());
    let sub = submission(&h.assets, LayoutSelection::both()).await;
    let screen_path = sub.screen.as_ref().unwrap().path();

    let job_id = h.orchestrator.submit(sub).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.orchestrator.cancel(&job_id).await, CancelOutcome::Requested);
    let job = wait_terminal(&h.orchestrator, &job_id).await;

    assert_eq!(job.state, JobState::Failed);
    for status in job.sub_jobs.values() {
        assert_eq!(status.error.as_ref().unwrap().code, ErrorCode::RenderAborted);
    }
    assert!(!screen_path.exists());

    assert_eq!(
        h.orchestrator.cancel(&job_id).await,
        CancelOutcome::AlreadyTerminal(JobState::Failed)
    );
    assert_eq!(h.orchestrator.cancel(&JobId::new()).await, CancelOutcome::NotFound);
}

#[tokio::test]
async fn test_panicking_backend_still_terminates() {
    let h = harness(FakeBackend::new(Behavior::Panic, Behavior::Succeed), WorkerConfig::default());
    let sub = submission(&h.assets, LayoutSelection::both()).await;

    let job_id = h.orchestrator.submit(sub).await.unwrap();
    let job = wait_terminal(&h.orchestrator, &job_id).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.overall_error().unwrap().code, ErrorCode::Internal);
    assert_eq!(job.sub_jobs[&LayoutId::Horizontal16x9].state, SubJobState::Complete);
}

#[tokio::test]
async fn test_serial_layouts() {
    let config = WorkerConfig {
        parallel_layouts: false,
        ..Default::default()
    };
    let backend = FakeBackend::new(Behavior::Succeed, Behavior::Succeed);
    let h = harness(backend.clone(), config);
    let sub = submission(&h.assets, LayoutSelection::both()).await;

    let job_id = h.orchestrator.submit(sub).await.unwrap();
    let job = wait_terminal(&h.orchestrator, &job_id).await;

    assert_eq!(job.state, JobState::Complete);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
}

/// Poll until terminal, asserting no layout's progress ever moves backwards.
async fn assert_progress_monotonic(h: &Harness, layouts: LayoutSelection) -> RenderJob {
    let sub = submission(&h.assets, layouts).await;
    let job_id = h.orchestrator.submit(sub).await.unwrap();

    let mut seen: HashMap<LayoutId, Vec<u8>> = HashMap::new();
    loop {
        let job = h.orchestrator.status(&job_id).await.unwrap();
        for (layout, status) in &job.sub_jobs {
            let history = seen.entry(*layout).or_default();
            let prev = history.last().copied().unwrap_or(0);
            history.push(status.progress);
            assert!(status.progress >= prev, "progress went backwards for {}: {:?}", layout, history);
        }
        if job.state.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn test_status_progress_never_decreases() {
    let h = harness(FakeBackend::new(Behavior::Succeed, Behavior::Succeed), WorkerConfig::default());
    let job = assert_progress_monotonic(&h, LayoutSelection::both()).await;

    let first = h.orchestrator.status(&job.job_id).await.unwrap();
    let second = h.orchestrator.status(&job.job_id).await.unwrap();
    assert_eq!(first.state, second.state);
    assert_eq!(first.sub_jobs, second.sub_jobs);
}

#[tokio::test]
async fn test_failed_layout_keeps_reported_progress() {
    let h = harness(FakeBackend::new(Behavior::Fail, Behavior::Succeed), WorkerConfig::default());
    let job = assert_progress_monotonic(&h, LayoutSelection::new([LayoutId::Vertical9x16])).await;

    let vertical = &job.sub_jobs[&LayoutId::Vertical9x16];
    assert_eq!(vertical.state, SubJobState::Failed);
    // The renderer reached 60 before failing.
    assert_eq!(vertical.progress, 60);
}

#[tokio::test]
async fn test_timed_out_layout_keeps_reported_progress() {
    let config = WorkerConfig {
        render_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let h = harness(FakeBackend::new(Behavior::Hang, Behavior::Succeed), config);
    let job = assert_progress_monotonic(&h, LayoutSelection::new([LayoutId::Vertical9x16])).await;

    let vertical = &job.sub_jobs[&LayoutId::Vertical9x16];
    assert_eq!(vertical.error.as_ref().unwrap().code, ErrorCode::RenderTimeout);
    assert_eq!(vertical.progress, 60);
}

#[tokio::test]
async fn test_expire_prunes_finished_jobs() {
    let h = harness(FakeBackend::new(Behavior::Succeed, Behavior::Succeed), WorkerConfig::default());
    let sub = submission(&h.assets, LayoutSelection::both()).await;
    let job_id = h.orchestrator.submit(sub).await.unwrap();
    wait_terminal(&h.orchestrator, &job_id).await;

    assert_eq!(h.orchestrator.expire(chrono::Utc::now()).await, (0, 0));

    let later = chrono::Utc::now() + chrono::Duration::hours(2);
    assert_eq!(h.orchestrator.expire(later).await, (2, 1));
    assert!(h.orchestrator.status(&job_id).await.is_none());
}
