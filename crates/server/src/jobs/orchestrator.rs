// crates/server/src/jobs/orchestrator.rs
//! Job orchestration: submission, background execution, terminal resolution.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tubedub_core::{
    job_dir, AudioPipeline, SourceFetcher, CHUNKING_THRESHOLD_SECS, DEFAULT_CHUNK_SECS,
};

use super::reporter::ProgressReporter;
use super::store::JobStore;
use super::types::{JobId, JobProgressEvent, JobSnapshot, JobStatus};

/// Job progress once the source download has finished.
const DOWNLOAD_COMPLETE_PROGRESS: f64 = 20.0;

/// Errors surfaced synchronously by [`JobOrchestrator::submit`]. Everything
/// that happens after submission resolves through the job record instead.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Source URL must not be empty")]
    EmptyUrl,
}

/// Creates jobs, launches their background tasks, and answers status
/// queries. One instance owns the process-wide [`JobStore`] for the
/// service's lifetime.
pub struct JobOrchestrator {
    store: Arc<JobStore>,
    fetcher: Arc<dyn SourceFetcher>,
    pipeline: Arc<dyn AudioPipeline>,
    work_root: PathBuf,
}

impl JobOrchestrator {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        pipeline: Arc<dyn AudioPipeline>,
        work_root: PathBuf,
    ) -> Self {
        Self {
            store: Arc::new(JobStore::new()),
            fetcher,
            pipeline,
            work_root,
        }
    }

    /// Validate and register a job, then launch its background task.
    ///
    /// Returns as soon as the record exists and the task is spawned; the
    /// task is the record's only writer from here on.
    pub fn submit(&self, source_url: &str) -> Result<JobId, SubmitError> {
        let source_url = source_url.trim();
        if source_url.is_empty() {
            return Err(SubmitError::EmptyUrl);
        }

        let id = self.store.create(source_url);
        tracing::info!(job_id = %id, url = %source_url, "Translation job submitted");

        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let pipeline = Arc::clone(&self.pipeline);
        let work_dir = job_dir(&self.work_root, id);
        let url = source_url.to_string();
        // Cancellation contract point: threaded through the task and both
        // pipeline entry points, but nothing fires it today — a submitted
        // job runs to completion or failure.
        let cancel = CancellationToken::new();
        tokio::spawn(async move {
            run_job(id, url, store, fetcher, pipeline, work_dir, cancel).await;
        });

        Ok(id)
    }

    /// Snapshot of the job behind `id`, or `None` if unknown.
    pub fn status(&self, id: JobId) -> Option<JobSnapshot> {
        self.store.get(id)
    }

    /// Snapshots of all non-terminal jobs.
    pub fn active_jobs(&self) -> Vec<JobSnapshot> {
        self.store.active()
    }

    /// Subscribe to progress events across all jobs.
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.store.subscribe()
    }

    /// Evict terminal jobs older than `ttl` and delete their working
    /// directories. Returns the number of jobs evicted.
    pub fn sweep_expired(&self, ttl: chrono::Duration) -> usize {
        let evicted = self.store.evict_terminal_older_than(ttl);
        for id in &evicted {
            let dir = job_dir(&self.work_root, *id);
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(job_id = %id, error = %e, "Failed to remove job working directory");
                }
            }
        }
        if !evicted.is_empty() {
            tracing::info!(evicted = evicted.len(), "Swept expired translation jobs");
        }
        evicted.len()
    }
}

/// One job's background task, run to completion or failure, never retried.
/// Single writer for its record.
async fn run_job(
    id: JobId,
    source_url: String,
    store: Arc<JobStore>,
    fetcher: Arc<dyn SourceFetcher>,
    pipeline: Arc<dyn AudioPipeline>,
    work_dir: PathBuf,
    cancel: CancellationToken,
) {
    store.update(id, |job| {
        job.status = JobStatus::Downloading;
        job.message = "Downloading source audio...".to_string();
    });

    let fetched = match fetcher.fetch(&source_url, &work_dir).await {
        Ok(fetched) => fetched,
        Err(e) => return fail(&store, id, e.to_string()),
    };

    store.update(id, |job| {
        job.metadata = Some(fetched.metadata.clone());
        job.progress = DOWNLOAD_COMPLETE_PROGRESS;
    });

    store.update(id, |job| {
        job.status = JobStatus::Translating;
        job.message = "Translating audio from English to Brazilian Portuguese...".to_string();
    });

    let reporter = ProgressReporter::new(id, Arc::clone(&store));
    let duration = pipeline.estimate_duration_secs(&fetched.audio_path);
    let result = if duration > CHUNKING_THRESHOLD_SECS {
        tracing::info!(job_id = %id, duration_secs = duration, "Processing long audio in chunks");
        pipeline
            .process_chunked(&fetched.audio_path, DEFAULT_CHUNK_SECS, &reporter, cancel)
            .await
    } else {
        tracing::info!(job_id = %id, duration_secs = duration, "Processing audio in one pass");
        pipeline
            .process_single_pass(&fetched.audio_path, &reporter, cancel)
            .await
    };

    match result {
        Ok(artifact) => {
            store.update(id, |job| {
                job.status = JobStatus::Completed;
                job.progress = 100.0;
                job.message = "Translation completed successfully!".to_string();
                job.artifact_path = Some(artifact.clone());
            });
            tracing::info!(job_id = %id, "Translation job completed");
        }
        Err(e) => fail(&store, id, e.to_string()),
    }
}

fn fail(store: &JobStore, id: JobId, reason: String) {
    tracing::error!(job_id = %id, error = %reason, "Translation job failed");
    store.update(id, |job| {
        job.status = JobStatus::Failed;
        job.message = format!("Error: {reason}");
        job.error = Some(reason);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tubedub_core::{
        FetchError, FetchedSource, PipelineError, ProgressSink, SimulatedFetcher,
        SimulatedPipeline, SourceMetadata,
    };

    struct StubFetcher;

    #[async_trait]
    impl SourceFetcher for StubFetcher {
        async fn fetch(&self, _url: &str, dest: &Path) -> Result<FetchedSource, FetchError> {
            tokio::fs::create_dir_all(dest).await?;
            let audio_path = dest.join("source.mp3");
            tokio::fs::write(&audio_path, b"stub-audio").await?;
            Ok(FetchedSource {
                metadata: SourceMetadata {
                    title: "Stub Video".to_string(),
                    author: "Stub Author".to_string(),
                    duration_secs: 300,
                },
                audio_path,
            })
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl SourceFetcher for FailingFetcher {
        async fn fetch(&self, _url: &str, _dest: &Path) -> Result<FetchedSource, FetchError> {
            Err(FetchError::Unavailable("video is private".to_string()))
        }
    }

    /// Pipeline double that records which entry point ran and reports a
    /// fixed duration estimate.
    struct StubPipeline {
        duration_secs: f64,
        invoked: Mutex<Vec<&'static str>>,
    }

    impl StubPipeline {
        fn new(duration_secs: f64) -> Self {
            Self {
                duration_secs,
                invoked: Mutex::new(Vec::new()),
            }
        }

        fn invoked(&self) -> Vec<&'static str> {
            self.invoked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AudioPipeline for StubPipeline {
        fn estimate_duration_secs(&self, _source: &Path) -> f64 {
            self.duration_secs
        }

        async fn process_single_pass(
            &self,
            source: &Path,
            reporter: &dyn ProgressSink,
            _cancel: CancellationToken,
        ) -> Result<PathBuf, PipelineError> {
            self.invoked.lock().unwrap().push("single_pass");
            reporter.report(100.0, "done");
            Ok(source.to_path_buf())
        }

        async fn process_chunked(
            &self,
            source: &Path,
            _chunk_secs: f64,
            reporter: &dyn ProgressSink,
            _cancel: CancellationToken,
        ) -> Result<PathBuf, PipelineError> {
            self.invoked.lock().unwrap().push("chunked");
            reporter.report(100.0, "done");
            Ok(source.to_path_buf())
        }
    }

    struct FailingPipeline;

    #[async_trait]
    impl AudioPipeline for FailingPipeline {
        fn estimate_duration_secs(&self, _source: &Path) -> f64 {
            60.0
        }

        async fn process_single_pass(
            &self,
            _source: &Path,
            _reporter: &dyn ProgressSink,
            _cancel: CancellationToken,
        ) -> Result<PathBuf, PipelineError> {
            Err(PipelineError::Io(std::io::Error::other(
                "synthesis backend offline",
            )))
        }

        async fn process_chunked(
            &self,
            _source: &Path,
            _chunk_secs: f64,
            _reporter: &dyn ProgressSink,
            _cancel: CancellationToken,
        ) -> Result<PathBuf, PipelineError> {
            Err(PipelineError::Io(std::io::Error::other(
                "synthesis backend offline",
            )))
        }
    }

    /// Pipeline double that parks sources whose file name contains "slow"
    /// until the gate opens. Everything else finishes immediately.
    struct GatedPipeline {
        gate: Notify,
    }

    #[async_trait]
    impl AudioPipeline for GatedPipeline {
        fn estimate_duration_secs(&self, _source: &Path) -> f64 {
            60.0
        }

        async fn process_single_pass(
            &self,
            source: &Path,
            _reporter: &dyn ProgressSink,
            _cancel: CancellationToken,
        ) -> Result<PathBuf, PipelineError> {
            if source.to_string_lossy().contains("slow") {
                self.gate.notified().await;
            }
            Ok(source.to_path_buf())
        }

        async fn process_chunked(
            &self,
            source: &Path,
            _chunk_secs: f64,
            _reporter: &dyn ProgressSink,
            _cancel: CancellationToken,
        ) -> Result<PathBuf, PipelineError> {
            Ok(source.to_path_buf())
        }
    }

    fn orchestrator(
        fetcher: Arc<dyn SourceFetcher>,
        pipeline: Arc<dyn AudioPipeline>,
    ) -> (JobOrchestrator, tempfile::TempDir) {
        let root = tempfile::tempdir().unwrap();
        let orch = JobOrchestrator::new(fetcher, pipeline, root.path().to_path_buf());
        (orch, root)
    }

    async fn wait_for_terminal(orch: &JobOrchestrator, id: JobId) -> JobSnapshot {
        for _ in 0..500 {
            if let Some(snap) = orch.status(id) {
                if snap.status.is_terminal() {
                    return snap;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} did not reach a terminal state");
    }

    async fn wait_for_status(orch: &JobOrchestrator, id: JobId, status: JobStatus) {
        for _ in 0..500 {
            if orch.status(id).map(|s| s.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} never reached {status:?}");
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_url() {
        let (orch, _root) = orchestrator(Arc::new(StubFetcher), Arc::new(StubPipeline::new(60.0)));
        assert!(matches!(orch.submit(""), Err(SubmitError::EmptyUrl)));
        assert!(matches!(orch.submit("   "), Err(SubmitError::EmptyUrl)));
    }

    #[tokio::test]
    async fn test_job_runs_to_completion() {
        let (orch, _root) = orchestrator(Arc::new(StubFetcher), Arc::new(StubPipeline::new(60.0)));

        let id = orch.submit("https://example.com/watch?v=abc").unwrap();
        let snap = wait_for_terminal(&orch, id).await;

        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.progress, 100.0);
        assert_eq!(snap.message, "Translation completed successfully!");
        assert_eq!(snap.artifact, Some("source.mp3".to_string()));
        assert!(snap.error.is_none());
        let video = snap.video.expect("metadata merged after download");
        assert_eq!(video.title, "Stub Video");
    }

    #[tokio::test]
    async fn test_fetch_failure_resolves_to_failed_at_zero_progress() {
        let (orch, _root) =
            orchestrator(Arc::new(FailingFetcher), Arc::new(StubPipeline::new(60.0)));

        let id = orch.submit("https://example.com/watch?v=abc").unwrap();
        let snap = wait_for_terminal(&orch, id).await;

        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.progress, 0.0);
        assert_eq!(snap.error, Some("Source unavailable: video is private".to_string()));
        assert_eq!(snap.message, "Error: Source unavailable: video is private");
        assert!(snap.artifact.is_none());
    }

    #[tokio::test]
    async fn test_pipeline_failure_resolves_to_failed() {
        let (orch, _root) = orchestrator(Arc::new(StubFetcher), Arc::new(FailingPipeline));

        let id = orch.submit("https://example.com/watch?v=abc").unwrap();
        let snap = wait_for_terminal(&orch, id).await;

        assert_eq!(snap.status, JobStatus::Failed);
        assert!(snap.message.starts_with("Error: "));
        assert!(snap
            .error
            .unwrap()
            .contains("synthesis backend offline"));
        assert!(snap.artifact.is_none());
    }

    #[tokio::test]
    async fn test_short_source_uses_single_pass() {
        let pipeline = Arc::new(StubPipeline::new(3000.0));
        let (orch, _root) = orchestrator(Arc::new(StubFetcher), pipeline.clone());

        let id = orch.submit("https://example.com/watch?v=abc").unwrap();
        wait_for_terminal(&orch, id).await;

        assert_eq!(pipeline.invoked(), vec!["single_pass"]);
    }

    #[tokio::test]
    async fn test_long_source_uses_chunked_mode() {
        let pipeline = Arc::new(StubPipeline::new(4000.0));
        let (orch, _root) = orchestrator(Arc::new(StubFetcher), pipeline.clone());

        let id = orch.submit("https://example.com/watch?v=abc").unwrap();
        wait_for_terminal(&orch, id).await;

        assert_eq!(pipeline.invoked(), vec!["chunked"]);
    }

    #[tokio::test]
    async fn test_jobs_are_isolated() {
        let pipeline = Arc::new(GatedPipeline {
            gate: Notify::new(),
        });
        let fetcher = Arc::new(SimulatedFetcher::with_delay(Duration::ZERO));
        let (orch, _root) = orchestrator(fetcher, pipeline.clone());

        let slow = orch.submit("https://example.com/watch?v=slow").unwrap();
        let fast = orch.submit("https://example.com/watch?v=fast").unwrap();
        assert_ne!(slow, fast);

        // The fast job finishes while the slow one is still translating.
        let fast_snap = wait_for_terminal(&orch, fast).await;
        assert_eq!(fast_snap.status, JobStatus::Completed);
        wait_for_status(&orch, slow, JobStatus::Translating).await;

        // Opening the gate lets the slow job resolve on its own.
        pipeline.gate.notify_one();
        let slow_snap = wait_for_terminal(&orch, slow).await;
        assert_eq!(slow_snap.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_terminal_snapshot_is_stable() {
        let (orch, _root) = orchestrator(Arc::new(StubFetcher), Arc::new(StubPipeline::new(60.0)));

        let id = orch.submit("https://example.com/watch?v=abc").unwrap();
        let first = wait_for_terminal(&orch, id).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = orch.status(id).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_status_unknown_id_returns_none() {
        let (orch, _root) = orchestrator(Arc::new(StubFetcher), Arc::new(StubPipeline::new(60.0)));
        orch.submit("https://example.com/watch?v=abc").unwrap();
        assert!(orch.status(uuid::Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_under_polling() {
        let fetcher = Arc::new(SimulatedFetcher::with_delay(Duration::ZERO));
        let pipeline = Arc::new(SimulatedPipeline::new().with_stage_delay(Duration::from_millis(10)));
        let (orch, _root) = orchestrator(fetcher, pipeline);

        let id = orch.submit("https://example.com/watch?v=abc").unwrap();

        let mut observed = Vec::new();
        loop {
            let snap = orch.status(id).unwrap();
            observed.push(snap.progress);
            if snap.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert!(
            observed.windows(2).all(|w| w[0] <= w[1]),
            "progress went backwards: {observed:?}"
        );
        assert_eq!(*observed.last().unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_job_and_files() {
        let fetcher = Arc::new(SimulatedFetcher::with_delay(Duration::ZERO));
        let pipeline = Arc::new(SimulatedPipeline::new().with_stage_delay(Duration::ZERO));
        let root = tempfile::tempdir().unwrap();
        let orch = JobOrchestrator::new(fetcher, pipeline, root.path().to_path_buf());

        let id = orch.submit("https://example.com/watch?v=abc").unwrap();
        wait_for_terminal(&orch, id).await;

        let dir = tubedub_core::job_dir(root.path(), id);
        assert!(dir.exists(), "job directory should hold source + artifact");

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(orch.sweep_expired(chrono::Duration::zero()), 1);
        assert!(orch.status(id).is_none());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_jobs() {
        let (orch, _root) = orchestrator(Arc::new(StubFetcher), Arc::new(StubPipeline::new(60.0)));

        let id = orch.submit("https://example.com/watch?v=abc").unwrap();
        wait_for_terminal(&orch, id).await;

        assert_eq!(orch.sweep_expired(chrono::Duration::hours(1)), 0);
        assert!(orch.status(id).is_some());
    }
}
