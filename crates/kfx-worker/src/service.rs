//! Channel-driven extraction service.
//!
//! Requests are admitted (or rejected as busy), then handed to a worker
//! task over an mpsc channel. Each job publishes its status through its
//! own [`StatusTracker`]; callers poll by job ID or wait on a [`JobHandle`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use kfx_media::{find_frame_sets, FfmpegRunner, FrameSet, KeyframeExtractor};
use kfx_models::{ExtractionConfig, JobId, ProcessingStatus};

use crate::admission::{AdmissionControl, AdmissionPermit};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metadata::MetadataResolver;
use crate::status::StatusTracker;

/// Finished jobs kept for status lookups.
const FINISHED_JOBS_RETAINED: usize = 32;

/// One extraction request.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub video_path: PathBuf,
    /// Output root override; without it frames go next to the video
    pub output_root: Option<PathBuf>,
    pub quality: Option<u8>,
    pub output_format: Option<String>,
    /// Delete the input video after a successful extraction
    pub cleanup_input: bool,
}

impl JobRequest {
    pub fn new(video_path: impl Into<PathBuf>) -> Self {
        Self {
            video_path: video_path.into(),
            output_root: None,
            quality: None,
            output_format: None,
            cleanup_input: false,
        }
    }

    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(root.into());
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    pub fn with_cleanup_input(mut self, cleanup: bool) -> Self {
        self.cleanup_input = cleanup;
        self
    }

    /// Per-job copy of the service configuration with this request's overrides.
    pub fn job_config(&self, base: &ExtractionConfig) -> ExtractionConfig {
        let mut config = base.clone().for_service();

        match &self.output_root {
            Some(root) => {
                config.output_root = root.clone();
                config.use_parent_dir = false;
            }
            None => config.use_parent_dir = true,
        }
        config.input_path = self
            .video_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(format) = &self.output_format {
            config.output_format = format.clone();
        }

        for correction in config.sanitize() {
            warn!("Job configuration corrected: {}", correction);
        }
        config
    }
}

/// Caller's view of a submitted job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    job_id: JobId,
    status: watch::Receiver<ProcessingStatus>,
    cancel: Arc<watch::Sender<bool>>,
}

impl JobHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn snapshot(&self) -> ProcessingStatus {
        self.status.borrow().clone().with_elapsed(chrono::Utc::now())
    }

    /// Ask the running tool to stop.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Wait for the job to complete or fail.
    pub async fn wait(mut self) -> ProcessingStatus {
        let terminal = self
            .status
            .wait_for(|s| s.is_terminal())
            .await
            .map(|s| s.clone());
        let status = match terminal {
            Ok(status) => status,
            // Worker dropped the tracker; report what was last published
            Err(_) => self.status.borrow().clone(),
        };
        status.with_elapsed(chrono::Utc::now())
    }
}

struct JobEntry {
    tracker: StatusTracker,
    cancel: Arc<watch::Sender<bool>>,
}

#[derive(Default)]
struct Registry {
    jobs: HashMap<JobId, JobEntry>,
    order: Vec<JobId>,
}

impl Registry {
    fn insert(&mut self, job_id: JobId, entry: JobEntry) {
        self.jobs.insert(job_id.clone(), entry);
        self.order.push(job_id);
        self.prune();
    }

    /// Drop the oldest finished jobs beyond the retention limit.
    fn prune(&mut self) {
        let finished: Vec<JobId> = self
            .order
            .iter()
            .filter(|id| {
                self.jobs
                    .get(*id)
                    .map(|e| e.tracker.is_terminal())
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        if finished.len() > FINISHED_JOBS_RETAINED {
            let excess = finished.len() - FINISHED_JOBS_RETAINED;
            for id in finished.into_iter().take(excess) {
                self.jobs.remove(&id);
                self.order.retain(|o| o != &id);
            }
        }
    }
}

struct QueuedJob {
    job_id: JobId,
    request: JobRequest,
    tracker: StatusTracker,
    cancel_rx: watch::Receiver<bool>,
    permit: AdmissionPermit,
}

/// Shared state of the worker task.
struct WorkerContext {
    config: WorkerConfig,
    resolver: Arc<dyn MetadataResolver>,
}

pub struct JobService {
    tx: mpsc::Sender<QueuedJob>,
    admission: AdmissionControl,
    registry: Arc<Mutex<Registry>>,
    config: WorkerConfig,
    worker: JoinHandle<()>,
}

impl JobService {
    /// Start the worker task. Must be called inside a tokio runtime.
    pub fn start(config: WorkerConfig, resolver: Arc<dyn MetadataResolver>) -> Self {
        let admission = AdmissionControl::new(config.max_concurrent_jobs);
        let (tx, rx) = mpsc::channel(admission.max_jobs());
        let ctx = Arc::new(WorkerContext {
            config: config.clone(),
            resolver,
        });

        info!(
            "Starting extraction service with {} max concurrent jobs",
            admission.max_jobs()
        );
        let worker = tokio::spawn(worker_loop(ctx, rx));

        Self {
            tx,
            admission,
            registry: Arc::new(Mutex::new(Registry::default())),
            config,
            worker,
        }
    }

    /// Admit and enqueue a job.
    ///
    /// Fails with [`WorkerError::Busy`] while every slot is taken.
    pub async fn submit(&self, request: JobRequest) -> WorkerResult<JobHandle> {
        let permit = self.admission.try_admit()?;

        let job_id = JobId::new();
        let video_name = request
            .video_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let tracker = StatusTracker::new();
        tracker.begin(job_id.clone(), video_name);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cancel = Arc::new(cancel_tx);

        let handle = JobHandle {
            job_id: job_id.clone(),
            status: tracker.subscribe(),
            cancel: Arc::clone(&cancel),
        };

        self.lock_registry().insert(
            job_id.clone(),
            JobEntry {
                tracker: tracker.clone(),
                cancel,
            },
        );

        let queued = QueuedJob {
            job_id: job_id.clone(),
            request,
            tracker: tracker.clone(),
            cancel_rx,
            permit,
        };

        if self.tx.send(queued).await.is_err() {
            tracker.fail(WorkerError::ServiceClosed.to_string());
            return Err(WorkerError::ServiceClosed);
        }

        debug!(job_id = %job_id, "Job queued");
        Ok(handle)
    }

    /// Status snapshot of a job.
    pub fn status(&self, job_id: &JobId) -> WorkerResult<ProcessingStatus> {
        self.lock_registry()
            .jobs
            .get(job_id)
            .map(|e| e.tracker.snapshot())
            .ok_or_else(|| WorkerError::JobNotFound(job_id.clone()))
    }

    /// Status of the most recently submitted job, or an idle snapshot.
    pub fn latest(&self) -> ProcessingStatus {
        let registry = self.lock_registry();
        registry
            .order
            .last()
            .and_then(|id| registry.jobs.get(id))
            .map(|e| e.tracker.snapshot())
            .unwrap_or_default()
    }

    /// Request cancellation of a running job.
    pub fn cancel(&self, job_id: &JobId) -> WorkerResult<()> {
        let registry = self.lock_registry();
        let entry = registry
            .jobs
            .get(job_id)
            .ok_or_else(|| WorkerError::JobNotFound(job_id.clone()))?;
        entry.cancel.send_replace(true);
        info!(job_id = %job_id, "Cancellation requested");
        Ok(())
    }

    /// Jobs currently holding an admission slot.
    pub fn in_flight(&self) -> usize {
        self.admission.in_flight()
    }

    /// Frame sets under the configured output root, optionally for one video stem.
    pub fn frames(&self, video_stem: Option<&str>) -> Vec<FrameSet> {
        let extraction = &self.config.extraction;
        find_frame_sets(&extraction.output_root, &extraction.output_format, video_stem)
    }

    /// Stop accepting jobs and wait for in-flight ones, bounded by the shutdown timeout.
    pub async fn shutdown(self) {
        let Self {
            tx, worker, config, ..
        } = self;
        drop(tx);

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(config.shutdown_timeout, worker).await.is_err() {
            warn!("Extraction service did not stop within {:?}", config.shutdown_timeout);
        }
        info!("Extraction service stopped");
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

async fn worker_loop(ctx: Arc<WorkerContext>, mut rx: mpsc::Receiver<QueuedJob>) {
    let mut running = Vec::new();

    while let Some(job) = rx.recv().await {
        let ctx = Arc::clone(&ctx);
        let span = JobLogger::new(&job.job_id, "keyframe_extraction").create_span();
        running.push(tokio::spawn(run_job(ctx, job).instrument(span)));
        running.retain(|h: &JoinHandle<()>| !h.is_finished());
    }

    for handle in running {
        if let Err(e) = handle.await {
            warn!("Extraction task ended abnormally: {}", e);
        }
    }
}

async fn run_job(ctx: Arc<WorkerContext>, job: QueuedJob) {
    let QueuedJob {
        job_id,
        request,
        tracker,
        cancel_rx,
        permit,
    } = job;
    let _permit = permit;

    let logger = JobLogger::new(&job_id, "keyframe_extraction");
    logger.log_start(&request.video_path.display().to_string());

    let config = request.job_config(&ctx.config.extraction);
    let name = request
        .video_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let metadata = ctx.resolver.resolve(&name);
    tracker.set_metadata(metadata.clone());

    let runner = FfmpegRunner::new()
        .with_cancel(cancel_rx)
        .with_timeout(ctx.config.job_timeout);
    let extractor = KeyframeExtractor::new(config)
        .with_runner(runner)
        .with_frame_listing(true);

    let result = extractor
        .extract(&request.video_path, None, metadata, &tracker)
        .await;

    if request.cleanup_input && result.is_success() {
        match tokio::fs::remove_file(&request.video_path).await {
            Ok(()) => debug!(job_id = %job_id, "Removed input {}", request.video_path.display()),
            Err(e) => logger.log_warning(&format!(
                "Failed to remove input {}: {}",
                request.video_path.display(),
                e
            )),
        }
    }

    match &result.error {
        None => logger.log_completion(&format!("{} frames extracted", result.frame_count)),
        Some(e) => logger.log_error(e),
    }
    tracker.finish(&result);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_config_defaults_to_parent_dir() {
        let base = ExtractionConfig::default();
        let config = JobRequest::new("/uploads/clip.mp4").job_config(&base);

        assert!(config.use_parent_dir);
        assert!(config.overwrite);
        assert!(config.clear_existing_frames);
        assert_eq!(config.input_path, PathBuf::from("/uploads"));
    }

    #[test]
    fn test_job_config_applies_overrides() {
        let base = ExtractionConfig::default();
        let config = JobRequest::new("/uploads/clip.mp4")
            .with_output_root("/srv/frames")
            .with_quality(5)
            .with_output_format("JPG")
            .job_config(&base);

        assert!(!config.use_parent_dir);
        assert_eq!(config.output_root, PathBuf::from("/srv/frames"));
        assert_eq!(config.quality, 5);
        assert_eq!(config.output_format, "jpg");
        assert_eq!(config.frame_pattern, "frame_%04d.jpg");
        assert!(!base.overwrite);
    }

    fn entry(finished: bool) -> JobEntry {
        let tracker = StatusTracker::new();
        tracker.begin(JobId::new(), "clip.mp4");
        if finished {
            tracker.fail("Extraction failed");
        }
        let (cancel, _) = watch::channel(false);
        JobEntry {
            tracker,
            cancel: Arc::new(cancel),
        }
    }

    #[test]
    fn test_registry_retains_running_and_recent_jobs() {
        let mut registry = Registry::default();
        let running = JobId::new();
        registry.insert(running.clone(), entry(false));

        let finished: Vec<JobId> = (0..FINISHED_JOBS_RETAINED + 3).map(|_| JobId::new()).collect();
        for id in &finished {
            registry.insert(id.clone(), entry(true));
        }

        assert_eq!(registry.jobs.len(), FINISHED_JOBS_RETAINED + 1);
        assert!(registry.jobs.contains_key(&running));
        assert!(!registry.jobs.contains_key(&finished[0]));
        assert!(registry.jobs.contains_key(finished.last().unwrap()));
        assert_eq!(registry.order.len(), registry.jobs.len());
    }

    #[tokio::test]
    async fn test_unknown_job_lookups() {
        let service = JobService::start(
            WorkerConfig::default(),
            Arc::new(crate::metadata::NullMetadataResolver),
        );
        let unknown = JobId::new();

        assert!(matches!(service.status(&unknown), Err(WorkerError::JobNotFound(_))));
        assert!(matches!(service.cancel(&unknown), Err(WorkerError::JobNotFound(_))));
        assert!(!service.latest().is_processing);
        service.shutdown().await;
    }
}
