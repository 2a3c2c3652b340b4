//! One extraction job: output directory, command, run, frame count.

use std::path::Path;

use tokio::fs;
use tracing::{debug, error, info, warn};

use kfx_models::{ExtractionConfig, ExtractionJob, ExtractionResult, JobId, JobPhase, VideoMetadata};

use crate::command::build_keyframe_command;
use crate::error::{MediaError, MediaResult};
use crate::frames::{clear_frames, count_frames, list_frames, relative_frame_paths};
use crate::output_path::resolve_output_dir;
use crate::progress::{MonotonicSink, ProgressSink, PROGRESS_ACCEPTED, PROGRESS_DONE};
use crate::runner::FfmpegRunner;

/// Runs I-frame extraction for single videos under one configuration.
///
/// Per-video failures never surface as `Err`; they become failed
/// [`ExtractionResult`]s carrying the error detail.
#[derive(Debug, Clone)]
pub struct KeyframeExtractor {
    config: ExtractionConfig,
    runner: FfmpegRunner,
    list_frames: bool,
}

impl KeyframeExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            config,
            runner: FfmpegRunner::new(),
            list_frames: false,
        }
    }

    /// Use a runner carrying a cancel signal or timeout.
    pub fn with_runner(mut self, runner: FfmpegRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Report produced frame paths on successful results.
    pub fn with_frame_listing(mut self, enabled: bool) -> Self {
        self.list_frames = enabled;
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Check the input and resolve (creating) its output directory.
    ///
    /// `output_hint` names the output directory explicitly and bypasses layout resolution.
    pub async fn prepare(
        &self,
        video: &Path,
        output_hint: Option<&Path>,
        metadata: VideoMetadata,
    ) -> MediaResult<ExtractionJob> {
        if !fs::try_exists(video).await.unwrap_or(false) {
            return Err(MediaError::InputNotFound(video.to_path_buf()));
        }

        let output_dir = match output_hint {
            Some(dir) => {
                fs::create_dir_all(dir).await?;
                dir.to_path_buf()
            }
            None => resolve_output_dir(video, &self.config).await?,
        };

        Ok(ExtractionJob::new(video, output_dir, metadata))
    }

    /// Prepare and run one video end to end.
    pub async fn extract(
        &self,
        video: &Path,
        output_hint: Option<&Path>,
        metadata: VideoMetadata,
        progress: &dyn ProgressSink,
    ) -> ExtractionResult {
        let sink = MonotonicSink::new(progress, self.config.force_midpoint_on_unparsable);
        sink.milestone(PROGRESS_ACCEPTED);

        match self.prepare(video, output_hint, metadata).await {
            Ok(job) => self.run_with(&job, &sink).await,
            Err(e) => {
                error!(video = %video.display(), "Error processing {}: {}", video.display(), e);
                ExtractionResult::failed(video, None, 0, e.detail())
            }
        }
    }

    /// Run a prepared job.
    pub async fn run(&self, job: &ExtractionJob, progress: &dyn ProgressSink) -> ExtractionResult {
        let sink = MonotonicSink::new(progress, self.config.force_midpoint_on_unparsable);
        sink.milestone(PROGRESS_ACCEPTED);
        self.run_with(job, &sink).await
    }

    async fn run_with(&self, job: &ExtractionJob, sink: &MonotonicSink<'_>) -> ExtractionResult {
        let mut phase = JobPhase::NotStarted;
        let format = self.config.output_format.as_str();

        if self.config.clear_existing_frames {
            match clear_frames(&job.output_dir, format).await {
                Ok(0) => {}
                Ok(n) => debug!(job_id = %job.id, "Removed {} old frames", n),
                Err(e) => warn!(job_id = %job.id, "Failed to clear old frames: {}", e),
            }
        }

        let cmd = build_keyframe_command(&job.video_path, &job.output_dir, &self.config);
        transition(&job.id, &mut phase, JobPhase::Running);

        let outcome = self.runner.run(&cmd, sink).await;
        let result = match outcome {
            Ok(_) => self.finish_success(job).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(result) => {
                sink.milestone(PROGRESS_DONE);
                transition(&job.id, &mut phase, JobPhase::Succeeded);
                info!(
                    job_id = %job.id,
                    "Extracted {} frames from {}",
                    result.frame_count,
                    job.video_name()
                );
                result
            }
            Err(e) => {
                let partial = count_frames(&job.output_dir, format).await.unwrap_or(0);
                transition(&job.id, &mut phase, JobPhase::Failed);
                error!(job_id = %job.id, "Error processing {}: {}", job.video_name(), e);
                ExtractionResult::failed(&job.video_path, Some(job.output_dir.clone()), partial, e.detail())
            }
        }
    }

    async fn finish_success(&self, job: &ExtractionJob) -> MediaResult<ExtractionResult> {
        let format = self.config.output_format.as_str();
        let result = if self.list_frames {
            let frames = list_frames(&job.output_dir, format).await?;
            let relative = relative_frame_paths(&frames, &self.config.output_root, &job.output_dir);
            ExtractionResult::success(&job.video_path, &job.output_dir, frames.len()).with_frames(relative)
        } else {
            let count = count_frames(&job.output_dir, format).await?;
            ExtractionResult::success(&job.video_path, &job.output_dir, count)
        };
        Ok(result)
    }
}

fn transition(job_id: &JobId, phase: &mut JobPhase, next: JobPhase) {
    if phase.can_transition_to(next) {
        debug!(job_id = %job_id, "Job phase {} -> {}", phase, next);
        *phase = next;
    } else {
        warn!(job_id = %job_id, "Ignoring job phase change {} -> {}", phase, next);
    }
}
