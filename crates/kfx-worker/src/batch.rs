//! Batch traversal of an input directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use kfx_media::{expected_output_dir, FfmpegRunner, KeyframeExtractor, NoopProgress};
use kfx_models::{ExtractionConfig, ExtractionResult, VideoMetadata};

use crate::error::{WorkerError, WorkerResult};
use crate::metadata::MetadataResolver;
use crate::recorder::LogRecorder;

/// Every file under `root` with an allowed video extension, in path order.
pub fn discover_videos(root: &Path, config: &ExtractionConfig) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| config.is_allowed_video(p))
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Runs one extraction job per discovered video and records the outcomes.
pub struct BatchCoordinator {
    config: ExtractionConfig,
    resolver: Arc<dyn MetadataResolver>,
    runner: FfmpegRunner,
}

impl BatchCoordinator {
    pub fn new(mut config: ExtractionConfig, resolver: Arc<dyn MetadataResolver>) -> Self {
        for correction in config.sanitize() {
            warn!("Configuration corrected: {}", correction);
        }

        Self {
            config,
            resolver,
            runner: FfmpegRunner::new(),
        }
    }

    pub fn with_runner(mut self, runner: FfmpegRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Process every video under the input root, then flush the logs once.
    ///
    /// A missing input root is the only error; per-video failures are
    /// returned as failed results. Results are in discovery order. A log
    /// that cannot be written is reported but does not discard the results.
    pub async fn run(&self, recorder: &mut LogRecorder) -> WorkerResult<Vec<ExtractionResult>> {
        let root = &self.config.input_path;
        if !root.is_dir() {
            return Err(WorkerError::config(format!(
                "Input directory {} does not exist",
                root.display()
            )));
        }

        let videos = discover_videos(root, &self.config);
        if videos.is_empty() {
            warn!("No video files found in {}", root.display());
            return Ok(Vec::new());
        }

        info!("Found {} videos to process", videos.len());

        let planned: Vec<(PathBuf, VideoMetadata)> = videos
            .into_iter()
            .map(|video| {
                let metadata = self.resolver.resolve(&file_name(&video));
                (video, metadata)
            })
            .collect();

        let parallelism = self.parallelism_for(&planned);
        let extractor = KeyframeExtractor::new(self.config.clone()).with_runner(self.runner.clone());
        let total = planned.len();

        let results: Vec<ExtractionResult> = stream::iter(planned.iter().enumerate())
            .map(|(idx, (video, metadata))| {
                let extractor = &extractor;
                async move {
                    info!("Processing {}/{}: {}", idx + 1, total, file_name(video));
                    extractor.extract(video, None, metadata.clone(), &NoopProgress).await
                }
            })
            .buffered(parallelism)
            .collect()
            .await;

        for (result, (_, metadata)) in results.iter().zip(&planned) {
            recorder.record(result, Some(metadata));
        }
        if let Err(e) = recorder.flush(&self.config) {
            error!("Failed to write extraction logs: {}", e);
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(
            "Batch finished: {} succeeded, {} failed",
            succeeded,
            results.len() - succeeded
        );

        Ok(results)
    }

    /// Concurrency for this batch; serial unless every output directory is distinct.
    fn parallelism_for(&self, planned: &[(PathBuf, VideoMetadata)]) -> usize {
        let parallelism = self.config.effective_parallelism();
        if parallelism <= 1 {
            return 1;
        }

        let mut seen = HashSet::new();
        for (video, _) in planned {
            let dir = expected_output_dir(video, &self.config).ok();
            if !seen.insert(dir) {
                warn!(
                    "Output directories collide ({}), processing batch serially",
                    video.display()
                );
                return 1;
            }
        }

        info!("Processing batch with {} concurrent jobs", parallelism);
        parallelism
    }
}
