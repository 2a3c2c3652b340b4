//! Single-file and directory entry points.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use kfx_media::{FfmpegRunner, KeyframeExtractor, ProgressSink};
use kfx_models::{ExtractionConfig, ExtractionResult};

use crate::batch::BatchCoordinator;
use crate::error::{WorkerError, WorkerResult};
use crate::metadata::{FilenameMetadataResolver, MetadataResolver};
use crate::recorder::LogRecorder;

/// Extraction front end owning the configuration and the run log.
pub struct FrameExtractor {
    config: ExtractionConfig,
    resolver: Arc<dyn MetadataResolver>,
    runner: FfmpegRunner,
    recorder: LogRecorder,
}

impl FrameExtractor {
    /// Create an extractor; configuration defects are corrected with a warning.
    pub fn new(mut config: ExtractionConfig) -> Self {
        for correction in config.sanitize() {
            warn!("Configuration corrected: {}", correction);
        }

        Self {
            config,
            resolver: Arc::new(FilenameMetadataResolver),
            runner: FfmpegRunner::new(),
            recorder: LogRecorder::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn MetadataResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_runner(mut self, runner: FfmpegRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn recorder(&self) -> &LogRecorder {
        &self.recorder
    }

    /// Extract one video and record it in the run log.
    ///
    /// `output_hint` names the output directory explicitly.
    pub async fn process(
        &mut self,
        video: &Path,
        output_hint: Option<&Path>,
        progress: &dyn ProgressSink,
    ) -> ExtractionResult {
        let name = video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = self.resolver.resolve(&name);
        info!(
            "Processing video: {} ({} in {})",
            name,
            metadata.get_or("emotion_full", "unknown"),
            metadata.get_or("language_full", "unknown")
        );

        let extractor = KeyframeExtractor::new(self.config.clone()).with_runner(self.runner.clone());
        let result = extractor.extract(video, output_hint, metadata.clone(), progress).await;
        self.recorder.record(&result, Some(&metadata));
        result
    }

    /// Dispatch on the configured input path.
    ///
    /// A video file is processed on its own, a directory runs a batch, and a
    /// file with an unsupported extension yields no results.
    pub async fn process_input(&mut self) -> WorkerResult<Vec<ExtractionResult>> {
        let input = self.config.input_path.clone();
        info!("Processing input: {}", input.display());

        if input.is_file() {
            if !self.config.is_allowed_video(&input) {
                warn!("Input file {} is not a supported video format", input.display());
                return Ok(Vec::new());
            }
            let result = self.process(&input, None, &kfx_media::NoopProgress).await;
            if let Err(e) = self.recorder.flush(&self.config) {
                error!("Failed to write extraction logs: {}", e);
            }
            Ok(vec![result])
        } else if input.is_dir() {
            self.process_directory().await
        } else {
            error!("Input path {} does not exist", input.display());
            Err(WorkerError::config(format!(
                "Input path {} does not exist",
                input.display()
            )))
        }
    }

    /// Run a batch over the configured input directory.
    pub async fn process_directory(&mut self) -> WorkerResult<Vec<ExtractionResult>> {
        let batch = BatchCoordinator::new(self.config.clone(), Arc::clone(&self.resolver))
            .with_runner(self.runner.clone());
        batch.run(&mut self.recorder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_input_is_config_error() {
        let dir = TempDir::new().unwrap();
        let cfg = ExtractionConfig::new(dir.path().join("nope"), dir.path().join("out"));
        let err = FrameExtractor::new(cfg).process_input().await.unwrap_err();
        assert!(matches!(err, WorkerError::Config(_)));
    }

    #[tokio::test]
    async fn test_unsupported_file_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"hello").unwrap();

        let cfg = ExtractionConfig::new(&notes, dir.path().join("out")).with_log_file(None);
        let mut extractor = FrameExtractor::new(cfg);
        assert!(extractor.process_input().await.unwrap().is_empty());
        assert!(extractor.recorder().is_empty());
    }

    #[test]
    fn test_new_sanitizes_config() {
        let cfg = ExtractionConfig::new("in", "out").with_threads(0).with_output_format(".PNG");
        let extractor = FrameExtractor::new(cfg);
        assert_eq!(extractor.config().threads, 4);
        assert_eq!(extractor.config().output_format, "png");
    }
}
