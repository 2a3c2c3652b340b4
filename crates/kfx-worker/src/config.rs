//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use kfx_models::config::{normalize_extension, DEFAULT_LOG_FILE, DEFAULT_METADATA_CSV};
use kfx_models::ExtractionConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Extraction settings shared by every job
    pub extraction: ExtractionConfig,
    /// Maximum concurrent service jobs (1 keeps the single-flight behavior)
    pub max_concurrent_jobs: usize,
    /// Upper bound on one tool run
    pub job_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            max_concurrent_jobs: 1,
            job_timeout: Duration::from_secs(3600), // 1 hour
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|s| match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

/// Optional file path; an empty value disables the file.
fn env_optional_path(key: &str, default: &str) -> Option<PathBuf> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => None,
        Ok(value) => Some(PathBuf::from(value)),
        Err(_) => Some(PathBuf::from(default)),
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = ExtractionConfig::default();

        let video_extensions = std::env::var("KFX_VIDEO_EXTENSIONS")
            .ok()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(normalize_extension)
                    .collect()
            })
            .unwrap_or(defaults.video_extensions);

        let extraction = ExtractionConfig {
            input_path: std::env::var("KFX_INPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.input_path),
            output_root: std::env::var("KFX_OUTPUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_root),
            ffmpeg_path: std::env::var("KFX_FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            threads: env_parse("KFX_THREADS").unwrap_or(defaults.threads),
            frame_pattern: std::env::var("KFX_FRAME_PATTERN").unwrap_or(defaults.frame_pattern),
            output_format: std::env::var("KFX_OUTPUT_FORMAT").unwrap_or(defaults.output_format),
            video_extensions,
            quality: env_parse("KFX_QUALITY").unwrap_or(defaults.quality),
            overwrite: env_bool("KFX_OVERWRITE").unwrap_or(defaults.overwrite),
            maintain_hierarchy: env_bool("KFX_MAINTAIN_HIERARCHY").unwrap_or(defaults.maintain_hierarchy),
            use_parent_dir: env_bool("KFX_USE_PARENT_DIR").unwrap_or(defaults.use_parent_dir),
            clear_existing_frames: defaults.clear_existing_frames,
            log_file: env_optional_path("KFX_LOG_FILE", DEFAULT_LOG_FILE),
            metadata_csv: env_optional_path("KFX_METADATA_CSV", DEFAULT_METADATA_CSV),
            force_midpoint_on_unparsable: env_bool("KFX_FORCE_MIDPOINT_PROGRESS")
                .unwrap_or(defaults.force_midpoint_on_unparsable),
            batch_parallelism: env_parse("KFX_BATCH_PARALLELISM").unwrap_or(defaults.batch_parallelism),
        };

        Self {
            extraction,
            max_concurrent_jobs: env_parse("KFX_MAX_CONCURRENT_JOBS").unwrap_or(1),
            job_timeout: Duration::from_secs(env_parse("KFX_JOB_TIMEOUT_SECS").unwrap_or(3600)),
            shutdown_timeout: Duration::from_secs(env_parse("KFX_SHUTDOWN_TIMEOUT_SECS").unwrap_or(30)),
        }
    }

    pub fn with_extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = extraction;
        self
    }

    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }
}
