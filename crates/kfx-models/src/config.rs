//! Extraction configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default input root
pub const DEFAULT_INPUT_ROOT: &str = "videos";
/// Default output root
pub const DEFAULT_OUTPUT_ROOT: &str = "extracted_frames";
/// Default FFmpeg executable (resolved on PATH)
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
/// Default extraction log file
pub const DEFAULT_LOG_FILE: &str = "extraction_log.csv";
/// Default metadata table
pub const DEFAULT_METADATA_CSV: &str = "video_metadata.csv";

/// Default FFmpeg thread hint
pub const DEFAULT_THREADS: u32 = 4;
/// Highest quality (FFmpeg `-q:v` uses 1-31, lower is better)
pub const DEFAULT_QUALITY: u8 = 1;
/// Default output image format
pub const DEFAULT_FORMAT: &str = "png";
/// Default frame filename pattern
pub const DEFAULT_FRAME_PATTERN: &str = "frame_%04d.png";
/// Default allowed video extensions
pub const VALID_EXTENSIONS: &[&str] = &[".mp4"];

pub const DEFAULT_OVERWRITE: bool = false;
pub const DEFAULT_MAINTAIN_HIERARCHY: bool = true;

/// Pattern substituted when the configured one has no numeric placeholder.
pub fn fallback_frame_pattern(format: &str) -> String {
    format!("frame_%03d.{}", format)
}

/// Resolved settings for one extraction batch.
///
/// Owned by the orchestrating caller and treated as immutable for the
/// duration of a batch. Service jobs get a per-job clone with overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Input file or root directory
    pub input_path: PathBuf,
    /// Root under which per-video frame directories are created
    pub output_root: PathBuf,
    /// FFmpeg executable (name on PATH or explicit path)
    pub ffmpeg_path: PathBuf,
    /// Thread hint passed verbatim to FFmpeg
    pub threads: u32,
    /// Frame filename pattern, e.g. `frame_%04d.png`
    pub frame_pattern: String,
    /// Output image format / extension without the dot
    pub output_format: String,
    /// Allowed video extensions, lowercase with leading dot
    pub video_extensions: BTreeSet<String>,
    /// FFmpeg `-q:v` value
    pub quality: u8,
    /// Pass `-y` to FFmpeg
    pub overwrite: bool,
    /// Mirror the input directory structure under the output root
    pub maintain_hierarchy: bool,
    /// Write frames next to the video (`video_parent/video_stem`)
    pub use_parent_dir: bool,
    /// Remove stale frames from the output dir before extracting
    #[serde(default)]
    pub clear_existing_frames: bool,
    /// Extraction log destination
    pub log_file: Option<PathBuf>,
    /// Metadata table destination
    pub metadata_csv: Option<PathBuf>,
    /// Legacy behavior: an unparsable progress marker forces 50%
    #[serde(default)]
    pub force_midpoint_on_unparsable: bool,
    /// Max concurrent jobs within one batch
    #[serde(default = "default_batch_parallelism")]
    pub batch_parallelism: usize,
}

fn default_batch_parallelism() -> usize {
    1
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_ROOT),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG_PATH),
            threads: DEFAULT_THREADS,
            frame_pattern: DEFAULT_FRAME_PATTERN.to_string(),
            output_format: DEFAULT_FORMAT.to_string(),
            video_extensions: VALID_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            quality: DEFAULT_QUALITY,
            overwrite: DEFAULT_OVERWRITE,
            maintain_hierarchy: DEFAULT_MAINTAIN_HIERARCHY,
            use_parent_dir: false,
            clear_existing_frames: false,
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            metadata_csv: Some(PathBuf::from(DEFAULT_METADATA_CSV)),
            force_midpoint_on_unparsable: false,
            batch_parallelism: default_batch_parallelism(),
        }
    }
}

impl ExtractionConfig {
    /// Create a config for the given input and output roots.
    pub fn new(input_path: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_root: output_root.into(),
            ..Default::default()
        }
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = format.into();
        self
    }

    pub fn with_frame_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.frame_pattern = pattern.into();
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.video_extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .collect();
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_maintain_hierarchy(mut self, maintain: bool) -> Self {
        self.maintain_hierarchy = maintain;
        self
    }

    pub fn with_use_parent_dir(mut self, use_parent_dir: bool) -> Self {
        self.use_parent_dir = use_parent_dir;
        self
    }

    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    pub fn with_metadata_csv(mut self, path: Option<PathBuf>) -> Self {
        self.metadata_csv = path;
        self
    }

    pub fn with_batch_parallelism(mut self, parallelism: usize) -> Self {
        self.batch_parallelism = parallelism;
        self
    }

    /// Service-mode settings: always overwrite and clear stale frames first.
    pub fn for_service(mut self) -> Self {
        self.overwrite = true;
        self.clear_existing_frames = true;
        self
    }

    /// Check whether a path carries one of the allowed video extensions.
    pub fn is_allowed_video(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.video_extensions.contains(&normalize_extension(e)))
            .unwrap_or(false)
    }

    /// Directory that mirrored output paths are computed relative to.
    ///
    /// The input path itself when it is a directory, otherwise its parent.
    pub fn input_base(&self) -> PathBuf {
        if self.input_path.is_dir() {
            self.input_path.clone()
        } else {
            self.input_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
        }
    }

    /// Effective number of concurrent jobs in a batch.
    pub fn effective_parallelism(&self) -> usize {
        self.batch_parallelism.clamp(1, self.threads.max(1) as usize)
    }

    /// Auto-correct configuration defects in place.
    ///
    /// Never fails; every correction is returned so the caller can log it.
    pub fn sanitize(&mut self) -> Vec<ConfigCorrection> {
        let mut corrections = Vec::new();

        if self.threads == 0 {
            self.threads = DEFAULT_THREADS;
            corrections.push(ConfigCorrection::Threads(DEFAULT_THREADS));
        }

        let trimmed = self.output_format.trim().trim_start_matches('.').to_lowercase();
        if trimmed.is_empty() {
            self.output_format = DEFAULT_FORMAT.to_string();
            corrections.push(ConfigCorrection::OutputFormat(self.output_format.clone()));
        } else if trimmed != self.output_format {
            self.output_format = trimmed;
            corrections.push(ConfigCorrection::OutputFormat(self.output_format.clone()));
        }

        if let Some(pattern) = pattern_with_format(&self.frame_pattern, &self.output_format) {
            self.frame_pattern = pattern;
            corrections.push(ConfigCorrection::FramePattern(self.frame_pattern.clone()));
        }

        let normalized: BTreeSet<String> = self
            .video_extensions
            .iter()
            .filter(|e| !e.trim().trim_start_matches('.').is_empty())
            .map(|e| normalize_extension(e))
            .collect();
        if normalized.is_empty() {
            self.video_extensions = VALID_EXTENSIONS.iter().map(|e| e.to_string()).collect();
            corrections.push(ConfigCorrection::Extensions);
        } else if normalized != self.video_extensions {
            self.video_extensions = normalized;
            corrections.push(ConfigCorrection::Extensions);
        }

        if self.batch_parallelism == 0 {
            self.batch_parallelism = 1;
            corrections.push(ConfigCorrection::BatchParallelism(1));
        }

        corrections
    }
}

/// The pattern with its extension replaced by `format`, or `None` when it already matches.
fn pattern_with_format(pattern: &str, format: &str) -> Option<String> {
    let path = Path::new(pattern);
    path.file_name()?;
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(format) => None,
        // `frame.%04d`: the placeholder sits in the extension, keep it
        Some(ext) if ext.contains('%') => Some(format!("{}.{}", pattern, format)),
        Some(_) => Some(path.with_extension(format).to_string_lossy().into_owned()),
        None => Some(format!("{}.{}", pattern, format)),
    }
}

/// Normalize an extension to lowercase with a leading dot.
pub fn normalize_extension(ext: &str) -> String {
    format!(".{}", ext.trim().trim_start_matches('.').to_lowercase())
}

/// A configuration defect that was corrected automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigCorrection {
    /// Thread count was zero and was reset
    Threads(u32),
    /// Output format was empty or not normalized
    OutputFormat(String),
    /// Frame pattern extension did not match the output format
    FramePattern(String),
    /// Extension list was empty or not normalized
    Extensions,
    /// Batch parallelism was zero and was reset
    BatchParallelism(usize),
}

impl fmt::Display for ConfigCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigCorrection::Threads(n) => write!(f, "thread count must be positive, using {}", n),
            ConfigCorrection::OutputFormat(fmt_) => write!(f, "output format normalized to '{}'", fmt_),
            ConfigCorrection::FramePattern(p) => {
                write!(f, "frame pattern must match the output format, using '{}'", p)
            }
            ConfigCorrection::Extensions => write!(f, "video extension list normalized"),
            ConfigCorrection::BatchParallelism(n) => {
                write!(f, "batch parallelism must be positive, using {}", n)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ExtractionConfig::default();
        assert_eq!(cfg.threads, 4);
        assert_eq!(cfg.quality, 1);
        assert_eq!(cfg.output_format, "png");
        assert_eq!(cfg.frame_pattern, "frame_%04d.png");
        assert!(cfg.maintain_hierarchy);
        assert!(!cfg.overwrite);
        assert!(cfg.video_extensions.contains(".mp4"));
    }

    #[test]
    fn test_allowed_video_is_case_insensitive() {
        let cfg = ExtractionConfig::default().with_extensions(["mp4", ".MOV"]);
        assert!(cfg.is_allowed_video(Path::new("a/b/clip.MP4")));
        assert!(cfg.is_allowed_video(Path::new("clip.mov")));
        assert!(!cfg.is_allowed_video(Path::new("clip.avi")));
        assert!(!cfg.is_allowed_video(Path::new("noext")));
    }

    #[test]
    fn test_sanitize_corrects_defects() {
        let mut cfg = ExtractionConfig::default()
            .with_threads(0)
            .with_output_format(".JPG")
            .with_batch_parallelism(0);
        cfg.video_extensions.clear();

        let corrections = cfg.sanitize();

        assert_eq!(cfg.threads, DEFAULT_THREADS);
        assert_eq!(cfg.output_format, "jpg");
        assert_eq!(cfg.frame_pattern, "frame_%04d.jpg");
        assert_eq!(cfg.batch_parallelism, 1);
        assert!(cfg.video_extensions.contains(".mp4"));
        assert_eq!(corrections.len(), 5);
        assert!(corrections.contains(&ConfigCorrection::FramePattern("frame_%04d.jpg".into())));
    }

    #[test]
    fn test_sanitize_leaves_valid_config_alone() {
        let mut cfg = ExtractionConfig::default();
        assert!(cfg.sanitize().is_empty());
    }

    #[test]
    fn test_sanitize_aligns_pattern_extension() {
        let mut cfg = ExtractionConfig::default().with_frame_pattern("kf_%03d");
        assert_eq!(
            cfg.sanitize(),
            vec![ConfigCorrection::FramePattern("kf_%03d.png".into())]
        );
        assert_eq!(cfg.frame_pattern, "kf_%03d.png");

        let mut cfg = ExtractionConfig::default().with_frame_pattern("frame.%04d");
        cfg.sanitize();
        assert_eq!(cfg.frame_pattern, "frame.%04d.png");

        let mut cfg = ExtractionConfig::default().with_frame_pattern("frame_%04d.PNG");
        assert!(cfg.sanitize().is_empty());
    }

    #[test]
    fn test_effective_parallelism_bounded_by_threads() {
        let cfg = ExtractionConfig::default().with_threads(2).with_batch_parallelism(8);
        assert_eq!(cfg.effective_parallelism(), 2);
        let cfg = ExtractionConfig::default().with_batch_parallelism(1);
        assert_eq!(cfg.effective_parallelism(), 1);
    }

    #[test]
    fn test_fallback_pattern() {
        assert_eq!(fallback_frame_pattern("png"), "frame_%03d.png");
    }
}
