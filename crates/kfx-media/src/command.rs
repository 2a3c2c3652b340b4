//! FFmpeg command builder.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

use kfx_models::config::fallback_frame_pattern;
use kfx_models::ExtractionConfig;

/// Filter that keeps only intra-coded frames.
pub const I_FRAME_FILTER: &str = "select='eq(pict_type,I)'";

static NUMERIC_PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

/// Whether a frame pattern contains a numeric placeholder such as `%d` or `%04d`.
pub fn has_numeric_placeholder(pattern: &str) -> bool {
    NUMERIC_PLACEHOLDER
        .get_or_init(|| Regex::new(r"%\d*d").expect("static placeholder regex"))
        .is_match(pattern)
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Executable to run
    program: PathBuf,
    /// Input file path
    input: PathBuf,
    /// Output file path or pattern
    output: PathBuf,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(program: impl AsRef<Path>, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: false,
        }
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set thread hint.
    pub fn threads(self, threads: u32) -> Self {
        self.output_arg("-threads").output_arg(threads.to_string())
    }

    /// Set video sync method.
    pub fn vsync(self, method: impl Into<String>) -> Self {
        self.output_arg("-vsync").output_arg(method)
    }

    /// Set image quality (`-q:v`, lower is better).
    pub fn quality(self, quality: u8) -> Self {
        self.output_arg("-q:v").output_arg(quality.to_string())
    }

    /// Set output muxer.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Force overwrite of existing output files.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Executable this command runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Input file.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Output file or pattern.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments (excluding the program).
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        // Overwrite flag
        if self.overwrite {
            args.push("-y".to_string());
        }

        // Input file
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        // Output args
        args.extend(self.output_args.clone());

        // Output file
        args.push(self.output.to_string_lossy().to_string());

        args
    }

    /// Render for logging.
    pub fn display(&self) -> String {
        format!("{} {}", self.program.display(), self.build_args().join(" "))
    }
}

/// Frame pattern to hand to FFmpeg.
///
/// A pattern without a numeric placeholder would make FFmpeg overwrite
/// one file per frame, so it is replaced by `frame_%03d.<format>`.
pub fn effective_frame_pattern(config: &ExtractionConfig) -> String {
    if has_numeric_placeholder(&config.frame_pattern) {
        config.frame_pattern.clone()
    } else {
        let pattern = fallback_frame_pattern(&config.output_format);
        warn!(
            configured = %config.frame_pattern,
            "Frame pattern has no numeric placeholder, using default frame pattern: {}",
            pattern
        );
        pattern
    }
}

/// Build the I-frame extraction command for one video.
///
/// Selects intra-coded frames only, with variable frame-rate sync so each
/// selected frame is written exactly once, named by the frame pattern.
pub fn build_keyframe_command(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> FfmpegCommand {
    let pattern = effective_frame_pattern(config);

    FfmpegCommand::new(&config.ffmpeg_path, input, output_dir.as_ref().join(pattern))
        .threads(config.threads)
        .video_filter(I_FRAME_FILTER)
        .vsync("vfr")
        .quality(config.quality)
        .format("image2")
        .overwrite(config.overwrite)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExtractionConfig {
        ExtractionConfig::new("videos", "frames").with_ffmpeg_path("/usr/bin/ffmpeg")
    }

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("ffmpeg", "input.mp4", "out/%03d.png")
            .threads(2)
            .quality(3)
            .overwrite(true);

        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        assert!(args.contains(&"-threads".to_string()));
        assert!(args.contains(&"2".to_string()));
        assert_eq!(args.last().unwrap(), "out/%03d.png");
    }

    #[test]
    fn test_keyframe_command_layout() {
        let cfg = config().with_threads(4).with_quality(1);
        let cmd = build_keyframe_command("videos/a.mp4", "frames/a", &cfg);

        assert_eq!(cmd.program(), Path::new("/usr/bin/ffmpeg"));
        assert_eq!(
            cmd.build_args(),
            vec![
                "-i",
                "videos/a.mp4",
                "-threads",
                "4",
                "-vf",
                "select='eq(pict_type,I)'",
                "-vsync",
                "vfr",
                "-q:v",
                "1",
                "-f",
                "image2",
                "frames/a/frame_%04d.png",
            ]
        );
    }

    #[test]
    fn test_overwrite_prepends_force_flag() {
        let cfg = config().with_overwrite(true);
        let args = build_keyframe_command("a.mp4", "out", &cfg).build_args();
        assert_eq!(args[0], "-y");

        let cfg = config().with_overwrite(false);
        let args = build_keyframe_command("a.mp4", "out", &cfg).build_args();
        assert!(!args.contains(&"-y".to_string()));
    }

    #[test]
    fn test_pattern_without_placeholder_is_replaced() {
        let cfg = config().with_frame_pattern("out.png").with_output_format("png");
        let cmd = build_keyframe_command("a.mp4", "frames/a", &cfg);
        assert_eq!(cmd.output(), Path::new("frames/a/frame_%03d.png"));
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(has_numeric_placeholder("frame_%d.png"));
        assert!(has_numeric_placeholder("frame_%04d.png"));
        assert!(has_numeric_placeholder("%3d.jpg"));
        assert!(!has_numeric_placeholder("out.png"));
        assert!(!has_numeric_placeholder("frame_%s.png"));
    }
}
