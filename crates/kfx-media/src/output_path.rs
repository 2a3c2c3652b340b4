//! Output directory resolution.
//!
//! Frames for a video land in one directory per video. Depending on the
//! configuration that directory mirrors the input hierarchy, sits flat
//! under the output root, or sits next to the video itself.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use kfx_models::ExtractionConfig;

use crate::error::{MediaError, MediaResult};

/// How the output directory is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `video_parent / video_stem`
    ParentDir,
    /// `output_root / relative_path_without_extension`
    Mirrored,
    /// `output_root / video_stem`
    Flat,
}

impl OutputLayout {
    pub fn for_config(config: &ExtractionConfig) -> Self {
        if config.use_parent_dir {
            OutputLayout::ParentDir
        } else if config.maintain_hierarchy {
            OutputLayout::Mirrored
        } else {
            OutputLayout::Flat
        }
    }
}

fn stem(video: &Path) -> MediaResult<&std::ffi::OsStr> {
    video
        .file_stem()
        .ok_or_else(|| MediaError::path_resolution(video, "video path has no file name"))
}

/// Deterministic fallback: `output_root / video_stem`.
pub fn fallback_output_dir(video: &Path, config: &ExtractionConfig) -> MediaResult<PathBuf> {
    Ok(config.output_root.join(stem(video)?))
}

/// Output directory the configuration asks for, without touching the disk
/// beyond checking whether the input path is a directory.
pub fn planned_output_dir(video: &Path, config: &ExtractionConfig) -> MediaResult<PathBuf> {
    match OutputLayout::for_config(config) {
        OutputLayout::ParentDir => {
            let parent = video.parent().unwrap_or_else(|| Path::new(""));
            Ok(parent.join(stem(video)?))
        }
        OutputLayout::Mirrored => {
            let base = config.input_base();
            let relative = video.strip_prefix(&base).map_err(|_| {
                MediaError::path_resolution(
                    video,
                    format!("not under input root {}", base.display()),
                )
            })?;
            if relative.file_stem().is_none() {
                return Err(MediaError::path_resolution(video, "video path has no file name"));
            }
            Ok(config.output_root.join(relative.with_extension("")))
        }
        OutputLayout::Flat => fallback_output_dir(video, config),
    }
}

/// Output directory after applying the fallback, without creating it.
pub fn expected_output_dir(video: &Path, config: &ExtractionConfig) -> MediaResult<PathBuf> {
    planned_output_dir(video, config).or_else(|_| fallback_output_dir(video, config))
}

/// Resolve and create the output directory for a video.
///
/// Idempotent: resolving the same video twice yields the same directory.
/// If the planned directory cannot be computed or created, falls back to
/// `output_root / video_stem` and logs a warning.
pub async fn resolve_output_dir(video: &Path, config: &ExtractionConfig) -> MediaResult<PathBuf> {
    let planned = match planned_output_dir(video, config) {
        Ok(dir) => match fs::create_dir_all(&dir).await {
            Ok(()) => Ok(dir),
            Err(e) => Err(MediaError::path_resolution(&dir, e.to_string())),
        },
        Err(e) => Err(e),
    };

    match planned {
        Ok(dir) => {
            debug!(video = %video.display(), "Output directory: {}", dir.display());
            Ok(dir)
        }
        Err(e) => {
            let fallback = fallback_output_dir(video, config)?;
            warn!(
                video = %video.display(),
                "Error creating output structure: {}. Using fallback path {}",
                e,
                fallback.display()
            );
            fs::create_dir_all(&fallback).await?;
            Ok(fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn config(input: &Path, output: &Path) -> ExtractionConfig {
        ExtractionConfig::new(input, output)
    }

    #[tokio::test]
    async fn test_mirrors_input_hierarchy() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("root");
        let output = dir.path().join("out");
        std::fs::create_dir_all(input.join("a/b")).unwrap();
        let video = input.join("a/b/x.mp4");
        std::fs::write(&video, b"").unwrap();

        let cfg = config(&input, &output).with_maintain_hierarchy(true);
        let resolved = resolve_output_dir(&video, &cfg).await.unwrap();

        assert_eq!(resolved, output.join("a/b/x"));
        assert!(resolved.is_dir());
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("root");
        std::fs::create_dir_all(&input).unwrap();
        let video = input.join("clip.mp4");
        let cfg = config(&input, &dir.path().join("out"));

        let first = assert_ok!(resolve_output_dir(&video, &cfg).await);
        let second = assert_ok!(resolve_output_dir(&video, &cfg).await);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_flat_layout_uses_stem() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input");
        std::fs::create_dir_all(input.join("nested")).unwrap();
        let output = dir.path().join("out");
        let cfg = config(&input, &output).with_maintain_hierarchy(false);

        let a = resolve_output_dir(&input.join("lang1_speakerA_emoH_s1.mp4"), &cfg).await.unwrap();
        let b = resolve_output_dir(&input.join("nested/lang1_speakerB_emoH_s1.mp4"), &cfg).await.unwrap();

        assert_eq!(a, output.join("lang1_speakerA_emoH_s1"));
        assert_eq!(b, output.join("lang1_speakerB_emoH_s1"));
    }

    #[tokio::test]
    async fn test_outside_input_root_falls_back() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input");
        std::fs::create_dir_all(&input).unwrap();
        let output = dir.path().join("out");
        let cfg = config(&input, &output).with_maintain_hierarchy(true);

        let elsewhere = dir.path().join("elsewhere/clip.mp4");
        assert_err!(planned_output_dir(&elsewhere, &cfg));

        let resolved = resolve_output_dir(&elsewhere, &cfg).await.unwrap();
        assert_eq!(resolved, output.join("clip"));
    }

    #[tokio::test]
    async fn test_parent_dir_layout_overrides_hierarchy() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input");
        std::fs::create_dir_all(input.join("a")).unwrap();
        let cfg = config(&input, &dir.path().join("out"))
            .with_maintain_hierarchy(true)
            .with_use_parent_dir(true);

        let video = input.join("a/clip.mp4");
        let resolved = resolve_output_dir(&video, &cfg).await.unwrap();
        assert_eq!(resolved, input.join("a/clip"));
    }

    #[test]
    fn test_single_file_input_uses_parent_as_base() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"").unwrap();
        let cfg = config(&video, &dir.path().join("out"));

        assert_eq!(expected_output_dir(&video, &cfg).unwrap(), dir.path().join("out/clip"));
    }
}
