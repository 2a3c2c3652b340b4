//! Frame files on disk.
//!
//! The filesystem is the ground truth for how many frames a job produced;
//! FFmpeg's own frame counter is only used for progress.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::MediaResult;

fn has_extension(path: &Path, format: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(format.trim_start_matches('.')))
        .unwrap_or(false)
}

/// Frame files with the given extension directly inside `dir`, sorted by name.
pub async fn list_frames(dir: &Path, format: &str) -> MediaResult<Vec<PathBuf>> {
    let mut frames = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && has_extension(&path, format) {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

/// Number of frame files with the given extension directly inside `dir`.
///
/// A missing directory counts as zero frames.
pub async fn count_frames(dir: &Path, format: &str) -> MediaResult<usize> {
    if !fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(0);
    }
    Ok(list_frames(dir, format).await?.len())
}

/// Remove stale frames before a fresh extraction. Returns how many were removed.
///
/// Individual removal failures are logged and skipped.
pub async fn clear_frames(dir: &Path, format: &str) -> MediaResult<usize> {
    if !fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(0);
    }

    let mut removed = 0;
    for frame in list_frames(dir, format).await? {
        match fs::remove_file(&frame).await {
            Ok(()) => {
                debug!("Removed old frame: {}", frame.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove old frame {}: {}", frame.display(), e),
        }
    }
    Ok(removed)
}

/// Frame paths relative to the output root, sorted.
///
/// Frames outside the root are reported as `<output dir name>/<file name>`.
pub fn relative_frame_paths(frames: &[PathBuf], output_root: &Path, output_dir: &Path) -> Vec<String> {
    let dir_name = output_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut paths: Vec<String> = frames
        .iter()
        .map(|frame| match frame.strip_prefix(output_root) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => {
                let file = frame
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("{}/{}", dir_name, file)
            }
        })
        .collect();
    paths.sort();
    paths
}

/// Frames grouped by the directory they were extracted into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSet {
    /// Directory name (the video stem)
    pub video_name: String,
    /// Directory relative to the output root
    pub path: String,
    pub frame_count: usize,
    /// Frames relative to the output root
    pub frames: Vec<String>,
}

/// Walk the output root and collect every directory holding frames.
///
/// With `video_stem`, only directories named after that stem are returned.
pub fn find_frame_sets(output_root: &Path, format: &str, video_stem: Option<&str>) -> Vec<FrameSet> {
    let mut sets = Vec::new();

    for entry in WalkDir::new(output_root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        let dir = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if video_stem.is_some_and(|stem| stem != name) {
            continue;
        }

        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)
            .into_iter()
            .flatten()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && has_extension(p, format))
            .collect();
        if frames.is_empty() {
            continue;
        }
        frames.sort();

        sets.push(FrameSet {
            video_name: name,
            path: dir
                .strip_prefix(output_root)
                .unwrap_or(dir)
                .to_string_lossy()
                .into_owned(),
            frame_count: frames.len(),
            frames: relative_frame_paths(&frames, output_root, dir),
        });
    }

    sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[tokio::test]
    async fn test_count_only_matching_extension() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("frame_0001.png"));
        touch(&dir.path().join("frame_0002.PNG"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("sub/frame_0003.png"));

        assert_eq!(count_frames(dir.path(), "png").await.unwrap(), 2);
        assert_eq!(count_frames(dir.path(), "jpg").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_missing_dir_is_zero() {
        let dir = TempDir::new().unwrap();
        assert_eq!(count_frames(&dir.path().join("nope"), "png").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_frames_keeps_other_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("frame_0001.png"));
        touch(&dir.path().join("frame_0002.png"));
        touch(&dir.path().join("keep.txt"));

        assert_eq!(clear_frames(dir.path(), "png").await.unwrap(), 2);
        assert!(dir.path().join("keep.txt").exists());
        assert_eq!(count_frames(dir.path(), "png").await.unwrap(), 0);
    }

    #[test]
    fn test_relative_paths_sorted() {
        let root = Path::new("/data/out");
        let out_dir = root.join("a/clip");
        let frames = vec![out_dir.join("frame_0002.png"), out_dir.join("frame_0001.png")];
        assert_eq!(
            relative_frame_paths(&frames, root, &out_dir),
            vec!["a/clip/frame_0001.png", "a/clip/frame_0002.png"]
        );

        let elsewhere = vec![PathBuf::from("/tmp/clip/frame_0001.png")];
        assert_eq!(
            relative_frame_paths(&elsewhere, root, Path::new("/tmp/clip")),
            vec!["clip/frame_0001.png"]
        );
    }

    #[test]
    fn test_find_frame_sets_filters_by_stem() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/one/frame_0001.png"));
        touch(&dir.path().join("two/frame_0001.png"));
        touch(&dir.path().join("two/frame_0002.png"));
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();

        let all = find_frame_sets(dir.path(), "png", None);
        assert_eq!(all.len(), 2);

        let two = find_frame_sets(dir.path(), "png", Some("two"));
        assert_eq!(two.len(), 1);
        assert_eq!(two[0].frame_count, 2);
        assert_eq!(two[0].path, "two");
        assert_eq!(two[0].frames, vec!["two/frame_0001.png", "two/frame_0002.png"]);
    }
}
