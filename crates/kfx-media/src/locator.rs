//! Locating the FFmpeg executable.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Well-known install locations tried after `PATH`.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "/usr/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "/opt/homebrew/bin/ffmpeg",
    "C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe",
    "C:\\ffmpeg\\bin\\ffmpeg.exe",
];

/// Resolves the path of the extraction tool.
pub trait ToolLocator: Send + Sync {
    fn locate(&self) -> MediaResult<PathBuf>;
}

/// Locator driven by the configured tool path.
///
/// An explicit path to an existing file wins. Otherwise the configured
/// value is looked up on `PATH` by name, then each candidate is tried.
#[derive(Debug, Clone)]
pub struct ConfiguredToolLocator {
    configured: PathBuf,
    candidates: Vec<PathBuf>,
}

impl ConfiguredToolLocator {
    pub fn new(configured: impl Into<PathBuf>) -> Self {
        Self {
            configured: configured.into(),
            candidates: DEFAULT_CANDIDATES.iter().map(PathBuf::from).collect(),
        }
    }

    /// Replace the fallback candidate list.
    pub fn with_candidates<I, P>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }
}

impl ToolLocator for ConfiguredToolLocator {
    fn locate(&self) -> MediaResult<PathBuf> {
        if self.configured.is_file() {
            debug!("Using configured FFmpeg: {}", self.configured.display());
            return Ok(self.configured.clone());
        }

        if let Ok(found) = which::which(&self.configured) {
            debug!("Found FFmpeg on PATH: {}", found.display());
            return Ok(found);
        }

        if let Some(found) = self.candidates.iter().find(|c| c.is_file()) {
            info!("Using FFmpeg from fallback location: {}", found.display());
            return Ok(found.clone());
        }

        Err(MediaError::ToolNotFound(self.configured.display().to_string()))
    }
}

/// Run `<tool> -version` and return the first line of its output.
pub async fn probe_version(tool: &Path) -> MediaResult<String> {
    let output = Command::new(tool)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::ToolNotFound(tool.display().to_string()),
            _ => MediaError::from(e),
        })?;

    if !output.status.success() {
        return Err(MediaError::tool_failed(
            "FFmpeg version probe failed",
            Some(String::from_utf8_lossy(&output.stderr).into_owned()),
            output.status.code(),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}
