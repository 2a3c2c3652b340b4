//! Extraction outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Final status of one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Success,
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Success => "success",
            ExtractionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown extraction status: {0}")]
pub struct ParseStatusError(String);

impl FromStr for ExtractionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ExtractionStatus::Success),
            "failed" => Ok(ExtractionStatus::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Outcome of one extraction job.
///
/// `error` is present if and only if `status` is [`ExtractionStatus::Failed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Input video
    pub video_path: PathBuf,
    /// Success or failure
    pub status: ExtractionStatus,
    /// Frames present in the output directory (0 when nothing was produced)
    pub frame_count: usize,
    /// Resolved output directory, if resolution got that far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Diagnostic text or error message for failed jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Produced frame paths relative to the output root (service mode)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<String>,
}

impl ExtractionResult {
    /// A successful extraction.
    pub fn success(video_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, frame_count: usize) -> Self {
        Self {
            video_path: video_path.into(),
            status: ExtractionStatus::Success,
            frame_count,
            output_dir: Some(output_dir.into()),
            error: None,
            frames: Vec::new(),
        }
    }

    /// A failed extraction carrying its error detail.
    pub fn failed(
        video_path: impl Into<PathBuf>,
        output_dir: Option<PathBuf>,
        frame_count: usize,
        error: impl Into<String>,
    ) -> Self {
        Self {
            video_path: video_path.into(),
            status: ExtractionStatus::Failed,
            frame_count,
            output_dir,
            error: Some(error.into()),
            frames: Vec::new(),
        }
    }

    pub fn with_frames(mut self, frames: Vec<String>) -> Self {
        self.frames = frames;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ExtractionStatus::Success
    }
}
