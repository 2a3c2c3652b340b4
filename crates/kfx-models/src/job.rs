//! Extraction job definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::VideoMetadata;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a single tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    #[default]
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::NotStarted => "not_started",
            JobPhase::Running => "running",
            JobPhase::Succeeded => "succeeded",
            JobPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed)
    }

    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobPhase) -> bool {
        matches!(
            (self, next),
            (JobPhase::NotStarted, JobPhase::Running)
                | (JobPhase::NotStarted, JobPhase::Failed)
                | (JobPhase::Running, JobPhase::Succeeded)
                | (JobPhase::Running, JobPhase::Failed)
        )
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One input video with its derived output directory and metadata.
///
/// Created per video and discarded once its result is logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub id: JobId,
    pub video_path: PathBuf,
    pub output_dir: PathBuf,
    pub metadata: VideoMetadata,
}

impl ExtractionJob {
    pub fn new(video_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, metadata: VideoMetadata) -> Self {
        Self {
            id: JobId::new(),
            video_path: video_path.into(),
            output_dir: output_dir.into(),
            metadata,
        }
    }

    /// File name of the input video, lossy.
    pub fn video_name(&self) -> String {
        self.video_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_unique() {
        assert_ne!(JobId::new(), JobId::new());
        assert_eq!(JobId::new().as_str().len(), 36);
    }

    #[test]
    fn test_phase_transitions() {
        assert!(JobPhase::NotStarted.can_transition_to(JobPhase::Running));
        assert!(JobPhase::NotStarted.can_transition_to(JobPhase::Failed));
        assert!(JobPhase::Running.can_transition_to(JobPhase::Succeeded));
        assert!(!JobPhase::NotStarted.can_transition_to(JobPhase::Succeeded));
        assert!(!JobPhase::Succeeded.can_transition_to(JobPhase::Failed));
        assert!(JobPhase::Failed.is_terminal());
        assert!(!JobPhase::Running.is_terminal());
    }

    #[test]
    fn test_video_name() {
        let job = ExtractionJob::new("in/a/clip.mp4", "out/clip", VideoMetadata::default());
        assert_eq!(job.video_name(), "clip.mp4");
    }
}
