//! Processing status snapshot for polling clients.
//!
//! This is the JSON object served to status pollers in service mode.
//! Field names are kept compatible with the existing web frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ExtractionResult, JobId, VideoMetadata};

/// Snapshot of one job's processing state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingStatus {
    /// Job this snapshot belongs to (absent before any job ran)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    /// A job is currently running
    pub is_processing: bool,
    /// File name of the video being processed
    pub current_video: String,
    /// The job finished successfully
    pub completed: bool,
    /// Error message if the job failed
    pub error: Option<String>,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// When the job was started
    pub start_time: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    pub end_time: Option<DateTime<Utc>>,
    /// Produced frames, relative to the output root
    pub frames: Vec<String>,
    /// Number of produced frames
    #[serde(default)]
    pub frame_count: usize,
    /// Resolved output directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Seconds since start (live) or total duration (finished)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<i64>,
    /// Metadata resolved from the file name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VideoMetadata>,
    /// Sequence number for event ordering (monotonically increasing)
    #[serde(default)]
    pub event_seq: u64,
}

impl ProcessingStatus {
    /// Fresh status for a job that has just been accepted.
    pub fn started(job_id: JobId, current_video: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id),
            is_processing: true,
            current_video: current_video.into(),
            start_time: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Check if the job is in a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        !self.is_processing && (self.completed || self.error.is_some())
    }

    /// Raise progress. Lower values and updates after completion are ignored.
    ///
    /// Returns whether the snapshot changed.
    pub fn set_progress(&mut self, progress: u8) -> bool {
        let progress = progress.min(100);
        if self.is_terminal() || progress <= self.progress {
            return false;
        }
        self.progress = progress;
        self.event_seq += 1;
        true
    }

    pub fn set_metadata(&mut self, metadata: VideoMetadata) {
        self.metadata = Some(metadata);
        self.event_seq += 1;
    }

    /// Mark the job as completed from a successful result.
    pub fn complete(&mut self, result: &ExtractionResult) {
        self.is_processing = false;
        self.completed = true;
        self.error = None;
        self.progress = 100;
        self.frame_count = result.frame_count;
        self.frames = result.frames.clone();
        self.output_dir = result.output_dir.as_ref().map(|p| p.display().to_string());
        self.end_time = Some(Utc::now());
        self.event_seq += 1;
    }

    /// Mark the job as failed with an error message.
    ///
    /// Progress is left where it was.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.is_processing = false;
        self.completed = false;
        self.error = Some(error.into());
        self.end_time = Some(Utc::now());
        self.event_seq += 1;
    }

    /// Copy with `elapsed_seconds` filled in relative to `now`.
    pub fn with_elapsed(mut self, now: DateTime<Utc>) -> Self {
        self.elapsed_seconds = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            (Some(start), None) if self.is_processing => Some((now - start).num_seconds()),
            _ => None,
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_starts_processing() {
        let status = ProcessingStatus::started(JobId::new(), "clip.mp4");
        assert!(status.is_processing);
        assert!(!status.completed);
        assert_eq!(status.progress, 0);
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut status = ProcessingStatus::started(JobId::new(), "clip.mp4");
        assert!(status.set_progress(20));
        assert!(status.set_progress(45));
        assert!(!status.set_progress(30));
        assert_eq!(status.progress, 45);
        assert!(status.set_progress(250));
        assert_eq!(status.progress, 100);
    }

    #[test]
    fn test_completed_status_is_frozen() {
        let mut status = ProcessingStatus::started(JobId::new(), "clip.mp4");
        status.set_progress(50);

        let result = ExtractionResult::success("clip.mp4", "out/clip", 4)
            .with_frames(vec!["clip/frame_0001.png".into()]);
        status.complete(&result);

        assert!(status.is_terminal());
        assert_eq!(status.progress, 100);
        assert_eq!(status.frame_count, 4);
        assert!(!status.set_progress(10));
        assert_eq!(status.progress, 100);
    }

    #[test]
    fn test_failed_status_keeps_progress() {
        let mut status = ProcessingStatus::started(JobId::new(), "clip.mp4");
        status.set_progress(35);
        status.fail("Invalid data");

        assert!(status.is_terminal());
        assert!(!status.completed);
        assert_eq!(status.progress, 35);
        assert_eq!(status.error.as_deref(), Some("Invalid data"));
    }

    #[test]
    fn test_elapsed_frozen_after_end() {
        let mut status = ProcessingStatus::started(JobId::new(), "clip.mp4");
        let start = Utc::now() - chrono::Duration::seconds(30);
        status.start_time = Some(start);
        status.end_time = Some(start + chrono::Duration::seconds(12));
        status.is_processing = false;
        status.completed = true;

        let later = Utc::now() + chrono::Duration::seconds(100);
        assert_eq!(status.with_elapsed(later).elapsed_seconds, Some(12));
    }

    #[test]
    fn test_status_json_fields() {
        let status = ProcessingStatus::default();
        let value = serde_json::to_value(&status).unwrap();
        for field in [
            "is_processing",
            "current_video",
            "completed",
            "error",
            "progress",
            "start_time",
            "end_time",
            "frames",
        ] {
            assert!(value.get(field).is_some(), "missing field {}", field);
        }
    }
}
