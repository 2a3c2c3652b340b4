//! Job status publishing.
//!
//! Each job owns one [`StatusTracker`]. The tracker is the only writer of
//! its snapshot; pollers hold `watch` receivers and always observe a whole
//! snapshot, never a partial update.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use kfx_media::ProgressSink;
use kfx_models::{ExtractionResult, JobId, ProcessingStatus, VideoMetadata};

#[derive(Debug, Clone)]
pub struct StatusTracker {
    tx: Arc<watch::Sender<ProcessingStatus>>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    /// Tracker with an idle snapshot.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ProcessingStatus::default());
        Self { tx: Arc::new(tx) }
    }

    /// Reset the snapshot for a newly accepted job.
    pub fn begin(&self, job_id: JobId, current_video: impl Into<String>) {
        let status = ProcessingStatus::started(job_id, current_video);
        self.tx.send_replace(status);
    }

    /// Raise progress; lower values and updates after the job ended are dropped.
    pub fn update_progress(&self, percent: u8) {
        self.tx.send_if_modified(|status| status.set_progress(percent));
    }

    pub fn set_metadata(&self, metadata: VideoMetadata) {
        self.tx.send_if_modified(|status| {
            if status.is_terminal() {
                return false;
            }
            status.set_metadata(metadata);
            true
        });
    }

    /// Freeze the snapshot as completed.
    pub fn complete(&self, result: &ExtractionResult) {
        self.tx.send_if_modified(|status| {
            if status.is_terminal() {
                return false;
            }
            status.complete(result);
            true
        });
    }

    /// Freeze the snapshot as failed.
    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        self.tx.send_if_modified(|status| {
            if status.is_terminal() {
                return false;
            }
            status.fail(error);
            true
        });
    }

    /// Complete or fail depending on the result status.
    pub fn finish(&self, result: &ExtractionResult) {
        if result.is_success() {
            self.complete(result);
        } else {
            self.fail(result.error.clone().unwrap_or_else(|| "Extraction failed".to_string()));
        }
    }

    /// Consistent copy of the current snapshot with elapsed time filled in.
    pub fn snapshot(&self) -> ProcessingStatus {
        self.tx.borrow().clone().with_elapsed(Utc::now())
    }

    /// Whether the job has completed or failed, without copying the snapshot.
    pub fn is_terminal(&self) -> bool {
        self.tx.borrow().is_terminal()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessingStatus> {
        self.tx.subscribe()
    }
}

impl ProgressSink for StatusTracker {
    fn update(&self, percent: u8) {
        self.update_progress(percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let tracker = StatusTracker::new();
        assert!(!tracker.snapshot().is_processing);

        let job_id = JobId::new();
        tracker.begin(job_id.clone(), "clip.mp4");
        tracker.update_progress(10);
        tracker.update_progress(20);

        let running = tracker.snapshot();
        assert!(!tracker.is_terminal());
        assert!(running.is_processing);
        assert_eq!(running.job_id, Some(job_id));
        assert_eq!(running.progress, 20);
        assert!(running.elapsed_seconds.is_some());

        tracker.complete(&ExtractionResult::success("clip.mp4", "out/clip", 4));
        let done = tracker.snapshot();
        assert!(tracker.is_terminal());
        assert!(done.completed);
        assert!(!done.is_processing);
        assert_eq!(done.progress, 100);
        assert_eq!(done.frame_count, 4);
    }

    #[test]
    fn test_progress_never_decreases_and_freezes() {
        let tracker = StatusTracker::new();
        tracker.begin(JobId::new(), "clip.mp4");
        tracker.update_progress(40);
        tracker.update_progress(30);
        assert_eq!(tracker.snapshot().progress, 40);

        tracker.fail("Invalid data");
        tracker.update_progress(90);
        tracker.complete(&ExtractionResult::success("clip.mp4", "out/clip", 1));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.progress, 40);
        assert_eq!(snapshot.error.as_deref(), Some("Invalid data"));
        assert!(!snapshot.completed);
    }

    #[tokio::test]
    async fn test_subscribers_see_terminal_snapshot() {
        let tracker = StatusTracker::new();
        tracker.begin(JobId::new(), "clip.mp4");
        let mut rx = tracker.subscribe();

        let writer = tracker.clone();
        tokio::spawn(async move {
            writer.update_progress(50);
            writer.finish(&ExtractionResult::failed("clip.mp4", None, 0, "boom"));
        });

        let status = rx.wait_for(|s| s.is_terminal()).await.unwrap().clone();
        assert_eq!(status.error.as_deref(), Some("boom"));
    }
}
