//! Rows of the extraction log and metadata tables.

use serde::{Deserialize, Serialize};

use crate::{ExtractionResult, ExtractionStatus, VideoMetadata};

/// Columns of the extraction log, in order.
pub const LOG_COLUMNS: [&str; 6] = [
    "video_path",
    "frame_count",
    "output_dir",
    "status",
    "error",
    "metadata",
];

/// Leading columns of the metadata table; metadata fields follow.
pub const METADATA_BASE_COLUMNS: [&str; 2] = ["video_path", "frame_count"];

/// One row of the extraction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub video_path: String,
    pub frame_count: usize,
    pub output_dir: Option<String>,
    pub status: ExtractionStatus,
    pub error: Option<String>,
    pub metadata: Option<VideoMetadata>,
}

impl LogEntry {
    /// Build a log row from a result. Metadata is only kept for successes.
    pub fn from_result(result: &ExtractionResult, metadata: Option<&VideoMetadata>) -> Self {
        Self {
            video_path: result.video_path.display().to_string(),
            frame_count: result.frame_count,
            output_dir: result.output_dir.as_ref().map(|p| p.display().to_string()),
            status: result.status,
            error: result.error.clone(),
            metadata: if result.is_success() { metadata.cloned() } else { None },
        }
    }

    /// Flatten into CSV fields; metadata is serialized as a JSON object.
    pub fn to_record(&self) -> Vec<String> {
        let metadata = self
            .metadata
            .as_ref()
            .and_then(|m| serde_json::to_string(m).ok())
            .unwrap_or_default();

        vec![
            self.video_path.clone(),
            self.frame_count.to_string(),
            self.output_dir.clone().unwrap_or_default(),
            self.status.to_string(),
            self.error.clone().unwrap_or_default(),
            metadata,
        ]
    }
}

/// One row of the metadata table (successful jobs only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub video_path: String,
    pub frame_count: usize,
    pub metadata: VideoMetadata,
}

impl MetadataEntry {
    pub fn new(video_path: impl Into<String>, frame_count: usize, metadata: VideoMetadata) -> Self {
        Self {
            video_path: video_path.into(),
            frame_count,
            metadata,
        }
    }

    /// Flatten into CSV fields for the given metadata columns.
    ///
    /// Fields missing from this entry become empty cells.
    pub fn to_record(&self, columns: &[String]) -> Vec<String> {
        let mut record = vec![self.video_path.clone(), self.frame_count.to_string()];
        record.extend(
            columns
                .iter()
                .map(|c| self.metadata.get(c).unwrap_or_default().to_string()),
        );
        record
    }
}
