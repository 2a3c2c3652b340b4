//! Extraction log and metadata tables.
//!
//! Rows are kept in memory in processing order and written once per batch.
//! Each flush overwrites its destination files.

use std::fs;
use std::path::Path;

use tracing::info;

use kfx_models::{
    ExtractionConfig, ExtractionResult, LogEntry, MetadataEntry, VideoMetadata, LOG_COLUMNS,
    METADATA_BASE_COLUMNS,
};

use crate::error::WorkerResult;

#[derive(Debug, Default)]
pub struct LogRecorder {
    entries: Vec<LogEntry>,
    metadata: Vec<MetadataEntry>,
}

impl LogRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one processed video.
    ///
    /// A metadata row is only added for successful jobs with non-empty metadata.
    pub fn record(&mut self, result: &ExtractionResult, metadata: Option<&VideoMetadata>) {
        let entry = LogEntry::from_result(result, metadata);

        if let Some(meta) = entry.metadata.as_ref().filter(|m| !m.is_empty()) {
            self.metadata.push(MetadataEntry::new(
                entry.video_path.clone(),
                result.frame_count,
                meta.clone(),
            ));
        }

        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn metadata_entries(&self) -> &[MetadataEntry] {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metadata columns in first-seen order across all rows.
    pub fn metadata_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for entry in &self.metadata {
            for key in entry.metadata.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    /// Write both tables to their configured destinations.
    ///
    /// The metadata table is skipped when no successful job produced metadata.
    pub fn flush(&self, config: &ExtractionConfig) -> WorkerResult<()> {
        if let Some(path) = &config.log_file {
            self.write_log(path)?;
            info!("Saved extraction log to {}", path.display());
        }

        if let Some(path) = &config.metadata_csv {
            if !self.metadata.is_empty() {
                self.write_metadata(path)?;
                info!("Saved video metadata to {}", path.display());
            }
        }

        Ok(())
    }

    fn write_log(&self, path: &Path) -> WorkerResult<()> {
        ensure_parent(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(LOG_COLUMNS)?;
        for entry in &self.entries {
            writer.write_record(entry.to_record())?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_metadata(&self, path: &Path) -> WorkerResult<()> {
        ensure_parent(path)?;
        let columns = self.metadata_columns();
        let mut writer = csv::Writer::from_path(path)?;

        let header = METADATA_BASE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(columns.iter().cloned());
        writer.write_record(header)?;

        for entry in &self.metadata {
            writer.write_record(entry.to_record(&columns))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(pairs: &[(&str, &str)]) -> VideoMetadata {
        pairs.iter().copied().collect()
    }

    fn config(dir: &TempDir) -> ExtractionConfig {
        ExtractionConfig::new(dir.path(), dir.path().join("out"))
            .with_log_file(Some(dir.path().join("logs/extraction_log.csv")))
            .with_metadata_csv(Some(dir.path().join("logs/video_metadata.csv")))
    }

    #[test]
    fn test_rows_in_order_and_metadata_only_for_success() {
        let mut recorder = LogRecorder::new();
        recorder.record(
            &ExtractionResult::success("a.mp4", "out/a", 3),
            Some(&meta(&[("speaker", "A1")])),
        );
        recorder.record(
            &ExtractionResult::failed("b.mp4", None, 0, "Invalid data"),
            Some(&meta(&[("speaker", "A2")])),
        );

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.entries()[0].video_path, "a.mp4");
        assert_eq!(recorder.entries()[1].video_path, "b.mp4");
        assert_eq!(recorder.metadata_entries().len(), 1);
    }

    #[test]
    fn test_flush_writes_both_tables() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let mut recorder = LogRecorder::new();
        recorder.record(
            &ExtractionResult::success("a.mp4", "out/a", 3),
            Some(&meta(&[("speaker", "A1"), ("emotion", "H")])),
        );
        recorder.record(
            &ExtractionResult::success("b.mp4", "out/b", 1),
            Some(&meta(&[("speaker", "A2"), ("language", "EN")])),
        );
        recorder.flush(&cfg).unwrap();

        let mut log = csv::Reader::from_path(cfg.log_file.as_ref().unwrap()).unwrap();
        assert_eq!(
            log.headers().unwrap().iter().collect::<Vec<_>>(),
            LOG_COLUMNS.to_vec()
        );
        assert_eq!(log.records().count(), 2);

        let mut table = csv::Reader::from_path(cfg.metadata_csv.as_ref().unwrap()).unwrap();
        assert_eq!(
            table.headers().unwrap().iter().collect::<Vec<_>>(),
            vec!["video_path", "frame_count", "emotion", "speaker", "language"]
        );
        let rows: Vec<csv::StringRecord> = table.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[1][0], "b.mp4");
        assert_eq!(&rows[1][2], "");
        assert_eq!(&rows[1][4], "EN");
    }

    #[test]
    fn test_metadata_table_skipped_without_successes() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let mut recorder = LogRecorder::new();
        recorder.record(&ExtractionResult::failed("a.mp4", None, 0, "boom"), None);
        recorder.flush(&cfg).unwrap();

        assert!(cfg.log_file.as_ref().unwrap().exists());
        assert!(!cfg.metadata_csv.as_ref().unwrap().exists());
    }

    #[test]
    fn test_flush_overwrites_previous_run() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);

        let mut first = LogRecorder::new();
        first.record(&ExtractionResult::success("a.mp4", "out/a", 1), None);
        first.record(&ExtractionResult::success("b.mp4", "out/b", 1), None);
        first.flush(&cfg).unwrap();

        let mut second = LogRecorder::new();
        second.record(&ExtractionResult::success("c.mp4", "out/c", 1), None);
        second.flush(&cfg).unwrap();

        let mut log = csv::Reader::from_path(cfg.log_file.as_ref().unwrap()).unwrap();
        assert_eq!(log.records().count(), 1);
    }
}
