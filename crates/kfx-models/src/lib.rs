//! Shared data models for the keyframe extraction pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Extraction configuration
//! - Jobs, job phases and extraction results
//! - Extraction log and metadata table rows
//! - The processing status snapshot served to pollers

pub mod config;
pub mod job;
pub mod job_status;
pub mod log;
pub mod metadata;
pub mod result;

// Re-export common types
pub use config::{ConfigCorrection, ExtractionConfig};
pub use job::{ExtractionJob, JobId, JobPhase};
pub use job_status::ProcessingStatus;
pub use log::{LogEntry, MetadataEntry, LOG_COLUMNS, METADATA_BASE_COLUMNS};
pub use metadata::VideoMetadata;
pub use result::{ExtractionResult, ExtractionStatus, ParseStatusError};
