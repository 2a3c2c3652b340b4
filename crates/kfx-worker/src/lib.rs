//! Keyframe extraction worker.
//!
//! This crate provides:
//! - Batch traversal with a consolidated extraction log
//! - Single-file and directory entry points
//! - A channel-driven job service with admission control and status polling
//! - Filename metadata resolution and directory organization

pub mod admission;
pub mod batch;
pub mod config;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod metadata;
pub mod organize;
pub mod recorder;
pub mod service;
pub mod status;

pub use admission::AdmissionControl;
pub use batch::{discover_videos, BatchCoordinator};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use extractor::FrameExtractor;
pub use logging::{init_tracing, JobLogger};
pub use metadata::{FilenameMetadataResolver, MetadataResolver, NullMetadataResolver};
pub use organize::{organize, OrganizeOptions, OrganizeSummary};
pub use recorder::LogRecorder;
pub use service::{JobHandle, JobRequest, JobService};
pub use status::StatusTracker;
