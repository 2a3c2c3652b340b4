#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for keyframe extraction.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building for I-frame selection
//! - Incremental progress parsing from the tool's stderr
//! - Cancellation and timeout support via tokio
//! - Output directory resolution and frame counting on disk
//! - Tool discovery

pub mod command;
pub mod error;
pub mod extract;
pub mod frames;
pub mod locator;
pub mod output_path;
pub mod progress;
pub mod runner;

pub use command::{build_keyframe_command, FfmpegCommand, I_FRAME_FILTER};
pub use error::{MediaError, MediaResult};
pub use extract::KeyframeExtractor;
pub use frames::{count_frames, find_frame_sets, FrameSet};
pub use locator::{probe_version, ConfiguredToolLocator, ToolLocator};
pub use output_path::{expected_output_dir, resolve_output_dir, OutputLayout};
pub use progress::{MonotonicSink, NoopProgress, ProgressSink};
pub use runner::{FfmpegRunner, RunOutcome};
