//! Keyframe extraction batch binary.
//!
//! Configured through `KFX_*` environment variables; an optional first
//! argument overrides the input path.

use std::path::PathBuf;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use kfx_media::{ConfiguredToolLocator, FfmpegRunner, ToolLocator};
use kfx_worker::{init_tracing, FrameExtractor, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting frame extraction process");

    let mut config = WorkerConfig::from_env();
    if let Some(input) = std::env::args().nth(1) {
        config.extraction.input_path = PathBuf::from(input);
    }
    // Outputs land beside the inputs unless configured otherwise
    if std::env::var("KFX_USE_PARENT_DIR").is_err() {
        config.extraction.use_parent_dir = true;
    }
    info!("Worker config: {:?}", config);

    let ffmpeg = ConfiguredToolLocator::new(&config.extraction.ffmpeg_path)
        .locate()
        .context("FFmpeg is required for frame extraction")?;
    config.extraction.ffmpeg_path = ffmpeg;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling current job");
            cancel_tx.send_replace(true);
        }
    });

    let runner = FfmpegRunner::new()
        .with_cancel(cancel_rx)
        .with_timeout(config.job_timeout);
    let mut extractor = FrameExtractor::new(config.extraction).with_runner(runner);

    match extractor.process_input().await {
        Ok(results) => {
            let failed = results.iter().filter(|r| !r.is_success()).count();
            info!(
                "Frame extraction completed: {} videos, {} failed",
                results.len(),
                failed
            );
            Ok(())
        }
        Err(e) => {
            error!("Frame extraction aborted: {}", e);
            Err(e.into())
        }
    }
}
