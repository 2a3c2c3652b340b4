use std::path::Path;

use kfx_media::{probe_version, ConfiguredToolLocator, ToolLocator};
use kfx_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();
    let extraction = &config.extraction;

    println!(
        "kfx-selfcheck: starting with output_root={}",
        extraction.output_root.display()
    );

    let ffmpeg = ConfiguredToolLocator::new(&extraction.ffmpeg_path)
        .locate()
        .map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    println!("kfx-selfcheck: ffmpeg at {}", ffmpeg.display());

    let version = probe_version(&ffmpeg)
        .await
        .map_err(|e| anyhow::anyhow!("ffmpeg -version failed: {}", e))?;
    println!("kfx-selfcheck: {}", version);

    ensure_writable(&extraction.output_root).await?;

    println!("kfx-selfcheck: ok");
    Ok(())
}

async fn ensure_writable(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = path.join(".kfx-selfcheck");
    tokio::fs::write(&probe, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("output root {} is not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}
