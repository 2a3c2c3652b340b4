//! Organize recordings into `<language>/<gender>/<emotion>/<sentence>/`.
//!
//! Usage: kfx-organize <src> <dst> [--move] [--overwrite] [--dry-run]

use std::path::PathBuf;

use anyhow::bail;
use tracing::info;

use kfx_worker::{init_tracing, organize, FilenameMetadataResolver, OrganizeOptions};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut options = OrganizeOptions::default();
    let mut paths = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--move" => options.move_files = true,
            "--overwrite" => options.overwrite = true,
            "--dry-run" => options.dry_run = true,
            flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
            path => paths.push(PathBuf::from(path)),
        }
    }

    let [src, dst] = paths.as_slice() else {
        bail!("usage: kfx-organize <src> <dst> [--move] [--overwrite] [--dry-run]");
    };

    if options.dry_run {
        info!("Dry run: nothing will be copied or moved");
    }

    let summary = organize(src, dst, &options, &FilenameMetadataResolver)?;
    println!(
        "Processing complete: {} files successfully organized, {} skipped, {} errors",
        summary.organized, summary.skipped, summary.errors
    );
    Ok(())
}
