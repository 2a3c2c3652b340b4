//! Reorganize recordings into a metadata-derived directory tree.
//!
//! Videos are placed under `<language>/<gender>/<emotion>/<sentence>/<file>`,
//! using the codes resolved from each file name.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info};
use walkdir::WalkDir;

use kfx_models::config::normalize_extension;

use crate::error::{WorkerError, WorkerResult};
use crate::metadata::MetadataResolver;

#[derive(Debug, Clone)]
pub struct OrganizeOptions {
    /// Move instead of copy
    pub move_files: bool,
    /// Replace files already present at the target
    pub overwrite: bool,
    /// Report what would happen without touching the filesystem
    pub dry_run: bool,
    /// Extensions considered videos
    pub extensions: BTreeSet<String>,
}

impl Default for OrganizeOptions {
    fn default() -> Self {
        Self {
            move_files: false,
            overwrite: false,
            dry_run: false,
            extensions: [".mp4", ".avi", ".mov"].iter().map(|e| e.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrganizeSummary {
    pub organized: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Target directory for one file name: `dst/<language>/<gender>/<emotion>/<detail>`.
pub fn target_dir(dst: &Path, file_name: &str, resolver: &dyn MetadataResolver) -> PathBuf {
    let meta = resolver.resolve(file_name);
    dst.join(meta.get_or("language", "unknown"))
        .join(meta.get_or("gender", "Unknown"))
        .join(meta.get_or("emotion", "unknown"))
        .join(meta.get_or("detail", "unknown"))
}

/// Copy or move every video under `src` into the structured tree under `dst`.
pub fn organize(
    src: &Path,
    dst: &Path,
    options: &OrganizeOptions,
    resolver: &dyn MetadataResolver,
) -> WorkerResult<OrganizeSummary> {
    if !src.is_dir() {
        return Err(WorkerError::config(format!(
            "Source directory {} does not exist",
            src.display()
        )));
    }

    let mut summary = OrganizeSummary::default();

    for entry in WalkDir::new(src)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let source = entry.path();
        let allowed = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| options.extensions.contains(&normalize_extension(e)))
            .unwrap_or(false);
        if !allowed {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let target = target_dir(dst, &name, resolver).join(&name);

        if target.exists() && !options.overwrite {
            info!("Skipped {} as it already exists", target.display());
            summary.skipped += 1;
            continue;
        }

        if options.dry_run {
            let verb = if options.move_files { "move" } else { "copy" };
            info!("Would {} {} to {}", verb, source.display(), target.display());
            summary.organized += 1;
            continue;
        }

        match place(source, &target, options.move_files) {
            Ok(()) => {
                let verb = if options.move_files { "Moved" } else { "Copied" };
                info!("{} {} to {}", verb, source.display(), target.display());
                summary.organized += 1;
            }
            Err(e) => {
                error!("Error processing {}: {}", name, e);
                summary.errors += 1;
            }
        }
    }

    Ok(summary)
}

fn place(source: &Path, target: &Path, move_file: bool) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    if move_file {
        // rename fails across filesystems
        if fs::rename(source, target).is_err() {
            fs::copy(source, target)?;
            fs::remove_file(source)?;
        }
    } else {
        fs::copy(source, target)?;
    }
    Ok(())
}
