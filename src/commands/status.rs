use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::StatusArgs;

/// Prints the most recent run manifest found under the output root.
/// Bundles normally live in per-day subfolders, so the search covers the
/// root and one level of subdirectories.
pub fn run(args: StatusArgs) -> Result<()> {
    let mut candidates = Vec::new();
    collect_manifests(&args.output_root, &mut candidates)?;

    for entry in directory_entries(&args.output_root)? {
        if entry.is_dir() {
            collect_manifests(&entry, &mut candidates)?;
        }
    }

    let Some((path, _)) = candidates.into_iter().max_by_key(|(_, modified)| *modified) else {
        bail!(
            "no run manifest found under {}",
            args.output_root.display()
        );
    };

    info!(manifest = %path.display(), "latest run manifest");
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    println!("{contents}");

    Ok(())
}

fn collect_manifests(dir: &Path, out: &mut Vec<(PathBuf, SystemTime)>) -> Result<()> {
    for path in directory_entries(dir)? {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !name.starts_with("run_manifest_") || !name.ends_with(".json") {
            continue;
        }

        let modified = fs::metadata(&path)
            .and_then(|metadata| metadata.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        out.push((path, modified));
    }

    Ok(())
}

fn directory_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read directory: {}", dir.display()))?;
        paths.push(entry.path());
    }

    Ok(paths)
}
