//! Archive extraction into a scoped scratch directory.

use crate::error::{Result, TabloadError};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Scoped scratch directory for one extraction job.
///
/// Created fresh (stale content from a crashed previous run is removed
/// first) and deleted on drop, so cleanup happens on every exit path.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create a scratch directory named after the archive under `work_dir`.
    pub fn create(work_dir: &Path, archive_stem: &str) -> Result<Self> {
        let path = work_dir.join(format!("{}.extract", archive_stem));
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            log::warn!("Failed to clean scratch dir {}: {}", self.path.display(), e);
        }
    }
}

/// Extract a zip archive into the scratch directory.
///
/// Returns the absolute paths of the extracted regular files, in archive
/// order. Hidden files, documentation files (Readme/Report), and entries
/// whose names escape the scratch directory are skipped.
pub fn extract_archive(archive_path: &Path, scratch: &ScratchDir) -> Result<Vec<PathBuf>> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| TabloadError::CorruptArchive(format!("{}: {}", archive_path.display(), e)))?;

    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| {
            TabloadError::CorruptArchive(format!("{} entry {}: {}", archive_path.display(), i, e))
        })?;

        // enclosed_name() rejects absolute paths and `..` components (zip-slip)
        let rel_path = match entry.enclosed_name() {
            Some(p) => p.to_path_buf(),
            None => {
                log::warn!("Skipping unsafe archive entry: {}", entry.name());
                continue;
            }
        };

        let out_path = scratch.path().join(&rel_path);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        let file_name = rel_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");
        if !is_data_file(file_name) {
            log::debug!("Skipping non-data archive entry: {}", entry.name());
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out_file = File::create(&out_path)?;
        io::copy(&mut entry, &mut out_file)?;
        extracted.push(out_path);
    }

    log::info!(
        "Extracted {} files from {}",
        extracted.len(),
        archive_path.display()
    );
    Ok(extracted)
}

/// Filter applied to extracted entries: hidden/system files and the
/// documentation files shipped inside the archives are not data.
fn is_data_file(file_name: &str) -> bool {
    if file_name.is_empty() || file_name.starts_with('.') || file_name.starts_with('~') {
        return false;
    }
    let lowered = file_name.to_lowercase();
    !(lowered.starts_with("readme") || lowered.starts_with("report1"))
}
