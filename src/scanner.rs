use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, info};
use walkdir::WalkDir;

use crate::hasher::ContentHasher;
use crate::index::{DirectoryIndex, is_stale, temp_path};
use crate::utils::{FileRecord, format_timestamp};

/// What one reconciliation pass changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub added: usize,
    pub refreshed: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// Records in the index after the pass.
    pub records: usize,
}

impl ReconcileStats {
    pub fn hashed(&self) -> usize {
        self.added + self.refreshed
    }
}

struct PresentFile {
    key: String,
    path: PathBuf,
    size: u64,
    modified_at: String,
}

/// Lists the regular files directly inside `dir`, skipping the snapshot
/// and its temporary sibling. Links are followed, so a dangling link is
/// an error. Record keys must name the file exactly, so a path that is not
/// valid UTF-8 is an error too.
fn list_files(dir: &Path, index_file: &str) -> Result<Vec<PresentFile>> {
    if !dir.is_dir() {
        bail!("Not a directory: '{}'", dir.display());
    }

    let snapshot = dir.join(index_file);
    let staged = temp_path(&snapshot);

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry =
            entry.with_context(|| format!("Failed to list directory: '{}'", dir.display()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        if path == snapshot || path == staged {
            continue;
        }

        let metadata = entry
            .metadata()
            .with_context(|| format!("Failed to read metadata for: '{}'", path.display()))?;
        let modified = metadata
            .modified()
            .with_context(|| format!("Failed to read mtime for: '{}'", path.display()))?;
        let Some(key) = path.to_str() else {
            bail!("File name is not valid UTF-8: '{}'", path.display());
        };

        files.push(PresentFile {
            key: key.to_string(),
            path: path.to_path_buf(),
            size: metadata.len(),
            modified_at: format_timestamp(modified)
                .with_context(|| format!("Bad mtime for: '{}'", path.display()))?,
        });
    }
    Ok(files)
}

/// Brings `existing` in line with what is currently inside `dir`.
///
/// Records whose file is gone are dropped, stale records are re-hashed,
/// fresh records are kept untouched, and files without a record are hashed
/// and appended in file-name order. Existing records keep their relative
/// order, so a second pass over an unchanged directory yields an identical
/// index.
///
/// Any listing or hashing failure fails the whole pass and nothing is
/// returned for the directory.
pub fn reconcile(
    dir: &Path,
    existing: DirectoryIndex,
    index_file: &str,
    hasher: &dyn ContentHasher,
) -> Result<(DirectoryIndex, ReconcileStats)> {
    let present = list_files(dir, index_file)?;
    let mut unmatched: HashMap<&str, &PresentFile> =
        present.iter().map(|file| (file.key.as_str(), file)).collect();

    let mut stats = ReconcileStats::default();
    let mut files = Vec::with_capacity(present.len());

    for mut record in existing.files {
        let Some(current) = unmatched.remove(record.path.as_str()) else {
            debug!("Dropping '{}': no longer on disk", record.path);
            stats.removed += 1;
            continue;
        };

        if is_stale(&record, current.size, &current.modified_at) {
            debug!("Refreshing stale record '{}'", record.path);
            record.content_hash = hasher.hash_file(&current.path)?;
            record.size = current.size;
            record.modified_at = current.modified_at.clone();
            stats.refreshed += 1;
        } else {
            stats.unchanged += 1;
        }
        files.push(record);
    }

    for file in &present {
        if unmatched.remove(file.key.as_str()).is_none() {
            continue;
        }
        debug!("Adding new file '{}'", file.key);
        files.push(FileRecord {
            path: file.key.clone(),
            size: file.size,
            modified_at: file.modified_at.clone(),
            content_hash: hasher.hash_file(&file.path)?,
        });
        stats.added += 1;
    }

    stats.records = files.len();
    Ok((DirectoryIndex { files }, stats))
}

/// Loads, reconciles and saves the snapshot of one directory.
///
/// The snapshot is written only when the whole pass succeeded; on failure
/// the previous snapshot stays as it was.
pub fn index_directory(
    dir: &Path,
    index_file: &str,
    hasher: &dyn ContentHasher,
) -> Result<ReconcileStats> {
    let snapshot = dir.join(index_file);
    let existing = DirectoryIndex::load(&snapshot)?;
    let (index, stats) = reconcile(dir, existing, index_file, hasher)
        .with_context(|| format!("Failed to index directory: '{}'", dir.display()))?;
    index.save(&snapshot)?;

    info!(
        "Indexed '{}': {} added, {} refreshed, {} unchanged, {} removed",
        dir.display(),
        stats.added,
        stats.refreshed,
        stats.unchanged,
        stats.removed
    );
    Ok(stats)
}
