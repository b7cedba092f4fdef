use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;

use indicatif::{HumanBytes, HumanCount};
use log::{error, info, warn};

use crate::index::DirectoryIndex;
use crate::utils::FileRecord;

/// Result of one deduplication pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DedupOutcome {
    /// Losers whose file was removed, in deletion order.
    pub deleted: Vec<FileRecord>,
    /// Losers whose removal failed, with the error message.
    pub failed: Vec<(FileRecord, String)>,
    pub reclaimed_bytes: u64,
}

impl DedupOutcome {
    pub fn deleted_paths(&self) -> BTreeSet<String> {
        self.deleted.iter().map(|record| record.path.clone()).collect()
    }
}

/// Groups records by content hash, keeping only groups with more than one
/// member. Within a group records keep their pool order.
pub fn find_duplicates(files: Vec<FileRecord>) -> BTreeMap<String, Vec<FileRecord>> {
    let mut hash_groups: BTreeMap<String, Vec<FileRecord>> = BTreeMap::new();

    for file in files {
        hash_groups
            .entry(file.content_hash.clone())
            .or_default()
            .push(file);
    }

    hash_groups.retain(|_, group| group.len() > 1);
    hash_groups
}

/// True when both paths name the same file on disk. Paths that cannot be
/// resolved only match when they are spelled identically.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Deletes every duplicate but the newest copy, across all `indexes`.
pub fn deduplicate(indexes: &[DirectoryIndex]) -> DedupOutcome {
    deduplicate_with(indexes, |path| fs::remove_file(path))
}

/// Same as [`deduplicate`], with the file removal supplied by the caller.
///
/// Within a group the first two members are compared and the one with the
/// smaller `modified_at` loses; on a tie the second one loses. The loser is
/// removed right away and the comparison repeats until one record is left.
/// A removal that fails is logged and recorded, and elimination continues.
/// A loser that is the survivor's own file under another name is dropped
/// from the group without being removed.
pub fn deduplicate_with<F>(indexes: &[DirectoryIndex], mut remove_file: F) -> DedupOutcome
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let pool: Vec<FileRecord> = indexes
        .iter()
        .flat_map(|index| index.files.iter().cloned())
        .collect();
    info!("Checking {} indexed files for duplicates", HumanCount(pool.len() as u64));

    let groups = find_duplicates(pool);
    info!("Found {} duplicate groups", HumanCount(groups.len() as u64));

    let mut outcome = DedupOutcome::default();
    for (hash, mut group) in groups {
        while group.len() > 1 {
            let loser_at = if group[0].modified_at < group[1].modified_at { 0 } else { 1 };
            let loser = group.remove(loser_at);
            let survivor = &group[0];

            if same_file(Path::new(&loser.path), Path::new(&survivor.path)) {
                warn!(
                    "Skipping '{}': same file as '{}'",
                    loser.path, survivor.path
                );
                continue;
            }

            warn!(
                "Deleting '{}' ({}), duplicate of '{}' [{}]",
                loser.path,
                HumanBytes(loser.size),
                survivor.path,
                hash
            );
            match remove_file(Path::new(&loser.path)) {
                Ok(()) => {
                    outcome.reclaimed_bytes += loser.size;
                    outcome.deleted.push(loser);
                }
                Err(err) => {
                    error!("Failed to delete '{}': {}", loser.path, err);
                    outcome.failed.push((loser, err.to_string()));
                }
            }
        }
    }

    info!(
        "Deleted {} duplicate files, reclaimed {}",
        HumanCount(outcome.deleted.len() as u64),
        HumanBytes(outcome.reclaimed_bytes)
    );
    outcome
}
