use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use rayon::prelude::*;

use crate::config::Config;
use crate::duplicates::{DedupOutcome, deduplicate};
use crate::hasher::ContentHasher;
use crate::index::DirectoryIndex;
use crate::scanner::{ReconcileStats, index_directory};

/// Totals of one indexing phase over all directories.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub directories: usize,
    pub records: usize,
    /// Files whose content was read in this phase.
    pub hashed: usize,
    pub added: usize,
    pub refreshed: usize,
    pub removed: usize,
}

impl IndexStats {
    fn add(&mut self, stats: &ReconcileStats) {
        self.directories += 1;
        self.records += stats.records;
        self.hashed += stats.hashed();
        self.added += stats.added;
        self.refreshed += stats.refreshed;
        self.removed += stats.removed;
    }
}

#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub pre: IndexStats,
    pub dedup: DedupOutcome,
    pub post: IndexStats,
}

fn phase_progress(len: usize, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(phase.to_string());
    pb
}

/// Runs the directory indexer over every directory and persists each
/// snapshot.
///
/// With `threads > 1` directories are indexed concurrently on a dedicated
/// pool. The phase returns only after every directory has finished; if any
/// failed, the failures are logged and the phase fails.
pub fn index_all(
    dirs: &[PathBuf],
    index_file: &str,
    hasher: &(dyn ContentHasher + Sync),
    threads: usize,
    phase: &str,
) -> Result<IndexStats> {
    info!("{}: indexing {} directories", phase, dirs.len());
    let pb = phase_progress(dirs.len(), phase);
    let index_one = |dir: &PathBuf| {
        let result = index_directory(dir, index_file, hasher);
        pb.inc(1);
        result
    };

    let results: Vec<Result<ReconcileStats>> = if threads > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("Failed to build indexing thread pool")?;
        pool.install(|| dirs.par_iter().map(index_one).collect())
    } else {
        let mut results = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let result = index_one(dir);
            let failed = result.is_err();
            results.push(result);
            if failed {
                break;
            }
        }
        results
    };
    pb.finish_and_clear();

    let mut totals = IndexStats::default();
    let mut failures = 0;
    for result in results {
        match result {
            Ok(stats) => totals.add(&stats),
            Err(err) => {
                error!("{:#}", err);
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{}: {} of {} directories failed", phase, failures, dirs.len());
    }
    Ok(totals)
}

/// Loads the persisted snapshot of every directory.
pub fn load_indexes(dirs: &[PathBuf], index_file: &str) -> Result<Vec<DirectoryIndex>> {
    dirs.iter()
        .map(|dir| DirectoryIndex::load(&dir.join(index_file)))
        .collect()
}

/// Index, deduplicate, then index again.
///
/// The deduplication phase works on snapshots re-read from disk, so it only
/// sees what the first phase committed. The final indexing phase drops the
/// records of the files that were deleted.
pub fn run(
    config: &Config,
    hasher: &(dyn ContentHasher + Sync),
    threads: usize,
) -> Result<RunSummary> {
    let dirs = config.unique_dirs()?;
    let index_file = config.index_file.as_str();

    let pre = index_all(&dirs, index_file, hasher, threads, "Pre-process")?;

    info!("Deduplicate: loading {} indexes", dirs.len());
    let indexes = load_indexes(&dirs, index_file)?;
    let populated = indexes.iter().filter(|index| !index.is_empty()).count();
    info!("Deduplicate: {} of {} indexes hold files", populated, indexes.len());
    let dedup = deduplicate(&indexes);

    let post = index_all(&dirs, index_file, hasher, threads, "Post-process")?;

    Ok(RunSummary { pre, dedup, post })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Blake3Hasher;
    use crate::index::DEFAULT_INDEX_FILE;
    use std::fs;

    #[test]
    fn test_index_all_totals() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        fs::write(a.path().join("1"), "one").unwrap();
        fs::write(a.path().join("2"), "two").unwrap();
        fs::write(b.path().join("3"), "three").unwrap();
        let dirs = vec![a.path().to_path_buf(), b.path().to_path_buf()];

        let stats = index_all(&dirs, DEFAULT_INDEX_FILE, &Blake3Hasher, 1, "test").unwrap();
        assert_eq!(stats.directories, 2);
        assert_eq!(stats.records, 3);
        assert_eq!(stats.added, 3);
        assert_eq!(stats.hashed, 3);

        let again = index_all(&dirs, DEFAULT_INDEX_FILE, &Blake3Hasher, 2, "test").unwrap();
        assert_eq!(again.records, 3);
        assert_eq!(again.added + again.refreshed + again.removed, 0);
        assert_eq!(again.hashed, 0);
    }

    #[test]
    fn test_failing_directory_stops_sequential_phase() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("good");
        fs::create_dir(&good).unwrap();
        fs::write(good.join("f"), "f").unwrap();
        let dirs = vec![tmp.path().join("missing"), good.clone()];

        assert!(index_all(&dirs, DEFAULT_INDEX_FILE, &Blake3Hasher, 1, "test").is_err());
        assert!(!good.join(DEFAULT_INDEX_FILE).exists());
    }

    #[test]
    fn test_failing_directory_fails_parallel_phase() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("good");
        fs::create_dir(&good).unwrap();
        let dirs = vec![tmp.path().join("missing"), good.clone()];

        assert!(index_all(&dirs, DEFAULT_INDEX_FILE, &Blake3Hasher, 4, "test").is_err());
        assert!(good.join(DEFAULT_INDEX_FILE).exists());
    }

    #[test]
    fn test_load_indexes_rejects_corrupt_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(DEFAULT_INDEX_FILE), "garbage").unwrap();
        let dirs = vec![tmp.path().to_path_buf()];
        assert!(load_indexes(&dirs, DEFAULT_INDEX_FILE).is_err());
    }
}
