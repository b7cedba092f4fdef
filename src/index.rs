use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{HumanBytes, HumanCount};
use log::{debug, info};
use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::FileRecord;

/// Snapshot file name used when the configuration does not name one.
pub const DEFAULT_INDEX_FILE: &str = "results.json";

/// The persisted index of one managed directory.
///
/// `DirectoryIndex` is an ordered list of [`FileRecord`]s, one per regular
/// file found directly inside the directory. It is serialized as a JSON
/// document with a single `files` array and lives inside the directory it
/// describes.
///
/// Paths are unique within one index. The same content hash may appear in
/// several indexes; that is what duplicate detection looks for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryIndex {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: Vec<FileRecord>,
}

// Older snapshots store an empty index as `"files": null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<FileRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<FileRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

impl DirectoryIndex {
    /// Loads a directory snapshot from `path`.
    ///
    /// - If the file does not exist, an empty index is returned. This is
    ///   the normal state of a directory that has never been indexed.
    /// - If the file exists but cannot be read or is not a valid snapshot,
    ///   an error is returned. A corrupt snapshot is never treated as
    ///   empty, since that would re-hash the whole directory and silently
    ///   discard whatever the snapshot held.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No index found at '{}', starting fresh", path.display());
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read index: '{}'", path.display()));
            }
        };

        let index: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse index: '{}'", path.display()))?;
        debug!(
            "Loaded index '{}' ({}, {} entries)",
            path.display(),
            HumanBytes(bytes.len() as u64),
            HumanCount(index.len() as u64)
        );
        Ok(index)
    }

    /// Saves the index to `path`.
    ///
    /// The document is first written to a temporary sibling (see
    /// [`temp_path`]) and then renamed over the snapshot, so an interrupted
    /// write leaves the previous snapshot in place.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, writing, or the rename fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self).context("Failed to serialize index")?;
        let temp = temp_path(path);
        fs::write(&temp, &content)
            .with_context(|| format!("Failed to write index: '{}'", temp.display()))?;
        fs::rename(&temp, path)
            .with_context(|| format!("Failed to replace index: '{}'", path.display()))?;
        info!(
            "Saved index '{}' ({} entries, {})",
            path.display(),
            HumanCount(self.len() as u64),
            HumanBytes(content.len() as u64)
        );
        Ok(())
    }

    /// Looks up a record by path.
    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.iter().find(|record| record.path == path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Temporary file a snapshot is staged in before it replaces `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Decides whether a cached record must be re-hashed.
///
/// A record is fresh only when both its size and its modification time
/// equal the file's current values; anything else is stale. A content
/// change that keeps both size and timestamp is not detected.
pub fn is_stale(record: &FileRecord, current_size: u64, current_modified_at: &str) -> bool {
    !(record.size == current_size && record.modified_at == current_modified_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, size: u64, date: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            size,
            modified_at: date.to_string(),
            content_hash: "h".to_string(),
        }
    }

    #[test]
    fn test_fresh_when_size_and_time_match() {
        let r = record("/a", 10, "2023-01-01");
        assert!(!is_stale(&r, 10, "2023-01-01"));
    }

    #[test]
    fn test_stale_when_either_differs() {
        let r = record("/a", 10, "2023-01-01");
        assert!(is_stale(&r, 11, "2023-01-01"));
        assert!(is_stale(&r, 10, "2023-01-02"));
        assert!(is_stale(&r, 0, ""));
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = DirectoryIndex::load(&dir.path().join(DEFAULT_INDEX_FILE)).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_INDEX_FILE);
        fs::write(&path, b"{ not json").unwrap();
        let err = DirectoryIndex::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse index"));
    }

    #[test]
    fn test_null_files_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_INDEX_FILE);
        fs::write(&path, br#"{"files":null}"#).unwrap();
        assert!(DirectoryIndex::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_INDEX_FILE);
        let index = DirectoryIndex {
            files: vec![record("/x/a", 1, "d1"), record("/x/b", 2, "d2")],
        };
        index.save(&path).unwrap();

        assert!(!temp_path(&path).exists());
        let loaded = DirectoryIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.get("/x/b").map(|r| r.size), Some(2));
        assert!(loaded.get("/x/c").is_none());
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let temp = temp_path(Path::new("/data/results.json"));
        assert_eq!(temp, PathBuf::from("/data/results.json.tmp"));
    }
}
