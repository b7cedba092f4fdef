use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde::Deserialize;

use crate::index::DEFAULT_INDEX_FILE;

/// The set of directories to keep indexed and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub dirs: Vec<String>,
    /// Snapshot file name written inside every managed directory.
    #[serde(default = "default_index_file")]
    pub index_file: String,
}

fn default_index_file() -> String {
    DEFAULT_INDEX_FILE.to_string()
}

impl Config {
    /// Reads a configuration file. `.json` files are parsed as JSON,
    /// anything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from '{}'", path.display());
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: '{}'", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: Config = if is_json {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config: '{}'", path.display()))?
        } else {
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config: '{}'", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.dirs.is_empty() {
            bail!("Config lists no directories");
        }
        if self.index_file.is_empty()
            || self.index_file.contains(['/', '\\'])
            || self.index_file == "."
            || self.index_file == ".."
        {
            bail!("Invalid index file name: '{}'", self.index_file);
        }
        Ok(())
    }

    /// Configured directories in order, resolved to canonical form, with
    /// repeats removed. Two spellings of one directory count as a repeat.
    /// Fails if any directory cannot be resolved.
    pub fn unique_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut result: Vec<PathBuf> = Vec::new();
        for dir in &self.dirs {
            let path = fs::canonicalize(dir)
                .with_context(|| format!("Failed to resolve directory: '{}'", dir))?;
            if result.contains(&path) {
                warn!(
                    "Directory '{}' resolves to '{}', which is already listed, ignoring repeat",
                    dir,
                    path.display()
                );
                continue;
            }
            result.push(path);
        }
        Ok(result)
    }
}
