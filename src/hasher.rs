use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

/// Computes a content digest from a byte stream.
///
/// Implementations must consume the reader sequentially to the end and
/// must be deterministic. Two files with equal digests are treated as
/// having equal content; no byte-for-byte comparison is ever made, so a
/// digest collision would cause a false duplicate. That risk is accepted.
pub trait ContentHasher {
    fn hash_reader(&self, reader: &mut dyn Read) -> io::Result<String>;

    /// Opens `path` and hashes its whole content.
    fn hash_file(&self, path: &Path) -> Result<String> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open file: '{}'", path.display()))?;
        let mut reader = BufReader::new(file);
        let hash = self
            .hash_reader(&mut reader)
            .with_context(|| format!("Failed to read file: '{}'", path.display()))?;
        debug!("Hash calculated for '{}': {}", path.display(), hash);
        Ok(hash)
    }
}

/// BLAKE3 digest rendered as lowercase hex.
#[derive(Debug, Default, Clone, Copy)]
pub struct Blake3Hasher;

impl ContentHasher for Blake3Hasher {
    fn hash_reader(&self, reader: &mut dyn Read) -> io::Result<String> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = [0; 8192];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finalize().to_hex().to_string())
    }
}
