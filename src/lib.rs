pub mod cli;
pub mod config;
pub mod hasher;
pub mod index;
pub mod scanner;
pub mod duplicates;
pub mod pipeline;
pub mod utils;

pub use cli::Cli;
pub use config::Config;
pub use hasher::{Blake3Hasher, ContentHasher};
pub use index::{DirectoryIndex, is_stale};
pub use scanner::{ReconcileStats, index_directory, reconcile};
pub use duplicates::{DedupOutcome, deduplicate, find_duplicates};
pub use pipeline::{IndexStats, RunSummary, run};
pub use utils::{FileRecord, format_human_elapsed, format_timestamp};
