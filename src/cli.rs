use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dedup-index")]
#[command(about = "Keep per-directory content indexes and delete duplicate files across directories")]
pub struct Cli {
    /// Config file listing the directories to manage (.json or .toml)
    #[arg(default_value = "config.json")]
    pub config: PathBuf,

    /// Number of directories indexed in parallel
    #[arg(short, long, default_value = "1")]
    pub threads: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
