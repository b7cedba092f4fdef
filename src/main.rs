use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use indicatif::{HumanBytes, HumanCount};
use log::{LevelFilter, debug, info};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use dedup_index::{Blake3Hasher, Cli, Config, RunSummary, format_human_elapsed, pipeline};

fn init_logger(verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder = ConfigBuilder::new();
    // Falls back to UTC when the local offset cannot be determined.
    let _ = builder.set_time_offset_to_local();
    TermLogger::init(level, builder.build(), TerminalMode::Mixed, ColorChoice::Auto)?;
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let dedup = &summary.dedup;
    println!(
        "Indexed {} files in {} directories ({} hashed)",
        HumanCount(summary.pre.records as u64),
        summary.pre.directories,
        HumanCount(summary.pre.hashed as u64)
    );
    if dedup.deleted.is_empty() && dedup.failed.is_empty() {
        println!("{}", "No duplicate files found!".green());
    } else {
        println!(
            "{}",
            format!(
                "Deleted {} duplicate files, reclaimed {}",
                HumanCount(dedup.deleted.len() as u64),
                HumanBytes(dedup.reclaimed_bytes)
            )
            .yellow()
        );
    }
    for (record, err) in &dedup.failed {
        println!("{} '{}': {}", "Could not delete".red(), record.path, err);
    }
    println!(
        "{} files remain indexed",
        HumanCount(summary.post.records as u64)
    );
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    init_logger(cli.verbose)?;

    info!("Starting dedup-index v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command line arguments: {:?}", cli);

    let config = Config::load(&cli.config)?;
    info!("Managing {} directories", config.dirs.len());

    let summary = pipeline::run(&config, &Blake3Hasher, cli.threads)?;
    print_summary(&summary);

    info!(
        "Completed in {}",
        format_human_elapsed(start_time.elapsed())
    );
    Ok(())
}
