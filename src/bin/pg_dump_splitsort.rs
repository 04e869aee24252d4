//! Split a plain-text pg_dump into per-table files with sorted rows.

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use dump_merge_sort::split::{split_sql_file, DEFAULT_MAX_MEMORY};

/// Split a pg_dump into prologue, per-table and epilogue files and sort the table data.
#[derive(Parser)]
#[command(name = "pg_dump_splitsort")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the plain-text dump, output files are written to the same directory
    sql_path: PathBuf,

    /// Memory budget for sorting a single table before spilling to temporary files
    #[arg(short, long, default_value_t = DEFAULT_MAX_MEMORY)]
    max_memory: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    SimpleLogger::new().with_level(level).init()?;

    let files = split_sql_file(&cli.sql_path, cli.max_memory)?;
    log::info!("Wrote {} files", files.len());
    Ok(())
}
