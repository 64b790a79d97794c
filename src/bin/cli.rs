//! gravtree CLI - cluster weighted points into a merge tree
//!
//! Usage:
//!   gravtree-cli <input.csv> <output.txt> [--max-records N] [--cache-threshold T]
//!
//! Reads `longitude,latitude,weight` rows (header ignored, weight ≤ 0
//! skipped) and writes one whitespace-separated record per merge, in merge
//! order, until a single root region remains.

use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use gravtree::{read_points_file, ClusterConfig, ClusterEngine, MergeWriter};

#[derive(Parser)]
#[command(name = "gravtree-cli")]
#[command(about = "Cluster weighted geographic points into a merge tree", long_about = None)]
struct Cli {
    /// Input CSV file: header line, then longitude,latitude,weight rows
    input: PathBuf,

    /// Output file: one 13-field record per merge
    output: PathBuf,

    /// Maximum number of input rows to read
    #[arg(long)]
    max_records: Option<usize>,

    /// Member-count threshold above which merged regions cache pair potentials
    #[arg(long, default_value = "100")]
    cache_threshold: usize,
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> gravtree::Result<()> {
    let config = ClusterConfig {
        cache_threshold: cli.cache_threshold,
        max_records: cli.max_records,
    };

    let points = read_points_file(&cli.input, config.max_records)?;
    log::info!(
        "loaded {} points from {}",
        points.len(),
        cli.input.display()
    );
    let expected = points.len().saturating_sub(1);

    let mut engine = ClusterEngine::new(points, config);
    let out = File::create(&cli.output)?;
    let mut sink = MergeWriter::new(BufWriter::new(out));
    let stats = engine.run(&mut sink)?;

    log::info!(
        "emitted {} of {} merge records to {}",
        stats.records_emitted,
        expected,
        cli.output.display()
    );
    Ok(())
}
