//! vsquery - Find the recordings in a corpus most similar to a query
//!
//! Usage: vsquery [--config <path>] [--top-n <n>] <corpus_dir> <recording>

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use voxsim_cli::output::{error_report, print_json, QueryOutput};
use voxsim_core::{Corpus, VoxsimConfig};

#[derive(Parser, Debug)]
#[command(name = "vsquery")]
#[command(about = "Rank an indexed corpus against a query recording", long_about = None)]
struct Args {
    /// Corpus root directory, previously built with vsbuild
    corpus_dir: PathBuf,

    /// Query recording
    recording: PathBuf,

    /// Number of results (defaults to query.top_n from the config)
    #[arg(short = 'n', long)]
    top_n: Option<usize>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    if let Err(e) = run_vsquery(args) {
        print_json(&error_report(&e));
        std::process::exit(1);
    }
}

fn run_vsquery(args: Args) -> Result<()> {
    let config = VoxsimConfig::load_or_default(args.config.as_deref())?;
    let top_n = args.top_n.unwrap_or(config.query.top_n);

    if !args.recording.is_file() {
        anyhow::bail!("Query file not found: {}", args.recording.display());
    }

    let corpus = Corpus::from_config(&args.corpus_dir, &config);
    let start = std::time::Instant::now();
    let outcome = corpus
        .query(&args.recording, top_n)
        .with_context(|| format!("Query against {} failed", args.corpus_dir.display()))?;

    log::info!(
        "Ranked {} hits in {:.2}s",
        outcome.hits.len(),
        start.elapsed().as_secs_f64()
    );
    for skipped in &outcome.skipped {
        log::warn!("{}", skipped);
    }

    print_json(&QueryOutput::new(
        args.recording.display().to_string(),
        &outcome,
    ));
    Ok(())
}
