//! vsbuild - Ingest a corpus of recordings into a similarity index
//!
//! Usage: vsbuild [--config <path>] [--format json|snapshot|auto] <corpus_dir>

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use voxsim_cli::output::{build_report, error_report, print_json};
use voxsim_core::{Corpus, IngestEvent, StoreFormat, VoxsimConfig};

#[derive(Parser, Debug)]
#[command(name = "vsbuild")]
#[command(about = "Extract, normalize and index every recording under a directory", long_about = None)]
struct Args {
    /// Corpus root directory (defaults to corpus.root from the config)
    corpus_dir: Option<PathBuf>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store layout, overriding the config
    #[arg(short, long)]
    format: Option<StoreFormat>,

    /// Write the snapshot uncompressed
    #[arg(long)]
    no_compress: bool,

    /// Normalize amplitude and strip silence before analysis
    #[arg(long)]
    preprocess: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    // Default: no logs (clean JSON output for parsing)
    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    if let Err(e) = run_vsbuild(args) {
        print_json(&error_report(&e));
        std::process::exit(1);
    }
}

fn run_vsbuild(args: Args) -> Result<()> {
    let mut config = VoxsimConfig::load_or_default(args.config.as_deref())?;
    if let Some(format) = args.format {
        config.store.format = format;
    }
    if args.no_compress {
        config.store.compress = false;
    }
    if args.preprocess {
        config.preprocess.enabled = true;
    }

    let root = match args.corpus_dir.or_else(|| config.corpus.root.clone()) {
        Some(root) => root,
        None => anyhow::bail!("No corpus directory given and none set in the config"),
    };

    let corpus = Corpus::from_config(&root, &config);
    log::info!(
        "Building {:?} store for {}",
        config.store.format,
        root.display()
    );

    let report = corpus.ingest_with_progress(&|event| match event {
        IngestEvent::Discovered { total } => log::info!("Found {} recordings", total),
        IngestEvent::Extracted { identity } => log::debug!("Extracted {}", identity),
        IngestEvent::Failed { identity, reason } => log::info!("Failed {}: {}", identity, reason),
        IngestEvent::BoundsComputed { vectors } => {
            log::info!("Computed bounds over {} vectors", vectors)
        }
        IngestEvent::Published { entries } => log::info!("Published {} entries", entries),
    })?;

    let format = format!("{:?}", config.store.format).to_lowercase();
    print_json(&build_report(&root.display().to_string(), &format, &report));

    Ok(())
}
