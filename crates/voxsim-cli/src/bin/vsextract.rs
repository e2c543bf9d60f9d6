//! vsextract - Print the summary feature vector of one recording
//!
//! Usage: vsextract [--preprocess] <recording>

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use voxsim_cli::output::{error_report, print_json};
use voxsim_core::settings::PreprocessConfig;
use voxsim_core::{extract_summary, Preprocessor, SpectralExtractor};

#[derive(Parser, Debug)]
#[command(name = "vsextract")]
#[command(about = "Extract the summary feature vector of a recording", long_about = None)]
struct Args {
    /// Input audio file path
    recording: PathBuf,

    /// Normalize amplitude and strip silence before analysis
    #[arg(long)]
    preprocess: bool,

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

    if let Err(e) = run_vsextract(&args) {
        print_json(&error_report(&e));
        std::process::exit(1);
    }
}

fn run_vsextract(args: &Args) -> Result<()> {
    let preprocessor = Preprocessor::new(PreprocessConfig {
        enabled: args.preprocess,
        ..PreprocessConfig::default()
    });
    let extractor = SpectralExtractor::default();

    log::info!("Processing: {}", args.recording.display());
    let start = std::time::Instant::now();
    let summary = extract_summary(&args.recording, &extractor, Some(&preprocessor))
        .map_err(|source| voxsim_core::Error::Extraction {
            identity: args.recording.display().to_string(),
            source,
        })?;
    log::info!("Extracted in {:.2}s", start.elapsed().as_secs_f64());

    print_json(&summary.to_feature_file());
    Ok(())
}
