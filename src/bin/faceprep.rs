//! Command line front end for the dataset preparation pipeline.
//!
//! Usage:
//!   faceprep -d data/300W -o out                                  # 00_Test subset
//!   faceprep -d data/300W -o out -t 01_Indoor -t 02_Outdoor -s 256 # training subsets, smaller crops
//!   faceprep --config prep.toml                                   # options from TOML, flags override

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use faceprep::logging::{get_subscriber, init_subscriber};
use faceprep::{run_pipeline, Config};

#[derive(Parser, Debug)]
#[command(name = "faceprep")]
#[command(author, version, about = "Crop, normalize and align 68-point face annotations", long_about = None)]
struct Args {
    /// Dataset root containing one directory per target subset
    #[arg(short = 'd', long = "dataset-directory")]
    dataset_directory: Option<PathBuf>,

    /// Directory receiving diagnostic rasters and summaries (created if absent)
    #[arg(short = 'o', long = "output-directory")]
    output_directory: Option<PathBuf>,

    /// Crops wider than this are resized to this square edge length
    #[arg(short = 's', long = "max-image-size")]
    max_image_size: Option<u32>,

    /// Target subset directory; repeat for several
    #[arg(short = 't', long = "target")]
    targets: Vec<String>,

    /// TOML file with any of the options above
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter (trace|debug|info|warn|error), RUST_LOG wins if set
    #[arg(long)]
    log_filter: Option<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(dir) = self.dataset_directory {
            config.dataset_directory = Some(dir);
        }
        if let Some(dir) = self.output_directory {
            config.output_directory = Some(dir);
        }
        if let Some(size) = self.max_image_size {
            config.max_image_size = size;
        }
        if !self.targets.is_empty() {
            config.targets = self.targets;
        }
        if let Some(filter) = self.log_filter {
            config.log_filter = filter;
        }
        Ok(config)
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = args.into_config()?;
    init_subscriber(get_subscriber(&config.log_filter))?;

    let summary = run_pipeline(&config)?;
    println!("#images {}", summary.accepted_samples);
    Ok(())
}

/// Single-line report of a fatal error with its context chain.
fn failure_message(e: &anyhow::Error) -> String {
    format!("error: {:#}", e)
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", failure_message(&e));
            ExitCode::FAILURE
        }
    }
}
