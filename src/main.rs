use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};

use quickaug::config::{AugmentConfig, OutputFormat};
use quickaug::export::{ExportKind, export_labels};
use quickaug::run_batch;

/// Augment annotated images with pixel-accurate shape tracking
#[derive(Parser, Debug)]
#[command(name = "quickaug", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write N augmented copies of every annotated image
    Augment {
        /// Directory with images and their .json sidecars
        source: PathBuf,

        /// Output directory
        dest: PathBuf,

        /// Config file (defaults to the user config directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Augmented copies per image
        #[arg(short = 'n', long)]
        iterations: Option<u32>,

        /// Base seed for reproducible runs
        #[arg(short, long)]
        seed: Option<u64>,

        /// Worker threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// Output image format (jpg or png)
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },

    /// Export annotations as flat label files plus config.yml
    Export {
        /// Dataset directory containing images/*.json
        dataset: PathBuf,

        /// bbox (rectangles) or segment (polygons)
        kind: ExportKind,

        /// Output directory, recreated on each run
        output: PathBuf,
    },

    /// Write the default configuration to a file
    Config {
        /// Destination (defaults to the user config directory)
        path: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn augment(source: &Path, dest: &Path, config: &AugmentConfig) -> anyhow::Result<ExitCode> {
    let report = run_batch(source, dest, config)?;

    println!(
        "Wrote {} pair(s) to {} (seed {})",
        report.written.len(),
        dest.display(),
        report.seed
    );
    if !report.skipped.is_empty() {
        println!("Skipped {} image(s)", report.skipped.len());
    }
    for failure in &report.failures {
        match failure.iteration {
            Some(i) => eprintln!("{} [{}]: {:#}", failure.item.display(), i, failure.error),
            None => eprintln!("{}: {:#}", failure.item.display(), failure.error),
        }
    }

    if report.attempted() > 0 && report.written.is_empty() {
        eprintln!("Every unit failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Augment {
            source,
            dest,
            config,
            iterations,
            seed,
            workers,
            format,
        } => {
            let mut settings = match config {
                Some(path) => AugmentConfig::try_load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => AugmentConfig::load_default(),
            };
            if let Some(n) = iterations {
                settings.iterations = n;
            }
            if seed.is_some() {
                settings.seed = seed;
            }
            if workers.is_some() {
                settings.workers = workers;
            }
            if let Some(format) = format {
                settings.output_format = format;
            }
            augment(&source, &dest, &settings)
        }
        Commands::Export {
            dataset,
            kind,
            output,
        } => {
            let summary = export_labels(&dataset, kind, &output)?;
            println!(
                "Wrote {} label file(s) and config.yml to {} ({} class(es))",
                summary.files_written,
                output.display(),
                summary.labels.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { path } => {
            let path = path
                .or_else(AugmentConfig::default_path)
                .context("No config directory available, pass a path")?;
            AugmentConfig::default()
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
