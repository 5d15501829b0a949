// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Command-line transport for the attachment recovery pipeline.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use attachpack::app::{self, JobOutcome};
use attachpack::config::{CollisionPolicy, PipelineConfig};

/// Recover typed attachments from note container archives.
///
/// Unpacks each container, identifies the files in its `attachments/` folder
/// by their leading bytes, renames them with the right extension and packs
/// them into `processed_files.zip`.
#[derive(Parser, Debug)]
#[command(name = "attachpack", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract, identify and repack the attachments of one or more containers.
    Process(ProcessArgs),

    /// Identify individual files by their leading bytes.
    Sniff(SniffArgs),
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Container files (for example `.goodnotes` exports).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory that receives the output archive(s).
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// JSON configuration file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root for per-request working directories.
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// How to handle attachments that map to the same output name.
    #[arg(long, value_enum)]
    collisions: Option<CollisionPolicy>,

    /// Abort a request that takes longer than this many seconds.
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Deflate level for the output archive (0-9).
    #[arg(long)]
    compression_level: Option<i64>,

    /// Number of containers processed in parallel.
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Write a JSON report of every request to this path.
    #[arg(long)]
    report: Option<PathBuf>,
}

impl ProcessArgs {
    /// Resolve the effective configuration: file (if any), then flag overrides.
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.work_dir {
            config.work_root = dir.clone();
        }
        if let Some(policy) = self.collisions {
            config.collisions = policy;
        }
        if let Some(secs) = self.deadline_secs {
            config.deadline_secs = Some(secs);
        }
        if let Some(level) = self.compression_level {
            config.compression_level = level;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct SniffArgs {
    /// Files to identify.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Process(args) => run_process(&args),
        Commands::Sniff(args) => run_sniff(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn run_process(args: &ProcessArgs) -> Result<u8> {
    let config = args.pipeline_config()?;
    let workers = args.jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
    });

    let jobs = app::plan_jobs(&args.inputs, &args.output_dir);
    let outcomes = app::run_batch(jobs, &config, workers);

    for outcome in &outcomes {
        print_outcome(outcome);
    }
    if let Some(path) = &args.report {
        app::write_report(path, &outcomes)?;
    }

    // Worst failure wins: a generic failure outranks the more specific codes.
    let code = outcomes
        .iter()
        .map(JobOutcome::exit_code)
        .max_by_key(|code| match code {
            0 => 0,
            1 => 3,
            other => *other - 1,
        })
        .unwrap_or(0);
    Ok(code)
}

fn print_outcome(outcome: &JobOutcome) {
    match &outcome.result {
        Ok(_) => println!("{}: {}", outcome.job.input.display(), outcome.user_message()),
        Err(err) => {
            tracing::error!(input = ?outcome.job.input, "{err:#}");
            eprintln!("{}: {}", outcome.job.input.display(), outcome.user_message());
        }
    }
}

fn run_sniff(args: &SniffArgs) -> Result<u8> {
    let mut code = 0;
    for path in &args.files {
        match app::sniff_file(path) {
            Ok(Some(tag)) => println!("{}\t{}", path.display(), tag),
            Ok(None) => println!("{}\tunresolved", path.display()),
            Err(err) => {
                tracing::error!("{err:#}");
                code = 1;
            }
        }
    }
    Ok(code)
}
