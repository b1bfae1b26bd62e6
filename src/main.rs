//! intf-batch: generate interferograms for every pair in a manifest
//!
//! # Usage
//!
//! ```bash
//! # run both stages from the batch root
//! intf-batch intf.in batch_tops.config
//!
//! # resume at the interferogram stage with four workers
//! intf-batch --workers 4 --keep-going intf.in batch_tops.config
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use intfbatch::{
    BatchLayout, BatchOptions, BatchRunner, Configuration, FailurePolicy, GmtsarTools, PairList,
    StageGate,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "intf-batch")]
#[command(about = "Batch interferogram generation for SAR time-series analysis", long_about = None)]
struct Cli {
    /// Pair manifest, one `reference:repeat` entry per line
    manifest: PathBuf,

    /// Batch configuration file (`key = value` per line)
    config: PathBuf,

    /// Batch root holding raw/ and topo/
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Number of pairs processed concurrently
    #[arg(short, long, default_value = "1")]
    workers: usize,

    /// Continue with remaining pairs when one fails
    #[arg(long)]
    keep_going: bool,

    /// Skip pairs that already have a published result
    #[arg(long)]
    skip_published: bool,

    /// Last stage to run (1 = topography only)
    #[arg(long, default_value = "2")]
    stop_after: u8,

    /// Write a JSON run report to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Directory containing the processing scripts (default: PATH lookup)
    #[arg(long)]
    tool_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = Configuration::load(&cli.config)
        .with_context(|| format!("Invalid configuration {}", cli.config.display()))?;
    let pairs = PairList::parse(&cli.manifest)
        .with_context(|| format!("Invalid pair manifest {}", cli.manifest.display()))?;
    let layout = BatchLayout::new(&cli.root)
        .with_context(|| format!("Invalid batch root {}", cli.root.display()))?;

    let stop_after = match StageGate::new(cli.stop_after) {
        Some(stage) => stage,
        None => bail!("--stop-after must be 1 or 2, got {}", cli.stop_after),
    };
    if cli.workers == 0 {
        bail!("--workers must be at least 1");
    }

    let tools = match &cli.tool_dir {
        Some(dir) => GmtsarTools::with_bin_dir(dir)
            .with_context(|| format!("Invalid tool directory {}", dir.display()))?,
        None => GmtsarTools::new(),
    };

    let options = BatchOptions {
        workers: cli.workers,
        failure_policy: if cli.keep_going {
            FailurePolicy::KeepGoing
        } else {
            FailurePolicy::FailFast
        },
        skip_published: cli.skip_published,
        stop_after,
    };

    let runner = BatchRunner::new(config, pairs, layout, tools).with_options(options);
    let report = runner.run().context("Batch run aborted")?;

    if let Some(path) = &cli.report {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        log::info!("Report written to {}", path.display());
    }

    if !report.is_success() {
        bail!(
            "{} of {} pair(s) failed, {} cancelled",
            report.failed(),
            report.pairs.len(),
            report.cancelled()
        );
    }

    Ok(())
}
