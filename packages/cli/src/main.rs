#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the forestcast pipeline.
//!
//! Uses `indicatif-log-bridge` (via [`forestcast_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the region progress bar never fight for the terminal.

mod report;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use forestcast_cli_utils::{IndicatifProgress, MultiProgress};
use forestcast_dataset::{DatasetConfig, DatasetError};
use forestcast_pipeline::PipelineResult;
use forestcast_server::{ResultSource, ServerOptions};

#[derive(Parser)]
#[command(
    name = "forestcast",
    about = "Tree cover driver analysis and forecasting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the input tables come from.
#[derive(Args)]
struct InputArgs {
    /// Dataset layout (TOML). Defaults to the built-in layout.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the input tables (overrides `[data] dir`)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

impl InputArgs {
    fn load(&self) -> Result<(DatasetConfig, PathBuf), DatasetError> {
        let config = match &self.config {
            Some(path) => DatasetConfig::from_file(path)?,
            None => DatasetConfig::embedded()?,
        };
        let data_dir = self
            .data_dir
            .clone()
            .unwrap_or_else(|| config.data.dir.clone());
        Ok((config, data_dir))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and log the results
    Run {
        #[command(flatten)]
        inputs: InputArgs,
    },
    /// Run the pipeline and write the result tables to a directory
    Export {
        /// Output directory
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        inputs: InputArgs,
    },
    /// Serve results over HTTP (`BIND_ADDR`, `PORT`)
    Serve {
        #[command(flatten)]
        inputs: InputArgs,
        /// Serve a previously exported directory instead of running the
        /// pipeline
        #[arg(long)]
        from_exports: Option<PathBuf>,
        /// Frontend bundle to serve at `/`
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

fn run_pipeline(
    inputs: &InputArgs,
    multi: &MultiProgress,
) -> Result<PipelineResult, Box<dyn std::error::Error>> {
    let (config, data_dir) = inputs.load()?;
    let progress = IndicatifProgress::regions_bar(multi, "Loading datasets");

    let start = Instant::now();
    let result = forestcast_pipeline::run_pipeline(&config, &data_dir, &progress)?;
    log::info!(
        "Pipeline completed in {:.1}s",
        start.elapsed().as_secs_f64()
    );

    report::log_report(&result);
    Ok(result)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = forestcast_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { inputs } => {
            run_pipeline(&inputs, &multi)?;
        }
        Commands::Export { out, inputs } => {
            let result = run_pipeline(&inputs, &multi)?;
            forestcast_pipeline::export::export(&result, &out)?;
        }
        Commands::Serve {
            inputs,
            from_exports,
            static_dir,
        } => {
            let source = if let Some(dir) = from_exports {
                ResultSource::Exports(dir)
            } else {
                let (config, data_dir) = inputs.load()?;
                ResultSource::Pipeline { config, data_dir }
            };
            let progress = IndicatifProgress::regions_bar(&multi, "Preparing results");
            let options = ServerOptions { source, static_dir };
            actix_web::rt::System::new()
                .block_on(forestcast_server::run_server(options, progress))?;
        }
    }

    Ok(())
}
