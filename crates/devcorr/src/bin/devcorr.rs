//! `devcorr` command-line tool.
//!
//! Usage:
//!     devcorr simulate  --input rows.json     [--config engine.json] [--output report.json]
//!     devcorr recommend --input rows.json
//!     devcorr optimize  --input layers.json
//!     devcorr anchored  --input anchored.json

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use devcorr::io::{
    load_json, AnchoredRequest, CorrectionReport, DevcorrIoError, EngineConfig, OptimizeRequest,
    RecommendRequest, SimulateRequest,
};
use log::{error, LevelFilter};

/// Deviation-correction engine
#[derive(Parser)]
#[command(name = "devcorr", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Engine config (thresholds, ranges, sweep, row geometry)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: off, error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: LevelFilter,

    /// Emit JSON log lines
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Args)]
struct IoArgs {
    /// Request document
    #[arg(short, long)]
    input: PathBuf,

    /// Report path; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply station offsets to measured rows
    Simulate(IoArgs),
    /// Recommend incremental station offsets
    Recommend(IoArgs),
    /// Optimize base and overlay corner offsets
    Optimize(IoArgs),
    /// Optimize one layer around a recommended translation
    Anchored(IoArgs),
}

fn init_logging(cli: &Cli) {
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init_with_filter(cli.log_level);
        devcorr::core::init_tracing(cli.log_json);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = devcorr::core::init_with_level(cli.log_level);
    }
}

fn emit(report: &CorrectionReport, output: Option<&Path>) -> Result<(), DevcorrIoError> {
    match output {
        Some(path) => report.write_json(path),
        None => {
            println!("{}", serde_json::to_string_pretty(report)?);
            Ok(())
        }
    }
}

fn run(cli: &Cli) -> Result<CorrectionReport, DevcorrIoError> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load_json(path)?,
        None => EngineConfig::default(),
    };
    let (args, report) = match &cli.command {
        Command::Simulate(a) => (a, config.simulate(&load_json::<SimulateRequest>(&a.input)?)),
        Command::Recommend(a) => (a, config.recommend(&load_json::<RecommendRequest>(&a.input)?)),
        Command::Optimize(a) => (a, config.optimize(&load_json::<OptimizeRequest>(&a.input)?)),
        Command::Anchored(a) => (a, config.anchored(&load_json::<AnchoredRequest>(&a.input)?)),
    };
    emit(&report, args.output.as_deref())?;
    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("devcorr").entered();

    match run(&cli) {
        Ok(report) if report.error.is_none() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(e) => {
            error!("{e}");
            eprintln!("devcorr: {e}");
            ExitCode::FAILURE
        }
    }
}
