//! Retalk - lip-sync video dubbing front end
//!
//! Collects inference parameters from the command line or a parameter file,
//! runs the external inference program once, and reports where the generated
//! video was written or why it was not.

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use retalk::cli::{Args, Commands, build_parameter_set};
use retalk::config::Config;
use retalk::params::ParameterSet;
use retalk::progress::ConsoleProgress;
use retalk::runner::SystemExecutor;
use retalk::setup::SetupManager;
use retalk::workflow::Workflow;

const DEFAULT_CONFIG_FILE: &str = "retalk.toml";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Generate { face, audio, params, json, options } => {
            let base = params.map(ParameterSet::from_file).transpose()?;
            let params = build_parameter_set(base, face, audio, &options)?;

            let workflow = Workflow::new(config)?;
            let progress = ConsoleProgress::new();
            let report = workflow.submit(&params, &progress).await;
            progress.finish();

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                if let Some(output) = &report.output {
                    println!("{}", output.display());
                }
                println!("{}", report.status);
            }

            if !report.succeeded() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Defaults { config_template } => {
            if config_template {
                print!("{}", config.to_toml()?);
            } else {
                print!("{}", Workflow::reset_to_defaults().to_toml()?);
            }
        }
        Commands::Check => {
            let setup = SetupManager::new(config.clone());
            let executor = SystemExecutor::with_timeout(config.inference.timeout());
            let report = setup.check_environment(&executor).await?;

            println!("Working directory: {}", report.working_dir.display());
            println!("Results directory: {}", setup.results_dir().display());

            match &report.program {
                Ok(version) => println!("Inference program: {} ({})", config.inference.program, version),
                Err(reason) => println!("Inference program: unavailable - {}", reason),
            }

            if report.missing_checkpoints.is_empty() {
                println!("Model checkpoints: all present in {}", setup.checkpoints_dir().display());
            } else {
                println!("Missing checkpoint files in {}:", setup.checkpoints_dir().display());
                for file in &report.missing_checkpoints {
                    println!("   - {}", file);
                }
            }

            if !report.is_ready() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".retalk").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "retalk.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console output goes to stderr so stdout stays parseable
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("retalk.log").display()
    );

    Ok(())
}
