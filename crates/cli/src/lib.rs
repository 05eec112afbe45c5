pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use bakecast_core::config::{AppConfig, LoadOptions, LogFormat};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "bakecast",
    about = "Bakecast weekly production planner",
    long_about = "Suggest next week's production per product from sales, losses and events.",
    after_help = "Examples:\n  bakecast forecast --input snapshot.json\n  bakecast doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Plan the target week from a snapshot and print the plan as JSON")]
    Forecast {
        #[arg(long, help = "Snapshot file (defaults to data.snapshot_path)")]
        input: Option<PathBuf>,
        #[arg(long, help = "First day of the target week, overriding the snapshot")]
        week_start: Option<String>,
        #[arg(long, help = "Last day of the target week, overriding the snapshot")]
        week_end: Option<String>,
        #[arg(long, help = "Correlation id attached to log events")]
        correlation_id: Option<String>,
        #[arg(long, help = "Print single-line JSON")]
        compact: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config and snapshot readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
        #[arg(long, help = "Snapshot file to check (defaults to data.snapshot_path)")]
        input: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&AppConfig::load(LoadOptions::default()).unwrap_or_default());

    let result = match cli.command {
        Command::Forecast { input, week_start, week_end, correlation_id, compact } => {
            commands::forecast::run(&commands::forecast::ForecastArgs {
                input,
                week_start,
                week_end,
                correlation_id,
                compact,
            })
        }
        Command::Config => commands::CommandResult::output(commands::config::run()),
        Command::Doctor { json, input } => commands::doctor::run(json, input.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr; stdout carries command output only.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.trim().to_ascii_lowercase()));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
