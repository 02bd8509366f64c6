//! Fleet Monitor CLI
//!
//! A command-line tool for inspecting fleet health, breach history and
//! thresholds, and for driving refresh and export on a monitor agent.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{breaches, export, refresh, status, thresholds};

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Fleet Monitor CLI
#[derive(Parser)]
#[command(name = "fleetmon")]
#[command(author, version, about = "CLI for the Fleet Resource Monitor", long_about = None)]
pub struct Cli {
    /// Agent URL (can also be set via FLEETMON_API_URL or the config file)
    #[arg(long, env = "FLEETMON_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the fleet snapshot for the current selection
    Status,

    /// Show recent threshold breaches, newest first
    Breaches,

    /// Inspect or edit alert thresholds
    #[command(subcommand)]
    Thresholds(ThresholdCommands),

    /// Switch between live and manual refresh
    Mode {
        mode: ModeArg,

        /// Live refresh period in seconds (1, 2, 5, 10 or 30)
        #[arg(long, short)]
        interval: Option<u64>,
    },

    /// Trigger one refresh tick now
    Refresh,

    /// Change the scope, window or metric the views are computed for
    Select {
        /// Limit the views to one entity
        #[arg(long, conflicts_with = "all")]
        entity: Option<String>,

        /// Cover every monitored entity
        #[arg(long)]
        all: bool,

        /// Time window (1h, 24h, 7d, 30d)
        #[arg(long, short)]
        window: Option<String>,

        /// Charted metric (cpu, memory, disk, network, responseTime, errorRate, activeConnections)
        #[arg(long, short)]
        metric: Option<String>,
    },

    /// Export samples or breach events for the current selection
    Export {
        /// File format
        #[arg(long, value_enum, default_value = "csv")]
        format: export::FileFormat,

        /// What to export
        #[arg(long, value_enum, default_value = "samples")]
        kind: export::ExportKind,

        /// Output file or directory (falls back to the configured export_dir, then stdout)
        #[arg(long, short)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ThresholdCommands {
    /// List thresholds for every metric
    List,

    /// Update one metric's threshold
    Set {
        /// Metric key (e.g. cpu, responseTime)
        metric: String,

        #[arg(long)]
        warning: Option<f64>,

        #[arg(long)]
        critical: Option<f64>,

        /// Enable evaluation for the metric
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        /// Disable evaluation for the metric
        #[arg(long)]
        disable: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Live,
    Manual,
}

impl ModeArg {
    fn as_str(&self) -> &'static str {
        match self {
            ModeArg::Live => "live",
            ModeArg::Manual => "manual",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = config::Config::load()?;
    let api_url = cli
        .api_url
        .or(file_config.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    if cli.verbose {
        output::print_info(&format!("Using agent at {}", api_url));
    }

    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Status => status::show_status(&client, cli.format).await?,
        Commands::Breaches => breaches::show_breaches(&client, cli.format).await?,
        Commands::Thresholds(cmd) => match cmd {
            ThresholdCommands::List => thresholds::list_thresholds(&client, cli.format).await?,
            ThresholdCommands::Set {
                metric,
                warning,
                critical,
                enable,
                disable,
            } => {
                let enabled = match (enable, disable) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                thresholds::set_threshold(&client, &metric, warning, critical, enabled, cli.format)
                    .await?;
            }
        },
        Commands::Mode { mode, interval } => {
            refresh::set_mode(&client, mode.as_str(), interval, cli.format).await?;
        }
        Commands::Refresh => refresh::refresh_now(&client, cli.format).await?,
        Commands::Select {
            entity,
            all,
            window,
            metric,
        } => {
            status::select(&client, entity, all, window, metric, cli.format).await?;
        }
        Commands::Export {
            format,
            kind,
            output,
        } => {
            let output = output.or(file_config.export_dir);
            export::export(&client, format, kind, output.as_deref()).await?;
        }
    }

    Ok(())
}
