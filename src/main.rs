//! QuantEye pipeline CLI.
//!
//! `run` triggers one pipeline run and prints its outcome, `worker` is the
//! child side of process isolation, `artifacts` lists the artifact store.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quanteye::application::worker::serve_stdio;
use quanteye::application::{PipelineOrchestrator, PipelineOutcome};
use quanteye::config::{AppConfig, Mode, WorkerKind};
use quanteye::domain::artifacts::ArtifactId;
use quanteye::domain::optimization_config::ConfigOverrides;
use quanteye::domain::report::{MetricsSummary, Recommendation};
use quanteye::infrastructure::artifact_store::ArtifactStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "QuantEye portfolio pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ingestion, feature engineering and optimization once
    Run {
        /// Risk-aversion coefficient
        #[arg(long)]
        gamma: Option<f64>,

        /// Maximum number of assets in the portfolio
        #[arg(long)]
        top_n: Option<usize>,

        /// TOML configuration file (environment variables otherwise)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Data source (crypto, mock)
        #[arg(long)]
        mode: Option<String>,

        /// Artifact store directory
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Worker isolation (thread, process)
        #[arg(long)]
        worker: Option<String>,
    },
    /// Execute a job read from stdin and report events on stdout (internal)
    Worker,
    /// List the artifacts currently in the store
    Artifacts {
        /// TOML configuration file (environment variables otherwise)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Artifact store directory
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },
}

fn init_tracing() {
    // stdout is reserved for worker events
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .with(stderr_layer)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_toml_file(path),
        None => AppConfig::from_env().context("Failed to load config from environment"),
    }
}

fn print_report(store: &ArtifactStore) -> Result<()> {
    let metrics: Vec<MetricsSummary> = store.read(ArtifactId::MetricsSummary)?;
    let recommendations: Vec<Recommendation> = store.read(ArtifactId::Recommendations)?;

    if let Some(m) = metrics.first() {
        println!("\n{}", "=".repeat(60));
        println!("{:<18} | {:>12} | {:>12}", "", "Portfolio", "BTC");
        println!("{}", "-".repeat(60));
        println!(
            "{:<18} | {:>11.2}% | {:>11.2}%",
            "CAGR",
            m.portfolio_cagr * 100.0,
            m.btc_cagr * 100.0
        );
        println!(
            "{:<18} | {:>12.2} | {:>12.2}",
            "Sharpe", m.portfolio_sharpe, m.btc_sharpe
        );
        println!(
            "{:<18} | {:>11.2}% | {:>11.2}%",
            "Max drawdown",
            m.portfolio_mdd * 100.0,
            m.btc_mdd * 100.0
        );
        println!(
            "{:<18} | {:>11.1}% | {:>12}",
            "Win rate",
            m.win_rate * 100.0,
            "-"
        );
        println!(
            "{:<18} | {:>11.1}% | {:>12}",
            "Beats BTC",
            m.outperform_rate * 100.0,
            "-"
        );
    }

    println!(
        "\n{:<8} | {:>8} | {:>9} | {:>9} | {:>7}",
        "Asset", "Weight", "Exp ret", "Exp vol", "Sharpe"
    );
    println!("{}", "-".repeat(60));
    for rec in &recommendations {
        println!(
            "{:<8} | {:>7.2}% | {:>8.2}% | {:>8.2}% | {:>7.2}",
            rec.asset,
            rec.weight * 100.0,
            rec.exp_ret * 100.0,
            rec.exp_vol * 100.0,
            rec.sharpe
        );
    }
    Ok(())
}

fn print_inventory(store: &ArtifactStore) {
    println!("Artifact store: {}", store.base_dir().display());
    for status in store.inventory() {
        let modified = status
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:>9} {:>10}  {}  {}",
            status.logical_name,
            if status.present { "present" } else { "missing" },
            status.bytes,
            modified,
            status.path.display()
        );
    }
}

async fn run(
    gamma: Option<f64>,
    top_n: Option<usize>,
    config_path: Option<PathBuf>,
    mode: Option<String>,
    base_dir: Option<PathBuf>,
    worker: Option<String>,
) -> Result<ExitCode> {
    let mut config = load_config(config_path.as_ref())?;
    if let Some(mode) = mode {
        config.ingestion.mode = Mode::from_str(&mode)?;
    }
    if let Some(base_dir) = base_dir {
        config.ingestion.base_dir = base_dir;
    }
    if let Some(worker) = worker {
        config.worker.kind = WorkerKind::from_str(&worker)?;
    }

    info!(
        "Starting QuantEye pipeline ({:?} data, {:?} worker) into {}",
        config.ingestion.mode,
        config.worker.kind,
        config.ingestion.base_dir.display()
    );

    let orchestrator = PipelineOrchestrator::from_config(&config)?;
    let overrides = ConfigOverrides {
        risk_aversion: gamma,
        universe_size_cap: top_n,
    };
    let outcome = orchestrator.start_pipeline(overrides).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to encode outcome")?
    );

    match outcome {
        PipelineOutcome::Success { .. } => {
            print_report(&ArtifactStore::new(&config.ingestion.base_dir))?;
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            gamma,
            top_n,
            config,
            mode,
            base_dir,
            worker,
        } => run(gamma, top_n, config, mode, base_dir, worker).await,
        Commands::Worker => {
            let success = serve_stdio().await?;
            Ok(if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Artifacts { config, base_dir } => {
            let config = load_config(config.as_ref())?;
            let base_dir = base_dir.unwrap_or(config.ingestion.base_dir);
            print_inventory(&ArtifactStore::new(base_dir));
            Ok(ExitCode::SUCCESS)
        }
    }
}
