//! Hedge Engine Binary
//!
//! Replays historical ticks through the hedging loop.
//!
//! # Usage
//!
//! ```bash
//! hedge-engine backtest ticks.jsonl --config config.yaml
//! hedge-engine sweep ticks.jsonl
//! hedge-engine paper ticks.jsonl
//! ```
//!
//! # Environment Variables
//!
//! - `HEDGE_CONFIG`: Config file path (default: config.yaml when present)
//! - `RUST_LOG`: Log filter, overrides `observability.logging.level`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hedge_engine::backtest::{BacktestEngine, JsonLinesTickSource, run_sweep};
use hedge_engine::clock::SystemClock;
use hedge_engine::config::{ConfigCell, EngineConfig, load_config};
use hedge_engine::execution::{ExecutionSimulator, SimulatedBackend};
use hedge_engine::live::HedgePipeline;
use hedge_engine::observability::{MetricsConfig, init_metrics};
use hedge_engine::portfolio::Portfolio;
use hedge_engine::telemetry::init_tracing;
use tokio_util::sync::CancellationToken;

/// Config file used when neither `--config` nor `HEDGE_CONFIG` is given.
const DEFAULT_CONFIG: &str = "config.yaml";

#[derive(Parser)]
#[command(name = "hedge-engine")]
#[command(about = "Delta hedging risk engine and backtester", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, env = "HEDGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest and print its report
    Backtest {
        /// JSON-lines tick file
        ticks: PathBuf,
        /// Event log output, overrides `backtest.event_log_path`
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Run the delta threshold / hedge ratio grid in parallel
    Sweep {
        /// JSON-lines tick file
        ticks: PathBuf,
    },
    /// Feed ticks through the live pipeline against the simulated backend
    Paper {
        /// JSON-lines tick file
        ticks: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    let config = read_config(cli.config.as_deref())?;

    init_tracing(&config.observability.logging).context("failed to initialize tracing")?;
    if let Some(addr) = &config.observability.metrics_addr {
        let metrics = MetricsConfig::parse(addr)?;
        init_metrics(&metrics)?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    match cli.command {
        Commands::Backtest { ticks, events } => backtest(config, &ticks, events),
        Commands::Sweep { ticks } => sweep(&config, &ticks),
        Commands::Paper { ticks } => paper(config, &ticks).await,
    }
}

fn read_config(path: Option<&Path>) -> Result<EngineConfig> {
    let path = match path {
        Some(path) => path.to_string_lossy().into_owned(),
        None if Path::new(DEFAULT_CONFIG).exists() => DEFAULT_CONFIG.to_string(),
        None => return Ok(EngineConfig::default()),
    };
    load_config(Some(&path)).with_context(|| format!("failed to load config from {path}"))
}

fn backtest(config: EngineConfig, ticks: &Path, events: Option<PathBuf>) -> Result<()> {
    let events = events.or_else(|| config.backtest.event_log_path.clone().map(PathBuf::from));
    let engine = BacktestEngine::new(config)?;
    let mut source = JsonLinesTickSource::open(ticks)?;
    let outcome = engine.run(&mut source)?;

    if let Some(path) = events {
        outcome
            .events
            .write_jsonl(&path)
            .with_context(|| format!("failed to write event log to {}", path.display()))?;
        tracing::info!(path = %path.display(), events = outcome.events.len(), "Event log written");
    }
    println!("{}", outcome.report);
    Ok(())
}

fn sweep(config: &EngineConfig, ticks: &Path) -> Result<()> {
    let ticks = JsonLinesTickSource::open(ticks)?.read_all()?;
    let results = run_sweep(config, &ticks)?;

    println!(
        "{:>10} {:>8} {:>12} {:>12} {:>10} {:>8} {:>12}",
        "threshold", "ratio", "return", "drawdown", "sharpe", "trades", "mean |dev|"
    );
    for r in results {
        let sharpe = r.sharpe_ratio.map_or_else(|| "-".to_string(), |s| s.to_string());
        println!(
            "{:>10} {:>8} {:>12} {:>12} {:>10} {:>8} {:>12}",
            r.delta_threshold.to_string(),
            r.hedge_ratio.to_string(),
            r.total_return.to_string(),
            r.max_drawdown.to_string(),
            sharpe,
            r.hedge_trades,
            r.mean_abs_deviation.round_dp(6).to_string(),
        );
    }
    Ok(())
}

async fn paper(config: EngineConfig, path: &Path) -> Result<()> {
    let ticks = JsonLinesTickSource::open(path)?.read_all()?;
    let Some(first) = ticks.first() else {
        anyhow::bail!("tick file {} is empty", path.display());
    };
    let backtest = &config.backtest;
    let portfolio = Portfolio::with_spot(
        &backtest.underlying,
        backtest.initial_cash - backtest.spot_quantity * first.price,
        backtest.spot_quantity,
        first.price,
    );
    let backend = SimulatedBackend::new(ExecutionSimulator::new(config.execution.clone()));
    let cell = Arc::new(ConfigCell::new(config));
    let shutdown = CancellationToken::new();
    // recorded ticks are aged against a wall clock starting at the first one
    let clock = Arc::new(SystemClock::anchored_at(first.timestamp));
    let handle = HedgePipeline::new(cell, portfolio, Arc::new(backend))
        .with_clock(clock)
        .spawn(shutdown.clone());

    let mut notifications = handle.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            if let Ok(line) = serde_json::to_string(&notification) {
                println!("{line}");
            }
        }
    });

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            ctrl_c.cancel();
        }
    });

    for tick in ticks {
        if shutdown.is_cancelled() {
            break;
        }
        handle.send_tick(tick).await?;
    }
    let portfolio = handle.shutdown().await?;
    printer.await?;

    println!("{}", serde_json::to_string_pretty(&portfolio.view())?);
    Ok(())
}

/// Load `.env` from the working directory or the nearest ancestor.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}
