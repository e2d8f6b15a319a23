//! Trade Guardian entry point.
//!
//! `scan` evaluates a ticker universe from on-disk snapshots and prints one
//! ranked JSON result per line; `init-config` writes a default config file.

mod config;
mod journal;
mod scan;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use common::RoutePreference;
use decision_engine::DecisionEngine;
use market_data::{parse_tickers, FileSnapshotProvider};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{default_template, load_config, validate_config, AppConfig};
use crate::journal::{resolve_scans_dir, ScanJournal};
use crate::scan::run_scan;

#[derive(Parser)]
#[command(name = "trade-guardian", version, about = "Options term-structure scanner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate the ticker universe and print ranked results.
    Scan(ScanArgs),
    /// Write a default config file.
    InitConfig {
        #[arg(long, default_value = "config.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct ScanArgs {
    #[arg(long)]
    config: Option<PathBuf>,

    /// Snapshot directory, overriding `scan.snapshot_dir`.
    #[arg(long)]
    snapshots: Option<PathBuf>,

    /// Comma separated tickers, or a path to a ticker file.
    #[arg(long)]
    tickers: Option<String>,

    #[arg(long)]
    min_score: Option<f64>,

    #[arg(long)]
    max_risk: Option<f64>,

    /// auto, long_gamma or diagonal.
    #[arg(long)]
    strategy: Option<RoutePreference>,

    #[arg(long)]
    no_journal: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "trade_guardian=info,decision_engine=info,candidate_engine=info,market_data=info"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Scan(args) => scan_command(args).await,
        Command::InitConfig { path, force } => init_config(&path, force),
    }
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let template = default_template()?;
    std::fs::write(path, template).with_context(|| format!("writing {}", path.display()))?;
    info!("Wrote default config to {}", path.display());
    Ok(())
}

fn resolve_tickers(arg: Option<&str>, config: &AppConfig) -> anyhow::Result<Vec<String>> {
    let raw = match arg {
        Some(value) if Path::new(value).is_file() => std::fs::read_to_string(value)
            .with_context(|| format!("reading ticker file {}", value))?,
        Some(value) => value.to_string(),
        None => config.universe.tickers.join("\n"),
    };
    Ok(parse_tickers(&raw))
}

fn apply_cli_overrides(config: &mut AppConfig, args: &ScanArgs) -> anyhow::Result<()> {
    if let Some(dir) = &args.snapshots {
        config.scan.snapshot_dir = dir.clone();
    }
    if let Some(min_score) = args.min_score {
        config.engine.min_score = min_score;
    }
    if let Some(max_risk) = args.max_risk {
        config.engine.max_risk = max_risk;
    }
    if let Some(strategy) = args.strategy {
        config.engine.strategy = strategy;
    }
    if args.no_journal {
        config.scan.journal = false;
    }
    config.universe.tickers = resolve_tickers(args.tickers.as_deref(), config)?;
    Ok(())
}

async fn scan_command(args: ScanArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(args.config.as_deref()).context("loading configuration")?;
    apply_cli_overrides(&mut cfg, &args)?;
    validate_config(&cfg).context("validating configuration")?;

    info!(
        "Engine config: min_score={} max_risk={} strategy={:?} probe_offset={}",
        cfg.engine.min_score, cfg.engine.max_risk, cfg.engine.strategy, cfg.engine.probe.max_offset
    );
    if !cfg.scan.snapshot_dir.is_dir() {
        warn!(
            "Snapshot directory {} does not exist; every ticker will be unavailable",
            cfg.scan.snapshot_dir.display()
        );
    }

    let scan_id = Uuid::new_v4();
    let mut journal = if cfg.scan.journal {
        let dir = resolve_scans_dir();
        match ScanJournal::open(dir.clone()) {
            Ok(journal) => {
                info!("Scan journal: {}", dir.display());
                Some(journal)
            }
            Err(e) => {
                warn!("Scan journal disabled: {}", e);
                None
            }
        }
    } else {
        None
    };
    if let Some(journal) = journal.as_mut() {
        let engine_json = serde_json::to_value(&cfg.engine)?;
        journal.scan_start(scan_id, &cfg.universe.tickers, &engine_json);
    }

    let provider = Arc::new(
        FileSnapshotProvider::new(&cfg.scan.snapshot_dir)
            .with_max_age_secs(cfg.scan.max_snapshot_age_secs),
    );
    let engine = DecisionEngine::new(Arc::new(cfg.engine.clone()));
    let report = run_scan(provider, engine, &cfg.universe.tickers, &cfg.scan, scan_id).await;

    for result in &report.results {
        println!("{}", serde_json::to_string(result)?);
        if let Some(journal) = journal.as_mut() {
            journal.ticker_result(scan_id, result);
        }
    }
    if let Some(journal) = journal.as_mut() {
        journal.scan_summary(&report);
    }

    info!("Scan {} tags: {:?}", report.scan_id, report.tag_counts());
    if report.invariant_violations > 0 {
        bail!(
            "{} invariant violation(s) during scan {}",
            report.invariant_violations,
            report.scan_id
        );
    }
    Ok(())
}
