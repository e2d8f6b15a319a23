//! Configuration loader: merges .env, config.toml, env vars and CLI flags.

use std::path::{Path, PathBuf};

use common::{EngineConfig, Error, RoutePreference};
use serde::{Deserialize, Serialize};

// ── Scanner config types ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub universe: UniverseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Tickers evaluated at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-ticker snapshot fetch timeout.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Directory holding `<SYMBOL>.json` snapshots.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Snapshots older than this are unavailable. 0 disables the check.
    #[serde(default)]
    pub max_snapshot_age_secs: u64,

    /// Append scan events to the JSONL journal.
    #[serde(default = "default_true")]
    pub journal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_concurrency() -> usize {
    8
}
fn default_fetch_timeout_ms() -> u64 {
    5_000
}
fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshots")
}
fn default_true() -> bool {
    true
}
fn default_tickers() -> Vec<String> {
    ["SPY", "QQQ", "IWM"].iter().map(|s| s.to_string()).collect()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            snapshot_dir: default_snapshot_dir(),
            max_snapshot_age_secs: 0,
            journal: true,
        }
    }
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            tickers: default_tickers(),
        }
    }
}

// ── Parsing helpers ───────────────────────────────────────────────────

fn parse_percent_threshold(raw: &str, env_name: &str) -> Result<f64, Error> {
    let parsed = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{env_name} must be a number in [0, 100]")))?;
    if !(0.0..=100.0).contains(&parsed) {
        return Err(Error::Config(format!("{env_name} must be a number in [0, 100]")));
    }
    Ok(parsed)
}

// ── Config loader ─────────────────────────────────────────────────────

/// Load configuration from `.env`, the config file and `TG_*` overrides.
///
/// An explicit `path` must exist; without one, `config.toml` in the working
/// directory is read when present.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Error> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => {
            let default_path = Path::new("config.toml");
            if default_path.exists() {
                read_config_file(default_path)?
            } else {
                AppConfig::default()
            }
        }
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<AppConfig, Error> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Apply `TG_*` overrides. Blank values are ignored.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(raw) = var("TG_MIN_SCORE") {
        config.engine.min_score = parse_percent_threshold(&raw, "TG_MIN_SCORE")?;
    }
    if let Some(raw) = var("TG_MAX_RISK") {
        config.engine.max_risk = parse_percent_threshold(&raw, "TG_MAX_RISK")?;
    }
    if let Some(raw) = var("TG_STRATEGY") {
        config.engine.strategy = raw.parse::<RoutePreference>()?;
    }
    if let Some(raw) = var("TG_SNAPSHOT_DIR") {
        config.scan.snapshot_dir = PathBuf::from(raw.trim());
    }
    Ok(())
}

pub fn validate_config(config: &AppConfig) -> Result<(), Error> {
    config.engine.validate()?;

    let mut issues: Vec<String> = Vec::new();
    if config.scan.concurrency == 0 {
        issues.push("scan.concurrency must be > 0".into());
    }
    if config.scan.fetch_timeout_ms == 0 {
        issues.push("scan.fetch_timeout_ms must be > 0".into());
    }
    if config.universe.tickers.is_empty() {
        issues.push("universe.tickers must contain at least one ticker".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid configuration: {}",
            issues.join("; ")
        )))
    }
}

/// Default `config.toml` contents.
pub fn default_template() -> Result<String, Error> {
    let body = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| Error::Config(format!("Failed to render default config: {}", e)))?;
    Ok(format!(
        "# trade-guardian configuration\n# TG_MIN_SCORE, TG_MAX_RISK, TG_STRATEGY and TG_SNAPSHOT_DIR override these values.\n\n{}",
        body
    ))
}
