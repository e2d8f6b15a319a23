//! Concurrent scan over a ticker universe.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::Error;
use decision_engine::{rank_results, DecisionEngine, TickerResult};
use market_data::SnapshotProvider;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ScanConfig;

#[derive(Debug)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Ranked best first.
    pub results: Vec<TickerResult>,
    pub unavailable: usize,
    pub invariant_violations: usize,
}

impl ScanReport {
    pub fn tag_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            *counts.entry(result.tag.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

enum Outcome {
    Evaluated,
    Unavailable,
    Violation,
}

async fn scan_ticker<P: SnapshotProvider>(
    provider: &P,
    engine: &DecisionEngine,
    symbol: String,
    fetch_timeout: Duration,
) -> (TickerResult, Outcome) {
    let snapshot = match tokio::time::timeout(fetch_timeout, provider.fetch(&symbol)).await {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => {
            warn!("{} snapshot unavailable: {}", symbol, e);
            let reason = match e {
                Error::DataUnavailable { reason, .. } => reason,
                other => other.to_string(),
            };
            return (TickerResult::unavailable(symbol, reason), Outcome::Unavailable);
        }
        Err(_) => {
            warn!("{} snapshot fetch timed out after {:?}", symbol, fetch_timeout);
            let reason = format!("snapshot fetch timed out after {}ms", fetch_timeout.as_millis());
            return (TickerResult::unavailable(symbol, reason), Outcome::Unavailable);
        }
    };

    match engine.evaluate_ticker(&snapshot) {
        Ok(result) => (result, Outcome::Evaluated),
        Err(Error::DataUnavailable { reason, .. }) => {
            warn!("{} data unavailable: {}", symbol, reason);
            (TickerResult::unavailable(symbol, reason), Outcome::Unavailable)
        }
        Err(e) if e.is_invariant_violation() => {
            error!("{} invariant violation: {}", symbol, e);
            (TickerResult::unavailable(symbol, e.to_string()), Outcome::Violation)
        }
        Err(e) => {
            warn!("{} evaluation failed: {}", symbol, e);
            (TickerResult::unavailable(symbol, e.to_string()), Outcome::Unavailable)
        }
    }
}

/// Evaluate every ticker with at most `scan.concurrency` in flight. One
/// ticker failing never affects the others.
pub async fn run_scan<P: SnapshotProvider>(
    provider: Arc<P>,
    engine: DecisionEngine,
    tickers: &[String],
    scan: &ScanConfig,
    scan_id: Uuid,
) -> ScanReport {
    let started_at = Utc::now();
    let semaphore = Arc::new(Semaphore::new(scan.concurrency.max(1)));
    let fetch_timeout = Duration::from_millis(scan.fetch_timeout_ms);

    info!(
        "Scan {} starting: {} tickers, concurrency {}",
        scan_id,
        tickers.len(),
        scan.concurrency
    );

    let mut tasks = JoinSet::new();
    let mut pending = HashMap::with_capacity(tickers.len());
    for symbol in tickers {
        let provider = provider.clone();
        let engine = engine.clone();
        let semaphore = semaphore.clone();
        let task_symbol = symbol.clone();
        let handle = tasks.spawn(async move {
            let symbol = task_symbol;
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        TickerResult::unavailable(symbol, "scan cancelled"),
                        Outcome::Unavailable,
                    )
                }
            };
            scan_ticker(provider.as_ref(), &engine, symbol, fetch_timeout).await
        });
        pending.insert(handle.id(), symbol.clone());
    }

    let mut results = Vec::with_capacity(tickers.len());
    let mut unavailable = 0;
    let mut invariant_violations = 0;
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, (result, outcome))) => {
                pending.remove(&id);
                match outcome {
                    Outcome::Evaluated => {}
                    Outcome::Unavailable => unavailable += 1,
                    Outcome::Violation => invariant_violations += 1,
                }
                results.push(result);
            }
            Err(e) => {
                let symbol = pending.remove(&e.id()).unwrap_or_default();
                error!("{} scan task failed: {}", symbol, e);
                let reason = if e.is_panic() {
                    "evaluation panicked"
                } else {
                    "evaluation cancelled"
                };
                results.push(TickerResult::unavailable(symbol, reason));
                invariant_violations += 1;
            }
        }
    }

    rank_results(&mut results, engine.config().risk_weight);

    info!(
        "Scan {} finished: {} results, {} unavailable, {} invariant violations",
        scan_id,
        results.len(),
        unavailable,
        invariant_violations
    );

    ScanReport {
        scan_id,
        started_at,
        results,
        unavailable,
        invariant_violations,
    }
}
