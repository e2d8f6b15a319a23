//! Tagging and deterministic ordering of scan results.

use std::cmp::Ordering;

use common::{EngineConfig, GateDecision, Tag};

use crate::types::{Candidate, TickerResult};

/// Tag a ticker from its default candidate and optional probe rescue.
pub fn assign_tag(
    default: &Candidate,
    adjusted: Option<&Candidate>,
    config: &EngineConfig,
) -> (Tag, Option<String>) {
    if default.score_total() < config.min_score {
        return (
            Tag::Rejected,
            Some(format!(
                "score {:.1} below min {:.0}",
                default.score_total(),
                config.min_score
            )),
        );
    }

    let effective = adjusted.unwrap_or(default);
    if effective.decision() == GateDecision::Forbid {
        return (
            Tag::Rejected,
            Some(format!("gate FORBID by {}", effective.gate.decided_by)),
        );
    }

    if default.risk_total() <= config.max_risk {
        return (Tag::Strict, None);
    }

    match adjusted {
        Some(alt) => (
            Tag::AutoAdjusted,
            Some(format!(
                "default risk {:.1} above max {:.0}; rank {} ({}) at risk {:.1}",
                default.risk_total(),
                config.max_risk,
                alt.short_rank(),
                alt.short_expiry(),
                alt.risk_total()
            )),
        ),
        None => (
            Tag::Watchlist,
            Some(format!(
                "risk {:.1} above max {:.0} after probing",
                default.risk_total(),
                config.max_risk
            )),
        ),
    }
}

fn compare_candidates(a: &Candidate, b: &Candidate, risk_weight: f64) -> Ordering {
    b.decision()
        .rank()
        .cmp(&a.decision().rank())
        .then_with(|| b.rank_metric(risk_weight).total_cmp(&a.rank_metric(risk_weight)))
        .then_with(|| b.abs_edge().total_cmp(&a.abs_edge()))
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Gate rank, then `score - weight * risk`, then absolute edge (all
/// descending), then symbol. Tickers without a candidate sort last.
pub fn compare_results(a: &TickerResult, b: &TickerResult, risk_weight: f64) -> Ordering {
    match (a.effective(), b.effective()) {
        (Some(ca), Some(cb)) => compare_candidates(ca, cb, risk_weight),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.symbol.cmp(&b.symbol),
    }
}

pub fn rank_results(results: &mut [TickerResult], risk_weight: f64) {
    results.sort_by(|a, b| compare_results(a, b, risk_weight));
}
