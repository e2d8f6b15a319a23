//! Alternate short-expiry search for candidates that score well but
//! carry too much risk at the default expiry.

use chrono::NaiveDate;
use common::{EngineConfig, Error, GateDecision, MarketSnapshot, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::DecisionEngine;
use crate::types::{Candidate, ProbeLink};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeAttempt {
    pub rank: usize,
    pub short_expiry: Option<NaiveDate>,
    pub score: Option<f64>,
    pub risk: Option<f64>,
    pub decision: Option<GateDecision>,
    /// Set when the rank could not be evaluated.
    pub skipped: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub attempts: Vec<ProbeAttempt>,
    pub rescued_rank: Option<usize>,
    /// Informational summary when nothing qualified.
    pub note: Option<String>,
}

pub fn needs_probe(candidate: &Candidate, config: &EngineConfig) -> bool {
    candidate.risk_total() > config.max_risk && candidate.score_total() >= config.min_score
}

/// An alternate qualifies when it clears both the score floor and the risk
/// ceiling.
fn qualifies(candidate: &Candidate, config: &EngineConfig) -> bool {
    candidate.score_total() >= config.min_score && candidate.risk_total() <= config.max_risk
}

/// Walk ranks `base + 1 ..= base + max_offset`, nearest first, and return the
/// first qualifying alternate.
///
/// `original` is only read; a rescued alternate is a new candidate linked
/// back to it through `probed_from`.
pub fn probe_alternates(
    engine: &DecisionEngine,
    snapshot: &MarketSnapshot,
    original: &Candidate,
) -> Result<(ProbeReport, Option<Candidate>)> {
    let config = engine.config();
    let base = original.short_rank();
    let mut attempts = Vec::new();

    for rank in (base + 1)..=(base + config.probe.max_offset) {
        let alternate = match engine.evaluate(snapshot, rank) {
            Ok(candidate) => candidate,
            Err(Error::DataUnavailable { reason, .. }) => {
                debug!("{} probe rank {} skipped: {}", original.symbol, rank, reason);
                attempts.push(ProbeAttempt {
                    rank,
                    short_expiry: None,
                    score: None,
                    risk: None,
                    decision: None,
                    skipped: Some(reason),
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        attempts.push(ProbeAttempt {
            rank,
            short_expiry: Some(alternate.short_expiry()),
            score: Some(alternate.score_total()),
            risk: Some(alternate.risk_total()),
            decision: Some(alternate.decision()),
            skipped: None,
        });

        if qualifies(&alternate, config) {
            info!(
                "{} probe rescued at rank {} ({}): risk {:.1} -> {:.1}",
                original.symbol,
                rank,
                alternate.short_expiry(),
                original.risk_total(),
                alternate.risk_total()
            );
            let rescued = Candidate {
                probed_from: Some(ProbeLink {
                    symbol: original.symbol.clone(),
                    default_rank: base,
                    default_expiry: original.short_expiry(),
                }),
                ..alternate
            };
            return Ok((
                ProbeReport {
                    attempts,
                    rescued_rank: Some(rank),
                    note: None,
                },
                Some(rescued),
            ));
        }
    }

    let note = best_attempt_note(&attempts, base, config);
    Ok((
        ProbeReport {
            attempts,
            rescued_rank: None,
            note: Some(note),
        },
        None,
    ))
}

fn best_attempt_note(attempts: &[ProbeAttempt], base: usize, config: &EngineConfig) -> String {
    let best = attempts
        .iter()
        .filter_map(|a| Some((a, a.risk?, a.score?)))
        .min_by(|(_, a, _), (_, b, _)| a.total_cmp(b));
    match best {
        Some((attempt, risk, score)) => format!(
            "no alternate within ranks {}..={} met max risk {:.0} with min score {:.0}; lowest risk was rank {} at risk {:.1}, score {:.1}",
            base + 1,
            base + config.probe.max_offset,
            config.max_risk,
            config.min_score,
            attempt.rank,
            risk,
            score
        ),
        None => format!(
            "no alternate expiries available within ranks {}..={}",
            base + 1,
            base + config.probe.max_offset
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use common::testing::SnapshotBuilder;

    fn engine() -> DecisionEngine {
        DecisionEngine::new(Arc::new(EngineConfig::default()))
    }

    /// Rank 1 expires in three days with a heavy quoted gamma; rank 2 sits
    /// eight days out.
    fn rescue_snapshot() -> MarketSnapshot {
        SnapshotBuilder::new("IWM", 200.0)
            .term(3, 0.20)
            .gamma(3, 0.16)
            .term(8, 0.205)
            .term(12, 0.21)
            .term(37, 0.25)
            .with_chain(6)
            .build()
    }

    #[test]
    fn test_probe_triggers_only_on_risk_failure_with_good_score() {
        let engine = engine();
        let default = engine.evaluate(&rescue_snapshot(), 1).unwrap();
        assert!(default.risk_total() > 70.0);
        assert!(default.score_total() >= 60.0);
        assert!(needs_probe(&default, engine.config()));
    }

    #[test]
    fn test_probe_rescues_nearest_qualifying_rank() {
        let engine = engine();
        let snap = rescue_snapshot();
        let default = engine.evaluate(&snap, 1).unwrap();
        let (report, rescued) = probe_alternates(&engine, &snap, &default).unwrap();
        let rescued = rescued.unwrap();
        assert_eq!(report.rescued_rank, Some(2));
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(rescued.short_rank(), 2);
        assert!(rescued.risk_total() <= 70.0);
        let link = rescued.probed_from.as_ref().unwrap();
        assert_eq!(link.symbol, "IWM");
        assert_eq!(link.default_rank, 1);
        assert_eq!(link.default_expiry, default.short_expiry());
    }

    #[test]
    fn test_probe_leaves_original_untouched() {
        let engine = engine();
        let snap = rescue_snapshot();
        let default = engine.evaluate(&snap, 1).unwrap();
        let before = (default.score.clone(), default.risk.clone(), default.short_expiry());
        let _ = probe_alternates(&engine, &snap, &default).unwrap();
        assert_eq!(default.score, before.0);
        assert_eq!(default.risk, before.1);
        assert_eq!(default.short_expiry(), before.2);
        assert!(default.probed_from.is_none());
    }

    #[test]
    fn test_ranks_beyond_pool_are_skipped_with_note() {
        let engine = engine();
        let snap = SnapshotBuilder::new("IWM", 200.0)
            .term(3, 0.20)
            .gamma(3, 0.16)
            .term(37, 0.25)
            .with_chain(6)
            .build();
        let default = engine.evaluate(&snap, 1).unwrap();
        let (report, rescued) = probe_alternates(&engine, &snap, &default).unwrap();
        assert!(rescued.is_none());
        assert_eq!(report.attempts.len(), 2);
        assert!(report.attempts.iter().all(|a| a.skipped.is_some()));
        assert!(report.note.unwrap().starts_with("no alternate expiries"));
    }

    #[test]
    fn test_low_score_alternate_is_not_rescued() {
        // Rank 2 prices at month IV: low risk, but a flat curve scores 50.
        let engine = engine();
        let snap = SnapshotBuilder::new("IWM", 200.0)
            .term(3, 0.20)
            .gamma(3, 0.16)
            .term(8, 0.25)
            .term(37, 0.25)
            .with_chain(6)
            .build();
        let default = engine.evaluate(&snap, 1).unwrap();
        assert!(needs_probe(&default, engine.config()));

        let (report, rescued) = probe_alternates(&engine, &snap, &default).unwrap();
        assert!(rescued.is_none());
        assert_eq!(report.rescued_rank, None);
        let rank2 = &report.attempts[0];
        assert_eq!(rank2.rank, 2);
        assert!(rank2.risk.unwrap() <= 70.0);
        assert!(rank2.score.unwrap() < 60.0);
        assert!(report.note.unwrap().contains("min score 60"));
    }

    #[test]
    fn test_nearest_failing_rank_is_passed_over_for_next() {
        // Rank 2 still carries heavy gamma; rank 3 is the first to qualify.
        let engine = engine();
        let snap = SnapshotBuilder::new("IWM", 200.0)
            .term(3, 0.20)
            .gamma(3, 0.16)
            .term(4, 0.20)
            .gamma(4, 0.20)
            .term(8, 0.205)
            .term(37, 0.25)
            .with_chain(6)
            .build();
        let default = engine.evaluate(&snap, 1).unwrap();
        let (report, rescued) = probe_alternates(&engine, &snap, &default).unwrap();

        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.attempts[0].rank, 2);
        assert!(report.attempts[0].risk.unwrap() > 70.0);
        assert_eq!(report.attempts[1].rank, 3);
        assert_eq!(report.rescued_rank, Some(3));
        let rescued = rescued.unwrap();
        assert_eq!(rescued.short_rank(), 3);
        assert_eq!(rescued.metrics.short_dte, 8);
        assert!(rescued.score_total() >= 60.0);
    }
}
