use std::sync::Arc;

use candidate_engine::{classify_shape, compute_risk, compute_score, normalize, ShapeInputs};
use common::{EngineConfig, MarketSnapshot, Result, Tag};
use tracing::{debug, info};

use crate::blueprint::{BlueprintBuilder, BlueprintRequest, ChainBlueprintBuilder};
use crate::gate::{evaluate_gate, GateInput};
use crate::probe::{needs_probe, probe_alternates};
use crate::ranker::assign_tag;
use crate::router::route_candidate;
use crate::types::{Candidate, TickerResult};

/// Per-ticker pipeline: normalize → shape → score → risk → route → gate,
/// then probe and tag. Holds no mutable state; clones share config and
/// builder.
#[derive(Clone)]
pub struct DecisionEngine {
    config: Arc<EngineConfig>,
    builder: Arc<dyn BlueprintBuilder>,
}

impl DecisionEngine {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self::with_builder(config, Arc::new(ChainBlueprintBuilder))
    }

    pub fn with_builder(config: Arc<EngineConfig>, builder: Arc<dyn BlueprintBuilder>) -> Self {
        Self { config, builder }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate the short expiry at 1-based `rank`.
    pub fn evaluate(&self, snapshot: &MarketSnapshot, rank: usize) -> Result<Candidate> {
        let config = self.config.as_ref();

        let metrics = normalize(snapshot, rank, config)?;
        let shape = classify_shape(&ShapeInputs::from(&metrics))?;
        let score = compute_score(&metrics, shape, config)?;
        let risk = compute_risk(&metrics, shape, config)?;

        let request = BlueprintRequest {
            snapshot,
            short_expiry: metrics.short_expiry,
            short_dte: metrics.short_dte,
            config,
        };
        let routing = route_candidate(shape, config.strategy, self.builder.as_ref(), &request)?;

        let gate = evaluate_gate(
            &GateInput {
                route: routing.route,
                shape,
                em: metrics.em,
                ek: metrics.ek,
                est_gamma: metrics.est_gamma,
                momentum: metrics.momentum,
                short_dte: metrics.short_dte,
                blueprint_ok: routing.blueprint.is_viable(),
            },
            config,
        )?;

        debug!(
            "{} rank={} shape={} route={} score={:.1} risk={:.1} gate={} by {}",
            snapshot.symbol,
            rank,
            shape,
            routing.route,
            score.total(),
            risk.total(),
            gate.decision,
            gate.decided_by
        );

        Ok(Candidate {
            symbol: snapshot.symbol.clone(),
            metrics,
            shape,
            route: routing.route,
            route_attempts: routing.attempts,
            fallback_used: routing.fallback_used,
            score,
            risk,
            blueprint: routing.blueprint,
            gate,
            probed_from: None,
        })
    }

    /// Default candidate, probe rescue when warranted, and tag.
    pub fn evaluate_ticker(&self, snapshot: &MarketSnapshot) -> Result<TickerResult> {
        let config = self.config.as_ref();
        let default = self.evaluate(snapshot, config.probe.base_rank)?;

        let (probe, adjusted) = if needs_probe(&default, config) {
            let (report, rescued) = probe_alternates(self, snapshot, &default)?;
            (Some(report), rescued)
        } else {
            (None, None)
        };

        let (tag, mut reason) = assign_tag(&default, adjusted.as_ref(), config);
        if tag == Tag::Watchlist {
            if let Some(note) = probe.as_ref().and_then(|p| p.note.as_ref()) {
                reason = Some(match reason {
                    Some(r) => format!("{}; {}", r, note),
                    None => note.clone(),
                });
            }
        }

        let effective = adjusted.as_ref().unwrap_or(&default);
        info!(
            "{} {} shape={} route={} score={:.1} risk={:.1} gate={}",
            snapshot.symbol,
            tag,
            effective.shape,
            effective.route,
            effective.score_total(),
            effective.risk_total(),
            effective.decision()
        );

        Ok(TickerResult {
            symbol: snapshot.symbol.clone(),
            tag,
            default: Some(default),
            adjusted,
            probe,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::Blueprint;
    use common::testing::{contango_snapshot, SnapshotBuilder};
    use common::{Error, GateDecision, Momentum, Route, RoutePreference, Shape};

    fn engine() -> DecisionEngine {
        DecisionEngine::new(Arc::new(EngineConfig::default()))
    }

    fn assert_traceable(c: &Candidate) {
        for b in [&c.score, &c.risk] {
            assert!((0.0..=100.0).contains(&b.total()));
            assert!((b.raw_sum() - b.total()).abs() <= 0.5);
        }
    }

    #[test]
    fn test_contango_ffbs_diagonal_limit_strict() {
        let result = engine().evaluate_ticker(&contango_snapshot("IWM")).unwrap();
        let c = result.default.as_ref().unwrap();
        assert_eq!(c.shape, Shape::Ffbs);
        assert_eq!(c.route, Route::Diagonal);
        assert_eq!(c.decision(), GateDecision::Limit);
        assert_eq!(result.tag, Tag::Strict);
        assert!(result.probe.is_none());
        assert!(c.long_expiry().is_some());
        assert_traceable(c);
    }

    #[test]
    fn test_trend_momentum_executes() {
        let snap = SnapshotBuilder::new("IWM", 200.0)
            .term(5, 0.20)
            .term(9, 0.205)
            .term(37, 0.25)
            .momentum(None)
            .hv(0.20, 40.0)
            .short_hv(0.25)
            .with_chain(6)
            .build();
        let c = engine().evaluate(&snap, 1).unwrap();
        assert_eq!(c.metrics.momentum, Momentum::Trend);
        assert_eq!(c.decision(), GateDecision::Exec);
    }

    #[test]
    fn test_backwardation_routes_long_gamma() {
        let snap = SnapshotBuilder::new("NVDA", 120.0)
            .term(5, 0.60)
            .term(9, 0.58)
            .term(37, 0.45)
            .with_chain(6)
            .build();
        let engine = DecisionEngine::new(Arc::new(EngineConfig {
            strategy: RoutePreference::Diagonal,
            ..EngineConfig::default()
        }));
        let c = engine.evaluate(&snap, 1).unwrap();
        assert_eq!(c.shape, Shape::Backward);
        assert_eq!(c.route, Route::LongGamma);
        assert_traceable(&c);
    }

    #[test]
    fn test_missing_chain_forbids() {
        let snap = SnapshotBuilder::new("IWM", 200.0)
            .term(5, 0.20)
            .term(37, 0.25)
            .build();
        let result = engine().evaluate_ticker(&snap).unwrap();
        let c = result.default.as_ref().unwrap();
        assert!(c.fallback_used);
        assert_eq!(c.decision(), GateDecision::Forbid);
        assert_eq!(result.tag, Tag::Rejected);
    }

    #[test]
    fn test_auto_adjusted_through_probe() {
        let snap = SnapshotBuilder::new("IWM", 200.0)
            .term(3, 0.20)
            .gamma(3, 0.16)
            .term(8, 0.205)
            .term(12, 0.21)
            .term(37, 0.25)
            .with_chain(6)
            .build();
        let result = engine().evaluate_ticker(&snap).unwrap();
        assert_eq!(result.tag, Tag::AutoAdjusted);
        let adjusted = result.adjusted.as_ref().unwrap();
        assert_eq!(adjusted.short_rank(), 2);
        assert_eq!(result.effective().unwrap().short_rank(), 2);
        assert_eq!(result.default.as_ref().unwrap().short_rank(), 1);
    }

    #[test]
    fn test_watchlist_surfaces_probe_note() {
        let snap = SnapshotBuilder::new("IWM", 200.0)
            .term(3, 0.20)
            .term(37, 0.25)
            .gamma(3, 0.148)
            .with_chain(6)
            .build();
        let result = engine().evaluate_ticker(&snap).unwrap();
        assert_eq!(result.tag, Tag::Watchlist);
        let reason = result.reason.unwrap();
        assert!(reason.contains("after probing"));
        assert!(reason.contains("no alternate"));
    }

    #[test]
    fn test_low_score_alternate_never_becomes_effective() {
        let snap = SnapshotBuilder::new("IWM", 200.0)
            .term(3, 0.20)
            .gamma(3, 0.16)
            .term(8, 0.25)
            .term(37, 0.25)
            .with_chain(6)
            .build();
        let result = engine().evaluate_ticker(&snap).unwrap();
        assert!(result.adjusted.is_none());
        assert_ne!(result.tag, Tag::AutoAdjusted);
        assert_eq!(result.effective().unwrap().short_rank(), 1);
    }

    #[test]
    fn test_unavailable_data_propagates() {
        let snap = SnapshotBuilder::new("IWM", 200.0).term(40, 0.25).build();
        let err = engine().evaluate_ticker(&snap).unwrap_err();
        assert!(matches!(err, Error::DataUnavailable { .. }));
    }

    #[test]
    fn test_custom_builder_is_used() {
        struct Rejecting;
        impl BlueprintBuilder for Rejecting {
            fn build(&self, route: Route, _request: &BlueprintRequest<'_>) -> Result<Blueprint> {
                Ok(Blueprint::failed(route, "no liquidity"))
            }
        }
        let engine = DecisionEngine::with_builder(Arc::new(EngineConfig::default()), Arc::new(Rejecting));
        let c = engine.evaluate(&contango_snapshot("IWM"), 1).unwrap();
        assert_eq!(c.route_attempts.len(), 2);
        assert_eq!(c.decision(), GateDecision::Forbid);
    }
}
