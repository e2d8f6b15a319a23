use candidate_engine::NormalizedMetrics;
use chrono::NaiveDate;
use common::{Breakdown, GateDecision, Route, Shape, Tag};
use serde::{Deserialize, Serialize};

use crate::blueprint::Blueprint;
use crate::gate::GateVerdict;
use crate::probe::ProbeReport;
use crate::router::RouteAttempt;

/// Back-reference from a probe-derived candidate to the one it rescues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeLink {
    pub symbol: String,
    pub default_rank: usize,
    pub default_expiry: NaiveDate,
}

/// One fully evaluated (ticker, short expiry) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    pub metrics: NormalizedMetrics,
    pub shape: Shape,
    pub route: Route,
    pub route_attempts: Vec<RouteAttempt>,
    pub fallback_used: bool,
    pub score: Breakdown,
    pub risk: Breakdown,
    pub blueprint: Blueprint,
    pub gate: GateVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probed_from: Option<ProbeLink>,
}

impl Candidate {
    pub fn score_total(&self) -> f64 {
        self.score.total()
    }

    pub fn risk_total(&self) -> f64 {
        self.risk.total()
    }

    pub fn decision(&self) -> GateDecision {
        self.gate.decision
    }

    pub fn short_rank(&self) -> usize {
        self.metrics.short_rank
    }

    pub fn short_expiry(&self) -> NaiveDate {
        self.metrics.short_expiry
    }

    pub fn long_expiry(&self) -> Option<NaiveDate> {
        self.blueprint.long_expiry()
    }

    /// Ranking metric: score less weighted risk.
    pub fn rank_metric(&self, risk_weight: f64) -> f64 {
        self.score_total() - risk_weight * self.risk_total()
    }

    pub fn abs_edge(&self) -> f64 {
        self.metrics.abs_edge()
    }
}

/// Per-ticker outcome of a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerResult {
    pub symbol: String,
    pub tag: Tag,
    /// Candidate at the default short expiry; absent when data was unavailable.
    pub default: Option<Candidate>,
    /// Probe-rescued alternate, kept separate from `default`.
    pub adjusted: Option<Candidate>,
    pub probe: Option<ProbeReport>,
    pub reason: Option<String>,
}

impl TickerResult {
    pub fn unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            tag: Tag::Rejected,
            default: None,
            adjusted: None,
            probe: None,
            reason: Some(reason.into()),
        }
    }

    /// The candidate whose gate and metrics drive tagging and ordering.
    pub fn effective(&self) -> Option<&Candidate> {
        self.adjusted.as_ref().or(self.default.as_ref())
    }
}
