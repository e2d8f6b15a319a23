use common::{Breakdown, Curvature, EngineConfig, Result, Shape};

use crate::types::NormalizedMetrics;

const BASE_SCORE: f64 = 50.0;

const EDGE_EK_WEIGHT: f64 = 80.0;
const EDGE_EM_WEIGHT: f64 = 40.0;
const EDGE_FLOOR: f64 = -20.0;
const EDGE_CAP: f64 = 30.0;

const HIGH_ABSOLUTE_IV: f64 = 0.60;
const RICH_RATIO: f64 = 1.2;
const FAIR_RATIO: f64 = 1.0;
const LOW_HV_RANK: f64 = 50.0;
const HIGH_HV_RANK: f64 = 80.0;

const CURVATURE_MAX_PENALTY: f64 = 10.0;
const CURVATURE_SPAN: f64 = 0.40;

fn regime_adjustment(shape: Shape) -> f64 {
    match shape {
        Shape::Backward => -15.0,
        Shape::Ffbs => 12.0,
        Shape::Spike => -8.0,
        Shape::Steep => 10.0,
        Shape::Mild => 4.0,
        Shape::Flat => -6.0,
    }
}

fn edge_adjustment(m: &NormalizedMetrics) -> f64 {
    (EDGE_EK_WEIGHT * m.ek + EDGE_EM_WEIGHT * m.em).clamp(EDGE_FLOOR, EDGE_CAP)
}

/// Bonus when IV is rich against realized vol and HV sits low in its
/// range; penalty when IV is high outright but not against HV.
fn hv_context_adjustment(m: &NormalizedMetrics) -> f64 {
    match m.iv_hv_ratio {
        Some(ratio) if m.short_iv >= HIGH_ABSOLUTE_IV && ratio < FAIR_RATIO => -10.0,
        Some(ratio) if ratio >= RICH_RATIO && m.hv_rank <= LOW_HV_RANK => 10.0,
        Some(ratio) if ratio >= FAIR_RATIO && m.hv_rank <= LOW_HV_RANK => 4.0,
        _ if m.hv_rank >= HIGH_HV_RANK => -6.0,
        _ => 0.0,
    }
}

fn curvature_adjustment(m: &NormalizedMetrics, config: &EngineConfig) -> f64 {
    if m.curvature != Curvature::SpikyFront || m.front_slope <= config.curvature_penalty_threshold {
        return 0.0;
    }
    let excess = (m.front_slope - config.curvature_penalty_threshold) / CURVATURE_SPAN;
    -CURVATURE_MAX_PENALTY * excess.clamp(0.0, 1.0)
}

/// Opportunity score in `[0, 100]` with its labelled components.
pub fn compute_score(m: &NormalizedMetrics, shape: Shape, config: &EngineConfig) -> Result<Breakdown> {
    let mut breakdown = Breakdown::new();
    breakdown.push("base", BASE_SCORE);
    breakdown.push("regime", regime_adjustment(shape));
    breakdown.push("edge", edge_adjustment(m));
    breakdown.push("hv_context", hv_context_adjustment(m));
    breakdown.push("curvature", curvature_adjustment(m, config));
    breakdown.finalize(0.0, 100.0)
}
