use common::{Breakdown, EngineConfig, Result, Shape};

use crate::types::NormalizedMetrics;

/// Exposure constant for a defined-debit options structure.
const BASE_RISK: f64 = 30.0;

const DTE_SCALE: f64 = 26.0;
const DTE_HALF_LIFE: f64 = 6.5;
const DTE_EXPONENT: f64 = 1.25;
const DTE_CAP: f64 = 30.0;

const GAMMA_SCALE: f64 = 22.0;
const GAMMA_EXPONENT: f64 = 0.75;
const GAMMA_CAP: f64 = 25.0;

const CURVATURE_SCALE: f64 = 12.0;
const CURVATURE_SPAN: f64 = 0.40;

/// Continuous in DTE and strictly increasing as expiry approaches.
pub fn dte_risk(dte: i64) -> f64 {
    let d = dte.max(0) as f64;
    (DTE_SCALE / (1.0 + (d / DTE_HALF_LIFE).powf(DTE_EXPONENT))).min(DTE_CAP)
}

fn gamma_risk(est_gamma: f64, hard_kill_gamma: f64) -> f64 {
    let normalized = (est_gamma / hard_kill_gamma).clamp(0.0, 2.0);
    (GAMMA_SCALE * normalized.powf(GAMMA_EXPONENT)).min(GAMMA_CAP)
}

/// Non-zero only under squeeze or SPIKE; curvature by itself adds nothing.
fn curvature_risk(m: &NormalizedMetrics, shape: Shape) -> f64 {
    if !(m.squeeze || shape == Shape::Spike) {
        return 0.0;
    }
    let inversion = if m.month_iv > 0.0 {
        m.micro_iv / m.month_iv - 1.0
    } else {
        0.0
    };
    let severity = inversion.max(m.em).max(0.0);
    CURVATURE_SCALE * (severity / CURVATURE_SPAN).clamp(0.0, 1.0)
}

fn regime_risk(shape: Shape) -> f64 {
    match shape {
        Shape::Backward => 10.0,
        Shape::Spike => 6.0,
        _ => 0.0,
    }
}

/// Risk score in `[0, 100]` with its labelled components.
pub fn compute_risk(m: &NormalizedMetrics, shape: Shape, config: &EngineConfig) -> Result<Breakdown> {
    let mut breakdown = Breakdown::new();
    breakdown.push("base", BASE_RISK);
    breakdown.push("dte", dte_risk(m.short_dte));
    breakdown.push("gamma", gamma_risk(m.est_gamma, config.hard_kill_gamma));
    breakdown.push("curvature", curvature_risk(m, shape));
    breakdown.push("regime", regime_risk(shape));
    breakdown.push("reserved", 0.0);
    breakdown.finalize(0.0, 100.0)
}
