//! Three-tier gate (hard kill → structural → momentum) plus the SPIKE
//! diagonal override patch, which only ever narrows the decision.

use common::{EngineConfig, Error, GateDecision, Momentum, Result, Route, Shape};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateRule {
    T1Blueprint,
    T1Gamma,
    T1Crush,
    T2LongGammaEdge,
    T2DiagonalMonthWaiver,
    T2DiagonalDualEdge,
    T3MomentumActive,
    T3MomentumQuiet,
    PatchSpikeDiagonal,
}

impl GateRule {
    pub fn as_str(self) -> &'static str {
        match self {
            GateRule::T1Blueprint => "T1_BLUEPRINT",
            GateRule::T1Gamma => "T1_GAMMA",
            GateRule::T1Crush => "T1_CRUSH",
            GateRule::T2LongGammaEdge => "T2_LONG_GAMMA_EDGE",
            GateRule::T2DiagonalMonthWaiver => "T2_DIAGONAL_MONTH_WAIVER",
            GateRule::T2DiagonalDualEdge => "T2_DIAGONAL_DUAL_EDGE",
            GateRule::T3MomentumActive => "T3_MOMENTUM_ACTIVE",
            GateRule::T3MomentumQuiet => "T3_MOMENTUM_QUIET",
            GateRule::PatchSpikeDiagonal => "PATCH_SPIKE_DIAGONAL",
        }
    }
}

impl std::fmt::Display for GateRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the gate reads about a candidate.
#[derive(Debug, Clone, Copy)]
pub struct GateInput {
    pub route: Route,
    pub shape: Shape,
    pub em: f64,
    pub ek: f64,
    pub est_gamma: f64,
    pub momentum: Momentum,
    pub short_dte: i64,
    pub blueprint_ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub decision: GateDecision,
    pub decided_by: GateRule,
    /// Rules in evaluation order, including the deciding one.
    pub checked: Vec<GateRule>,
    /// Tier-3 decision before the override patch, when the patch changed it.
    pub patched_from: Option<GateDecision>,
}

enum TierOutcome {
    Decided(GateDecision, GateRule),
    Continue,
}

type Tier = fn(&GateInput, &EngineConfig, &mut Vec<GateRule>) -> TierOutcome;

fn hard_kill(input: &GateInput, config: &EngineConfig, checked: &mut Vec<GateRule>) -> TierOutcome {
    checked.push(GateRule::T1Blueprint);
    if !input.blueprint_ok {
        return TierOutcome::Decided(GateDecision::Forbid, GateRule::T1Blueprint);
    }
    checked.push(GateRule::T1Gamma);
    if input.est_gamma.is_nan() || input.est_gamma >= config.hard_kill_gamma {
        return TierOutcome::Decided(GateDecision::Forbid, GateRule::T1Gamma);
    }
    checked.push(GateRule::T1Crush);
    if input.momentum == Momentum::Crush {
        return TierOutcome::Decided(GateDecision::Forbid, GateRule::T1Crush);
    }
    TierOutcome::Continue
}

fn structural(input: &GateInput, config: &EngineConfig, checked: &mut Vec<GateRule>) -> TierOutcome {
    let (rule, passes) = match (input.route, input.shape) {
        (Route::LongGamma, _) => (
            GateRule::T2LongGammaEdge,
            input.em >= config.micro_min || input.ek >= config.month_min,
        ),
        (Route::Diagonal, Shape::Ffbs | Shape::Steep) => {
            (GateRule::T2DiagonalMonthWaiver, input.ek >= config.month_min)
        }
        (Route::Diagonal, _) => (
            GateRule::T2DiagonalDualEdge,
            input.ek >= config.month_min && input.em >= config.micro_min,
        ),
    };
    checked.push(rule);
    if passes {
        TierOutcome::Continue
    } else {
        TierOutcome::Decided(GateDecision::Wait, rule)
    }
}

fn momentum(input: &GateInput, checked: &mut Vec<GateRule>) -> Result<(GateDecision, GateRule)> {
    let outcome = match input.momentum {
        Momentum::Trend | Momentum::Pulse => (GateDecision::Exec, GateRule::T3MomentumActive),
        Momentum::Quiet => (GateDecision::Limit, GateRule::T3MomentumQuiet),
        Momentum::Crush => {
            return Err(Error::InvariantViolation(
                "CRUSH momentum reached the momentum tier past the hard kill".into(),
            ))
        }
    };
    checked.push(outcome.1);
    Ok(outcome)
}

/// Whether the SPIKE diagonal hold applies. Narrows to WAIT, never widens.
fn override_patch(input: &GateInput, config: &EngineConfig) -> bool {
    input.route == Route::Diagonal
        && input.shape == Shape::Spike
        && input.short_dte <= config.override_max_dte
        && input.momentum == Momentum::Quiet
}

pub fn evaluate_gate(input: &GateInput, config: &EngineConfig) -> Result<GateVerdict> {
    let mut checked = Vec::with_capacity(6);

    let tiers: [Tier; 2] = [hard_kill, structural];
    for tier in tiers {
        if let TierOutcome::Decided(decision, rule) = tier(input, config, &mut checked) {
            return Ok(GateVerdict {
                decision,
                decided_by: rule,
                checked,
                patched_from: None,
            });
        }
    }

    let (decision, rule) = momentum(input, &mut checked)?;

    checked.push(GateRule::PatchSpikeDiagonal);
    if override_patch(input, config) {
        let narrowed = decision.min(GateDecision::Wait);
        return Ok(GateVerdict {
            decision: narrowed,
            decided_by: GateRule::PatchSpikeDiagonal,
            checked,
            patched_from: (narrowed != decision).then_some(decision),
        });
    }

    Ok(GateVerdict {
        decision,
        decided_by: rule,
        checked,
        patched_from: None,
    })
}
