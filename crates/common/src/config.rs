//! Engine thresholds, threaded through every pipeline stage as an
//! immutable value.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Which structure the router prefers before shape routing applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePreference {
    /// Route by shape.
    #[default]
    Auto,
    LongGamma,
    Diagonal,
}

impl std::str::FromStr for RoutePreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(RoutePreference::Auto),
            "long_gamma" | "lg" => Ok(RoutePreference::LongGamma),
            "diagonal" => Ok(RoutePreference::Diagonal),
            other => Err(Error::Config(format!("unknown strategy preference: {}", other))),
        }
    }
}

/// Inclusive DTE range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DteWindow {
    pub min: i64,
    pub max: i64,
}

impl DteWindow {
    pub fn contains(&self, dte: i64) -> bool {
        dte >= self.min && dte <= self.max
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) as f64 / 2.0
    }
}

/// Alternate short-expiry search window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// 1-based rank of the default short expiry.
    #[serde(default = "default_base_rank")]
    pub base_rank: usize,

    /// Number of further ranks to try.
    #[serde(default = "default_max_offset")]
    pub max_offset: usize,
}

/// Long-leg expiry selection for diagonal blueprints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagonalConfig {
    #[serde(default = "default_diag_min_dte")]
    pub min_dte: i64,

    #[serde(default = "default_diag_max_dte")]
    pub max_dte: i64,

    /// Outer bound searched when nothing sits inside `min_dte..=max_dte`.
    #[serde(default = "default_diag_fallback_max_dte")]
    pub fallback_max_dte: i64,

    #[serde(default = "default_diag_target_dte")]
    pub target_dte: i64,

    /// Minimum DTE separation between the short and long legs.
    #[serde(default = "default_diag_min_gap_dte")]
    pub min_gap_dte: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Score floor for actionability.
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    /// Risk ceiling.
    #[serde(default = "default_max_risk")]
    pub max_risk: f64,

    #[serde(default = "default_micro_min")]
    pub micro_min: f64,

    #[serde(default = "default_month_min")]
    pub month_min: f64,

    #[serde(default)]
    pub probe: ProbeConfig,

    /// Micro IV must exceed month IV by this factor to flag a squeeze.
    #[serde(default = "default_squeeze_multiplier")]
    pub squeeze_multiplier: f64,

    /// Estimated gamma at or above this is a hard kill.
    #[serde(default = "default_hard_kill_gamma")]
    pub hard_kill_gamma: f64,

    /// Micro edge is smoothly decayed below this many DTE.
    #[serde(default = "default_short_dte_decay_window")]
    pub short_dte_decay_window: i64,

    /// Denominator floor for edge ratios.
    #[serde(default = "default_iv_floor")]
    pub iv_floor: f64,

    /// Relative IV gap separating contango/backwardation from flat.
    #[serde(default = "default_regime_band")]
    pub regime_band: f64,

    #[serde(default = "default_micro_window")]
    pub micro_window: DteWindow,

    #[serde(default = "default_month_window")]
    pub month_window: DteWindow,

    /// Short expiries are drawn from short_min_dte..=short_max_dte.
    #[serde(default = "default_short_min_dte")]
    pub short_min_dte: i64,

    #[serde(default = "default_short_max_dte")]
    pub short_max_dte: i64,

    /// Front slope above this marks SPIKY_FRONT curvature.
    #[serde(default = "default_curvature_threshold")]
    pub curvature_threshold: f64,

    /// Front slope above this starts the score curvature penalty.
    #[serde(default = "default_curvature_penalty_threshold")]
    pub curvature_penalty_threshold: f64,

    /// SPIKE diagonals at or below this DTE are held on QUIET momentum.
    #[serde(default = "default_override_max_dte")]
    pub override_max_dte: i64,

    /// Weight of risk in the ranking metric `score - weight * risk`.
    #[serde(default = "default_risk_weight")]
    pub risk_weight: f64,

    /// Leg spread/mid above this is noted on the blueprint.
    #[serde(default = "default_max_spread_ratio")]
    pub max_spread_ratio: f64,

    #[serde(default)]
    pub strategy: RoutePreference,

    #[serde(default)]
    pub diagonal: DiagonalConfig,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_base_rank() -> usize {
    1
}
fn default_max_offset() -> usize {
    2
}
fn default_diag_min_dte() -> i64 {
    30
}
fn default_diag_max_dte() -> i64 {
    45
}
fn default_diag_fallback_max_dte() -> i64 {
    90
}
fn default_diag_target_dte() -> i64 {
    38
}
fn default_diag_min_gap_dte() -> i64 {
    20
}
fn default_min_score() -> f64 {
    60.0
}
fn default_max_risk() -> f64 {
    70.0
}
fn default_micro_min() -> f64 {
    0.10
}
fn default_month_min() -> f64 {
    0.15
}
fn default_squeeze_multiplier() -> f64 {
    1.05
}
fn default_hard_kill_gamma() -> f64 {
    0.30
}
fn default_short_dte_decay_window() -> i64 {
    6
}
fn default_iv_floor() -> f64 {
    0.12
}
fn default_regime_band() -> f64 {
    0.03
}
fn default_micro_window() -> DteWindow {
    DteWindow { min: 1, max: 10 }
}
fn default_month_window() -> DteWindow {
    DteWindow { min: 30, max: 45 }
}
fn default_short_min_dte() -> i64 {
    3
}
fn default_short_max_dte() -> i64 {
    15
}
fn default_curvature_threshold() -> f64 {
    0.10
}
fn default_curvature_penalty_threshold() -> f64 {
    0.20
}
fn default_override_max_dte() -> i64 {
    7
}
fn default_risk_weight() -> f64 {
    0.5
}
fn default_max_spread_ratio() -> f64 {
    0.25
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_rank: default_base_rank(),
            max_offset: default_max_offset(),
        }
    }
}

impl Default for DiagonalConfig {
    fn default() -> Self {
        Self {
            min_dte: default_diag_min_dte(),
            max_dte: default_diag_max_dte(),
            fallback_max_dte: default_diag_fallback_max_dte(),
            target_dte: default_diag_target_dte(),
            min_gap_dte: default_diag_min_gap_dte(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_risk: default_max_risk(),
            micro_min: default_micro_min(),
            month_min: default_month_min(),
            probe: ProbeConfig::default(),
            squeeze_multiplier: default_squeeze_multiplier(),
            hard_kill_gamma: default_hard_kill_gamma(),
            short_dte_decay_window: default_short_dte_decay_window(),
            iv_floor: default_iv_floor(),
            regime_band: default_regime_band(),
            micro_window: default_micro_window(),
            month_window: default_month_window(),
            short_min_dte: default_short_min_dte(),
            short_max_dte: default_short_max_dte(),
            curvature_threshold: default_curvature_threshold(),
            curvature_penalty_threshold: default_curvature_penalty_threshold(),
            override_max_dte: default_override_max_dte(),
            risk_weight: default_risk_weight(),
            max_spread_ratio: default_max_spread_ratio(),
            strategy: RoutePreference::Auto,
            diagonal: DiagonalConfig::default(),
        }
    }
}

// ── Validation ────────────────────────────────────────────────────────

/// Upper bound on `probe.max_offset`.
pub const MAX_PROBE_OFFSET: usize = 10;

impl EngineConfig {
    /// Reject threshold combinations the engine cannot evaluate.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("min_score", self.min_score), ("max_risk", self.max_risk)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{} must be within [0, 100], got {}",
                    name, value
                )));
            }
        }

        for (name, value) in [
            ("micro_min", self.micro_min),
            ("month_min", self.month_min),
            ("iv_floor", self.iv_floor),
            ("regime_band", self.regime_band),
            ("curvature_threshold", self.curvature_threshold),
            ("curvature_penalty_threshold", self.curvature_penalty_threshold),
            ("risk_weight", self.risk_weight),
            ("max_spread_ratio", self.max_spread_ratio),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.micro_min > self.month_min {
            return Err(Error::Config(format!(
                "micro_min ({}) must not exceed month_min ({})",
                self.micro_min, self.month_min
            )));
        }
        if self.squeeze_multiplier.is_nan() || self.squeeze_multiplier < 1.0 {
            return Err(Error::Config(format!(
                "squeeze_multiplier must be >= 1.0, got {}",
                self.squeeze_multiplier
            )));
        }
        if self.hard_kill_gamma.is_nan() || self.hard_kill_gamma <= 0.0 {
            return Err(Error::Config(format!(
                "hard_kill_gamma must be positive, got {}",
                self.hard_kill_gamma
            )));
        }
        if self.iv_floor <= 0.0 {
            return Err(Error::Config("iv_floor must be positive".into()));
        }
        if self.short_dte_decay_window < 1 {
            return Err(Error::Config(format!(
                "short_dte_decay_window must be >= 1, got {}",
                self.short_dte_decay_window
            )));
        }
        if self.probe.base_rank < 1 {
            return Err(Error::Config("probe.base_rank is 1-based and must be >= 1".into()));
        }
        if self.probe.max_offset > MAX_PROBE_OFFSET {
            return Err(Error::Config(format!(
                "probe.max_offset must be <= {}, got {}",
                MAX_PROBE_OFFSET, self.probe.max_offset
            )));
        }
        if self.short_min_dte < 1 || self.short_min_dte > self.short_max_dte {
            return Err(Error::Config(format!(
                "short expiry range must satisfy 1 <= short_min_dte <= short_max_dte, got {}..{}",
                self.short_min_dte, self.short_max_dte
            )));
        }

        for (name, window) in [
            ("micro_window", self.micro_window),
            ("month_window", self.month_window),
        ] {
            if window.min < 0 || window.min > window.max {
                return Err(Error::Config(format!(
                    "{} must satisfy 0 <= min <= max, got {}..{}",
                    name, window.min, window.max
                )));
            }
        }
        if self.micro_window.max >= self.month_window.min {
            return Err(Error::Config(format!(
                "micro_window ({}..{}) must end before month_window starts ({})",
                self.micro_window.min, self.micro_window.max, self.month_window.min
            )));
        }

        let diag = &self.diagonal;
        if diag.min_dte > diag.max_dte || diag.max_dte > diag.fallback_max_dte {
            return Err(Error::Config(format!(
                "diagonal windows must satisfy min <= max <= fallback_max, got {} / {} / {}",
                diag.min_dte, diag.max_dte, diag.fallback_max_dte
            )));
        }
        if diag.min_gap_dte < 1 {
            return Err(Error::Config("diagonal.min_gap_dte must be >= 1".into()));
        }

        Ok(())
    }
}
