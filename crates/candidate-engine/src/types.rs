use chrono::NaiveDate;
use common::{Curvature, Momentum, Regime};
use serde::{Deserialize, Serialize};

/// Smoothed term-structure metrics for one (ticker, short expiry) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedMetrics {
    pub symbol: String,
    pub price: f64,
    /// 1-based position of the short expiry in the short pool.
    pub short_rank: usize,
    pub short_expiry: NaiveDate,
    pub short_dte: i64,
    pub short_iv: f64,
    pub micro_iv: f64,
    pub month_iv: f64,
    /// Anchor expiry for `month_iv`; `None` when interpolated.
    pub month_expiry: Option<NaiveDate>,
    /// Micro edge after short-DTE decay.
    pub em: f64,
    /// Micro edge before decay.
    pub em_raw: f64,
    /// Decay factor applied to `em_raw`, in `[0, 1]`.
    pub em_decay: f64,
    pub ek: f64,
    pub regime: Regime,
    pub squeeze: bool,
    pub curvature: Curvature,
    /// `(max micro-window IV - short IV) / short IV`.
    pub front_slope: f64,
    pub momentum: Momentum,
    pub est_gamma: f64,
    pub hv_current: f64,
    pub hv_rank: f64,
    /// `short_iv / hv_current`, absent when HV is unusable.
    pub iv_hv_ratio: Option<f64>,
}

impl NormalizedMetrics {
    pub fn abs_edge(&self) -> f64 {
        self.em.abs().max(self.ek.abs())
    }
}

#[cfg(any(test, feature = "testing"))]
impl NormalizedMetrics {
    /// Neutral contango metrics for tests; tweak fields as needed.
    pub fn sample(symbol: &str) -> Self {
        let short_expiry = common::testing::expiry_for(20);
        Self {
            symbol: symbol.to_string(),
            price: 200.0,
            short_rank: 1,
            short_expiry,
            short_dte: 20,
            short_iv: 0.20,
            micro_iv: 0.20,
            month_iv: 0.25,
            month_expiry: Some(common::testing::expiry_for(37)),
            em: 0.01,
            em_raw: 0.01,
            em_decay: 1.0,
            ek: 0.24,
            regime: Regime::Contango,
            squeeze: false,
            curvature: Curvature::Normal,
            front_slope: 0.0,
            momentum: Momentum::Quiet,
            est_gamma: 0.10,
            hv_current: 0.20,
            hv_rank: 40.0,
            iv_hv_ratio: Some(1.0),
        }
    }
}
