//! Term-structure normalization: raw per-expiry IV points in, smoothed
//! micro/month edges and classification flags out.

use chrono::NaiveDate;
use common::{
    Curvature, DteWindow, EngineConfig, Error, HvInfo, MarketSnapshot, Momentum, Regime, Result,
    TermPoint,
};
use tracing::debug;

use crate::types::NormalizedMetrics;

/// Vol readings at or above this are treated as percent.
const PERCENT_VOL_CUTOFF: f64 = 1.5;

/// Short/long realized-vol ratios for momentum labels.
const PULSE_RATIO: f64 = 1.5;
const TREND_RATIO: f64 = 1.15;
const CRUSH_RATIO: f64 = 0.6;

/// ATM straddle gamma ≈ 2·φ(0) / (S·σ·√t).
const STRADDLE_GAMMA_COEFF: f64 = 0.8;

pub fn decimal_vol(value: f64) -> f64 {
    if value >= PERCENT_VOL_CUTOFF {
        value / 100.0
    } else {
        value
    }
}

/// Term points with a usable IV, converted to decimals and sorted by DTE.
fn usable_term(snapshot: &MarketSnapshot) -> Vec<TermPoint> {
    let mut points: Vec<TermPoint> = snapshot
        .term
        .iter()
        .filter(|p| p.dte >= 1 && p.iv.is_finite() && p.iv > 0.0)
        .map(|p| TermPoint {
            iv: decimal_vol(p.iv),
            ..p.clone()
        })
        .collect();
    points.sort_by(|a, b| a.dte.cmp(&b.dte).then(a.expiry.cmp(&b.expiry)));
    points
}

/// Candidate short expiries, nearest first. Rank `r` is element `r - 1`.
pub fn short_pool(snapshot: &MarketSnapshot, config: &EngineConfig) -> Vec<TermPoint> {
    usable_term(snapshot)
        .into_iter()
        .filter(|p| in_short_range(p, config))
        .collect()
}

fn in_short_range(point: &TermPoint, config: &EngineConfig) -> bool {
    point.dte >= config.short_min_dte && point.dte <= config.short_max_dte
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Month baseline: nearest expiry to the window midpoint, else linear
/// interpolation between the bracketing expiries, else the nearest side.
fn month_baseline(points: &[TermPoint], window: DteWindow) -> Option<(f64, Option<NaiveDate>)> {
    let target = window.midpoint();
    let distance = |p: &TermPoint| (p.dte as f64 - target).abs();

    if let Some(anchor) = points
        .iter()
        .filter(|p| window.contains(p.dte))
        .min_by(|a, b| distance(a).total_cmp(&distance(b)))
    {
        return Some((anchor.iv, Some(anchor.expiry)));
    }

    let below = points.iter().filter(|p| p.dte < window.min).max_by_key(|p| p.dte);
    let above = points.iter().filter(|p| p.dte > window.max).min_by_key(|p| p.dte);
    match (below, above) {
        (Some(lo), Some(hi)) => {
            let weight = (target - lo.dte as f64) / (hi.dte - lo.dte) as f64;
            Some((lo.iv + weight * (hi.iv - lo.iv), None))
        }
        (Some(p), None) | (None, Some(p)) => Some((p.iv, Some(p.expiry))),
        (None, None) => None,
    }
}

/// Smoothstep factor on `dte / window`: 0 at expiry, 1 from the window on.
pub fn short_dte_decay(dte: i64, window: i64) -> f64 {
    if window <= 0 || dte >= window {
        return 1.0;
    }
    let x = (dte.max(0) as f64 / window as f64).clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

fn classify_regime(short_iv: f64, month_iv: f64, band: f64) -> Regime {
    if short_iv > month_iv * (1.0 + band) {
        Regime::Backwardation
    } else if month_iv > short_iv * (1.0 + band) {
        Regime::Contango
    } else {
        Regime::Flat
    }
}

pub fn classify_momentum(hv: &HvInfo, supplied: Option<Momentum>) -> Momentum {
    if let Some(momentum) = supplied {
        return momentum;
    }
    let current = decimal_vol(hv.current_hv);
    match hv.short_hv.map(decimal_vol) {
        Some(short) if short.is_finite() && current.is_finite() && current > 0.0 => {
            let ratio = short / current;
            if ratio >= PULSE_RATIO {
                Momentum::Pulse
            } else if ratio >= TREND_RATIO {
                Momentum::Trend
            } else if ratio <= CRUSH_RATIO {
                Momentum::Crush
            } else {
                Momentum::Quiet
            }
        }
        _ => Momentum::Quiet,
    }
}

/// Front-end gamma of an ATM straddle on the short expiry.
fn estimate_gamma(short: &TermPoint, price: f64) -> f64 {
    if let Some(gamma) = short.gamma.filter(|g| g.is_finite() && *g >= 0.0) {
        return gamma * 2.0;
    }
    let denom = price * short.iv * (short.dte as f64 / 365.0).sqrt();
    if denom > 0.0 {
        STRADDLE_GAMMA_COEFF / denom
    } else {
        0.0
    }
}

/// Normalize `snapshot` around the short expiry at 1-based `rank`.
pub fn normalize(
    snapshot: &MarketSnapshot,
    rank: usize,
    config: &EngineConfig,
) -> Result<NormalizedMetrics> {
    let symbol = snapshot.symbol.as_str();
    if !snapshot.price.is_finite() || snapshot.price <= 0.0 {
        return Err(Error::unavailable(symbol, "invalid underlying price"));
    }
    if !snapshot.hv.hv_rank.is_finite() {
        return Err(Error::unavailable(symbol, "invalid HV rank"));
    }

    let points = usable_term(snapshot);
    if points.is_empty() {
        return Err(Error::unavailable(symbol, "no usable term structure"));
    }

    let pool: Vec<&TermPoint> = points
        .iter()
        .filter(|p| in_short_range(p, config))
        .collect();
    if pool.is_empty() {
        return Err(Error::unavailable(
            symbol,
            format!(
                "no expiry within {}..={} DTE",
                config.short_min_dte, config.short_max_dte
            ),
        ));
    }
    let short = rank
        .checked_sub(1)
        .and_then(|idx| pool.get(idx))
        .copied()
        .ok_or_else(|| {
            Error::unavailable(
                symbol,
                format!("short rank {} beyond {} available expiries", rank, pool.len()),
            )
        })?;

    let mut micro_ivs: Vec<f64> = points
        .iter()
        .filter(|p| config.micro_window.contains(p.dte))
        .map(|p| p.iv)
        .collect();
    let front_max = micro_ivs.iter().copied().fold(f64::NAN, f64::max);
    let micro_iv = median(&mut micro_ivs).unwrap_or(short.iv);

    let (month_iv, month_expiry) = month_baseline(&points, config.month_window)
        .ok_or_else(|| Error::unavailable(symbol, "no month anchor expiry"))?;

    let denom = short.iv.max(config.iv_floor);
    let em_raw = (micro_iv - short.iv) / denom;
    let ek = (month_iv - short.iv) / denom;
    let em_decay = short_dte_decay(short.dte, config.short_dte_decay_window);
    let em = em_raw * em_decay;

    let squeeze = micro_iv > month_iv * config.squeeze_multiplier;
    let front_slope = if front_max.is_finite() {
        (front_max - short.iv) / short.iv
    } else {
        0.0
    };
    let curvature = if front_slope > config.curvature_threshold {
        Curvature::SpikyFront
    } else {
        Curvature::Normal
    };
    let regime = classify_regime(short.iv, month_iv, config.regime_band);
    let momentum = classify_momentum(&snapshot.hv, snapshot.momentum);
    let est_gamma = estimate_gamma(short, snapshot.price);

    let hv_current = decimal_vol(snapshot.hv.current_hv);
    let iv_hv_ratio = (hv_current.is_finite() && hv_current > 0.0).then(|| short.iv / hv_current);

    debug!(
        "{} rank={} dte={} short_iv={:.4} micro_iv={:.4} month_iv={:.4} em={:.4} ek={:.4} regime={} squeeze={}",
        symbol,
        rank,
        short.dte,
        short.iv,
        micro_iv,
        month_iv,
        em,
        ek,
        regime,
        squeeze
    );

    Ok(NormalizedMetrics {
        symbol: symbol.to_string(),
        price: snapshot.price,
        short_rank: rank,
        short_expiry: short.expiry,
        short_dte: short.dte,
        short_iv: short.iv,
        micro_iv,
        month_iv,
        month_expiry,
        em,
        em_raw,
        em_decay,
        ek,
        regime,
        squeeze,
        curvature,
        front_slope,
        momentum,
        est_gamma,
        hv_current,
        hv_rank: snapshot.hv.hv_rank.clamp(0.0, 100.0),
        iv_hv_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::{contango_snapshot, SnapshotBuilder};

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_contango_snapshot_metrics() {
        let m = normalize(&contango_snapshot("IWM"), 1, &config()).unwrap();
        assert_eq!(m.short_dte, 5);
        assert!((m.micro_iv - 0.2025).abs() < 1e-9);
        assert!((m.month_iv - 0.25).abs() < 1e-9);
        assert!((m.ek - 0.25).abs() < 1e-9);
        assert!(m.em < m.em_raw);
        assert_eq!(m.regime, Regime::Contango);
        assert!(!m.squeeze);
        assert_eq!(m.curvature, Curvature::Normal);
    }

    #[test]
    fn test_percent_ivs_are_converted() {
        let snap = SnapshotBuilder::new("SPY", 500.0)
            .term(7, 18.0)
            .term(35, 21.0)
            .hv(15.0, 30.0)
            .build();
        let m = normalize(&snap, 1, &config()).unwrap();
        assert!((m.short_iv - 0.18).abs() < 1e-9);
        assert!((m.month_iv - 0.21).abs() < 1e-9);
        assert!((m.hv_current - 0.15).abs() < 1e-9);
        assert!((m.iv_hv_ratio.unwrap() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_month_iv_anchors_nearest_window_midpoint() {
        let snap = SnapshotBuilder::new("QQQ", 400.0)
            .term(7, 0.20)
            .term(31, 0.22)
            .term(40, 0.24)
            .build();
        let m = normalize(&snap, 1, &config()).unwrap();
        assert!((m.month_iv - 0.24).abs() < 1e-9);
        assert_eq!(m.month_expiry, Some(common::testing::expiry_for(40)));
    }

    #[test]
    fn test_month_iv_interpolates_when_window_empty() {
        let snap = SnapshotBuilder::new("QQQ", 400.0)
            .term(10, 0.20)
            .term(60, 0.30)
            .build();
        let m = normalize(&snap, 1, &config()).unwrap();
        assert!((m.month_iv - 0.255).abs() < 1e-9);
        assert!(m.month_expiry.is_none());
    }

    #[test]
    fn test_micro_iv_is_median_of_window() {
        let snap = SnapshotBuilder::new("AAPL", 180.0)
            .term(2, 0.40)
            .term(4, 0.22)
            .term(8, 0.30)
            .term(35, 0.30)
            .build();
        let m = normalize(&snap, 1, &config()).unwrap();
        assert!((m.micro_iv - 0.30).abs() < 1e-9);
    }

    #[test]
    fn test_decay_is_continuous_smoothstep() {
        assert_eq!(short_dte_decay(6, 6), 1.0);
        assert_eq!(short_dte_decay(20, 6), 1.0);
        assert_eq!(short_dte_decay(0, 6), 0.0);
        assert!((short_dte_decay(3, 6) - 0.5).abs() < 1e-12);
        let mut prev = 0.0;
        for dte in 1..=6 {
            let f = short_dte_decay(dte, 6);
            assert!(f > prev);
            prev = f;
        }
    }

    #[test]
    fn test_squeeze_and_spiky_front() {
        let snap = SnapshotBuilder::new("TSLA", 250.0)
            .term(3, 0.50)
            .term(6, 0.70)
            .term(9, 0.65)
            .term(37, 0.55)
            .build();
        let m = normalize(&snap, 1, &config()).unwrap();
        assert!(m.squeeze);
        assert_eq!(m.curvature, Curvature::SpikyFront);
        assert!((m.front_slope - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_backwardation_regime() {
        let snap = SnapshotBuilder::new("NVDA", 120.0)
            .term(5, 0.60)
            .term(37, 0.45)
            .build();
        let m = normalize(&snap, 1, &config()).unwrap();
        assert_eq!(m.regime, Regime::Backwardation);
        assert!(m.ek < 0.0);
    }

    #[test]
    fn test_rank_beyond_pool_is_unavailable() {
        let snap = contango_snapshot("IWM");
        let pool = short_pool(&snap, &config());
        assert_eq!(pool.len(), 3);
        let err = normalize(&snap, 4, &config()).unwrap_err();
        assert!(matches!(err, Error::DataUnavailable { .. }));
        assert!(normalize(&snap, 0, &config()).is_err());
    }

    #[test]
    fn test_short_pool_skips_expiries_below_min_dte() {
        let snap = SnapshotBuilder::new("SPY", 500.0)
            .term(1, 0.30)
            .term(2, 0.28)
            .term(4, 0.20)
            .term(9, 0.21)
            .term(35, 0.24)
            .build();
        let pool = short_pool(&snap, &config());
        assert_eq!(pool.iter().map(|p| p.dte).collect::<Vec<_>>(), vec![4, 9]);

        let m = normalize(&snap, 1, &config()).unwrap();
        assert_eq!(m.short_dte, 4);
        // 1 and 2 DTE still feed the micro baseline.
        assert!((m.micro_iv - 0.245).abs() < 1e-9);

        let only_near = SnapshotBuilder::new("SPY", 500.0)
            .term(2, 0.30)
            .term(35, 0.24)
            .build();
        let err = normalize(&only_near, 1, &config()).unwrap_err();
        assert!(matches!(err, Error::DataUnavailable { ref reason, .. } if reason.contains("3..=15")));

        let relaxed = EngineConfig {
            short_min_dte: 1,
            ..config()
        };
        assert_eq!(normalize(&only_near, 1, &relaxed).unwrap().short_dte, 2);
    }

    #[test]
    fn test_momentum_derived_from_realized_vol() {
        let hv = |short: f64| HvInfo {
            current_hv: 0.20,
            hv_rank: 50.0,
            short_hv: Some(short),
        };
        assert_eq!(classify_momentum(&hv(0.32), None), Momentum::Pulse);
        assert_eq!(classify_momentum(&hv(0.25), None), Momentum::Trend);
        assert_eq!(classify_momentum(&hv(0.20), None), Momentum::Quiet);
        assert_eq!(classify_momentum(&hv(0.10), None), Momentum::Crush);
        assert_eq!(classify_momentum(&hv(0.10), Some(Momentum::Trend)), Momentum::Trend);
    }

    #[test]
    fn test_est_gamma_prefers_quoted_gamma() {
        let snap = SnapshotBuilder::new("IWM", 200.0)
            .term(5, 0.20)
            .term(37, 0.25)
            .gamma(5, 0.06)
            .build();
        let m = normalize(&snap, 1, &config()).unwrap();
        assert!((m.est_gamma - 0.12).abs() < 1e-9);
    }
}
