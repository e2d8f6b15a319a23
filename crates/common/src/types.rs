//! Domain types shared across the engine crates.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ── Market Snapshot Types ─────────────────────────────────────────────

/// One expiry on the term structure, carrying its ATM implied vol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermPoint {
    pub expiry: NaiveDate,
    pub dte: i64,
    /// ATM strike used for the IV reading.
    #[serde(default)]
    pub strike: f64,
    /// Implied vol, decimal or percent.
    pub iv: f64,
    #[serde(default)]
    pub gamma: Option<f64>,
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(default)]
    pub theta: Option<f64>,
}

/// A single listed option quote from the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    pub expiry: NaiveDate,
    pub strike: f64,
    pub option_type: OptionType,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub last: Option<f64>,
}

impl OptionQuote {
    /// Mid of a two-sided market, falling back to the last trade.
    pub fn mid(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) if bid > 0.0 && ask > 0.0 => Some((bid + ask) / 2.0),
            _ => self.last.filter(|last| *last > 0.0),
        }
    }

    /// Bid/ask width relative to mid, when both sides are quoted.
    pub fn spread_ratio(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) if bid > 0.0 && ask >= bid => {
                let mid = (bid + ask) / 2.0;
                Some((ask - bid) / mid)
            }
            _ => None,
        }
    }
}

/// Realized-vol context for the underlying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HvInfo {
    /// 20-day historical volatility.
    pub current_hv: f64,
    /// 1-year percentile rank of `current_hv`, 0–100.
    pub hv_rank: f64,
    /// Short-lookback realized vol (5-day), used to classify momentum.
    #[serde(default)]
    pub short_hv: Option<f64>,
}

/// Everything the engine needs for one ticker in one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub as_of: DateTime<Utc>,
    pub price: f64,
    pub term: Vec<TermPoint>,
    pub hv: HvInfo,
    #[serde(default)]
    pub chain: Vec<OptionQuote>,
    /// Externally supplied momentum label; derived from HV when absent.
    #[serde(default)]
    pub momentum: Option<Momentum>,
}

impl MarketSnapshot {
    pub fn quote(&self, expiry: NaiveDate, strike: f64, option_type: OptionType) -> Option<&OptionQuote> {
        self.chain.iter().find(|q| {
            q.expiry == expiry && q.option_type == option_type && (q.strike - strike).abs() < 1e-6
        })
    }

    /// Sorted, de-duplicated strikes quoted for an expiry and side.
    pub fn strikes(&self, expiry: NaiveDate, option_type: OptionType) -> Vec<f64> {
        let mut strikes: Vec<f64> = self
            .chain
            .iter()
            .filter(|q| q.expiry == expiry && q.option_type == option_type)
            .map(|q| q.strike)
            .filter(|s| s.is_finite())
            .collect();
        strikes.sort_by(|a, b| a.total_cmp(b));
        strikes.dedup_by(|a, b| (*a - *b).abs() < 1e-6);
        strikes
    }
}

// ── Classification Enums ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Backwardation,
    Contango,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Curvature {
    SpikyFront,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Momentum {
    Crush,
    Quiet,
    Trend,
    Pulse,
}

/// Structural classification of the term structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Shape {
    Backward,
    /// Flat front, bid (steep) back.
    Ffbs,
    Spike,
    Steep,
    Mild,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    LongGamma,
    Diagonal,
}

/// Gate outcome. Ordering follows actionability: `Forbid < Wait < Limit < Exec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateDecision {
    Forbid,
    Wait,
    Limit,
    Exec,
}

impl GateDecision {
    pub fn rank(self) -> u8 {
        match self {
            GateDecision::Forbid => 0,
            GateDecision::Wait => 1,
            GateDecision::Limit => 2,
            GateDecision::Exec => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tag {
    Strict,
    AutoAdjusted,
    Watchlist,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegDirection {
    Buy,
    Sell,
}

// ── Labels ────────────────────────────────────────────────────────────

impl Regime {
    pub fn as_str(self) -> &'static str {
        match self {
            Regime::Backwardation => "BACKWARDATION",
            Regime::Contango => "CONTANGO",
            Regime::Flat => "FLAT",
        }
    }
}

impl Momentum {
    pub fn as_str(self) -> &'static str {
        match self {
            Momentum::Crush => "CRUSH",
            Momentum::Quiet => "QUIET",
            Momentum::Trend => "TREND",
            Momentum::Pulse => "PULSE",
        }
    }
}

impl Shape {
    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Backward => "BACKWARD",
            Shape::Ffbs => "FFBS",
            Shape::Spike => "SPIKE",
            Shape::Steep => "STEEP",
            Shape::Mild => "MILD",
            Shape::Flat => "FLAT",
        }
    }
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::LongGamma => "LONG_GAMMA",
            Route::Diagonal => "DIAGONAL",
        }
    }
}

impl GateDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            GateDecision::Forbid => "FORBID",
            GateDecision::Wait => "WAIT",
            GateDecision::Limit => "LIMIT",
            GateDecision::Exec => "EXEC",
        }
    }
}

impl Tag {
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Strict => "STRICT",
            Tag::AutoAdjusted => "AUTO_ADJUSTED",
            Tag::Watchlist => "WATCHLIST",
            Tag::Rejected => "REJECTED",
        }
    }
}

macro_rules! display_via_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_via_as_str!(Regime, Momentum, Shape, Route, GateDecision, Tag);
