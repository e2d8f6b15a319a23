//! Leg construction for a routed candidate.
//!
//! The engine only sees the [`BlueprintBuilder`] trait; the chain-backed
//! implementation picks strikes and expiries from the snapshot's quotes.

use chrono::NaiveDate;
use common::{EngineConfig, Error, LegDirection, MarketSnapshot, OptionType, Result, Route};
use serde::{Deserialize, Serialize};

/// Diagonal short call sits at least this far above spot.
const SHORT_STRIKE_BUFFER: f64 = 1.005;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    pub expiry: NaiveDate,
    pub dte: i64,
    pub strike: f64,
    pub option_type: OptionType,
    pub direction: LegDirection,
    pub mid: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub route: Route,
    pub legs: Vec<Leg>,
    /// Net debit per unit; `None` when a leg has no usable mid.
    pub est_debit: Option<f64>,
    pub notes: Vec<String>,
    pub error: Option<String>,
}

impl Blueprint {
    /// Placeholder for a route whose construction failed outright.
    pub fn failed(route: Route, reason: impl Into<String>) -> Self {
        Self {
            route,
            legs: Vec::new(),
            est_debit: None,
            notes: Vec::new(),
            error: Some(reason.into()),
        }
    }

    pub fn short_leg(&self) -> Option<&Leg> {
        self.legs.iter().find(|l| l.direction == LegDirection::Sell)
    }

    pub fn long_leg(&self) -> Option<&Leg> {
        self.legs.iter().find(|l| l.direction == LegDirection::Buy)
    }

    /// Expiry of the far leg, when it differs from the near one.
    pub fn long_expiry(&self) -> Option<NaiveDate> {
        match self.route {
            Route::Diagonal => self.long_leg().map(|l| l.expiry),
            Route::LongGamma => None,
        }
    }

    /// Names the first required leg that is absent.
    pub fn missing_leg(&self) -> Option<&'static str> {
        match self.route {
            Route::Diagonal => {
                if self.short_leg().is_none() {
                    Some("short call")
                } else if self.long_leg().is_none() {
                    Some("long call")
                } else {
                    None
                }
            }
            Route::LongGamma => {
                let has = |t: OptionType| {
                    self.legs
                        .iter()
                        .any(|l| l.option_type == t && l.direction == LegDirection::Buy)
                };
                if !has(OptionType::Call) {
                    Some("long call")
                } else if !has(OptionType::Put) {
                    Some("long put")
                } else {
                    None
                }
            }
        }
    }

    pub fn is_viable(&self) -> bool {
        self.error.is_none() && self.missing_leg().is_none()
    }

    /// Why the blueprint cannot be traded, if it cannot.
    pub fn failure_reason(&self) -> Option<String> {
        if let Some(err) = &self.error {
            return Some(err.clone());
        }
        self.missing_leg().map(|leg| format!("missing {} leg", leg))
    }
}

pub struct BlueprintRequest<'a> {
    pub snapshot: &'a MarketSnapshot,
    pub short_expiry: NaiveDate,
    pub short_dte: i64,
    pub config: &'a EngineConfig,
}

/// Boundary collaborator that turns a route into concrete legs.
///
/// Returns `Error::BlueprintConstruction` when no viable leg combination
/// exists; the router treats that as a failed attempt.
pub trait BlueprintBuilder: Send + Sync {
    fn build(&self, route: Route, request: &BlueprintRequest<'_>) -> Result<Blueprint>;
}

/// Builds legs from the snapshot's option chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainBlueprintBuilder;

impl BlueprintBuilder for ChainBlueprintBuilder {
    fn build(&self, route: Route, request: &BlueprintRequest<'_>) -> Result<Blueprint> {
        match route {
            Route::Diagonal => build_diagonal(request),
            Route::LongGamma => build_long_gamma(request),
        }
    }
}

fn leg(
    request: &BlueprintRequest<'_>,
    expiry: NaiveDate,
    dte: i64,
    strike: f64,
    option_type: OptionType,
    direction: LegDirection,
) -> Leg {
    let mid = request
        .snapshot
        .quote(expiry, strike, option_type)
        .and_then(|q| q.mid());
    Leg {
        expiry,
        dte,
        strike,
        option_type,
        direction,
        mid,
    }
}

fn spread_notes(request: &BlueprintRequest<'_>, legs: &[Leg]) -> Vec<String> {
    legs.iter()
        .filter_map(|l| {
            let ratio = request
                .snapshot
                .quote(l.expiry, l.strike, l.option_type)?
                .spread_ratio()?;
            (ratio > request.config.max_spread_ratio).then(|| {
                format!(
                    "wide spread on {} {:.2} {:?}: {:.0}% of mid",
                    l.expiry,
                    l.strike,
                    l.option_type,
                    ratio * 100.0
                )
            })
        })
        .collect()
}

/// Long-leg expiry: nearest the target inside the main window, then inside
/// the fallback window, always at least `min_gap_dte` past the short leg.
fn select_long_expiry(request: &BlueprintRequest<'_>) -> Option<(NaiveDate, i64)> {
    let diag = &request.config.diagonal;
    let min_dte = request.short_dte + diag.min_gap_dte;
    let target = diag.target_dte.max(min_dte);

    let mut expiries: Vec<(NaiveDate, i64)> = request
        .snapshot
        .term
        .iter()
        .filter(|p| p.dte >= min_dte && p.expiry != request.short_expiry)
        .filter(|p| {
            !request
                .snapshot
                .strikes(p.expiry, OptionType::Call)
                .is_empty()
        })
        .map(|p| (p.expiry, p.dte))
        .collect();
    expiries.sort_by_key(|(_, dte)| *dte);
    expiries.dedup();

    let nearest = |lo: i64, hi: i64| {
        expiries
            .iter()
            .filter(|(_, dte)| *dte >= lo && *dte <= hi)
            .min_by_key(|(_, dte)| (dte - target).abs())
            .copied()
    };
    nearest(diag.min_dte, diag.max_dte).or_else(|| nearest(diag.min_dte, diag.fallback_max_dte))
}

fn build_diagonal(request: &BlueprintRequest<'_>) -> Result<Blueprint> {
    let snapshot = request.snapshot;
    let price = snapshot.price;

    let (long_expiry, long_dte) = select_long_expiry(request).ok_or_else(|| {
        Error::BlueprintConstruction(format!(
            "no long expiry at least {} DTE past the short leg",
            request.config.diagonal.min_gap_dte
        ))
    })?;

    let short_strike = snapshot
        .strikes(request.short_expiry, OptionType::Call)
        .into_iter()
        .find(|s| *s > price * SHORT_STRIKE_BUFFER)
        .ok_or_else(|| {
            Error::BlueprintConstruction(format!(
                "no OTM call above {:.2} on {}",
                price * SHORT_STRIKE_BUFFER,
                request.short_expiry
            ))
        })?;

    let long_strike = snapshot
        .strikes(long_expiry, OptionType::Call)
        .into_iter()
        .rev()
        .find(|s| *s <= price && *s < short_strike)
        .ok_or_else(|| {
            Error::BlueprintConstruction(format!(
                "no call at or below spot {:.2} on {}",
                price, long_expiry
            ))
        })?;

    let short = leg(
        request,
        request.short_expiry,
        request.short_dte,
        short_strike,
        OptionType::Call,
        LegDirection::Sell,
    );
    let long = leg(
        request,
        long_expiry,
        long_dte,
        long_strike,
        OptionType::Call,
        LegDirection::Buy,
    );

    let mut notes = vec![format!(
        "sell {} {:.2}C / buy {} {:.2}C ({}d / {}d)",
        short.expiry, short.strike, long.expiry, long.strike, short.dte, long.dte
    )];
    let mut error = None;
    let est_debit = match (long.mid, short.mid) {
        (Some(long_mid), Some(short_mid)) => {
            let debit = long_mid - short_mid;
            if debit <= 0.0 {
                error = Some(format!("non-positive debit {:.2}", debit));
            }
            Some(debit)
        }
        _ => {
            notes.push("debit unavailable: leg without usable mid".into());
            None
        }
    };

    let legs = vec![short, long];
    notes.extend(spread_notes(request, &legs));

    Ok(Blueprint {
        route: Route::Diagonal,
        legs,
        est_debit,
        notes,
        error,
    })
}

fn build_long_gamma(request: &BlueprintRequest<'_>) -> Result<Blueprint> {
    let snapshot = request.snapshot;
    let price = snapshot.price;
    let expiry = request.short_expiry;

    let puts = snapshot.strikes(expiry, OptionType::Put);
    let strike = snapshot
        .strikes(expiry, OptionType::Call)
        .into_iter()
        .filter(|s| puts.iter().any(|p| (p - s).abs() < 1e-6))
        .min_by(|a, b| (a - price).abs().total_cmp(&(b - price).abs()))
        .ok_or_else(|| {
            Error::BlueprintConstruction(format!("no ATM straddle quotes on {}", expiry))
        })?;

    let call = leg(request, expiry, request.short_dte, strike, OptionType::Call, LegDirection::Buy);
    let put = leg(request, expiry, request.short_dte, strike, OptionType::Put, LegDirection::Buy);

    let mut notes = vec![format!("buy {} {:.2} straddle ({}d)", expiry, strike, request.short_dte)];
    let est_debit = match (call.mid, put.mid) {
        (Some(c), Some(p)) => Some(c + p),
        _ => {
            notes.push("debit unavailable: leg without usable mid".into());
            None
        }
    };

    let legs = vec![call, put];
    notes.extend(spread_notes(request, &legs));

    Ok(Blueprint {
        route: Route::LongGamma,
        legs,
        est_debit,
        notes,
        error: None,
    })
}
