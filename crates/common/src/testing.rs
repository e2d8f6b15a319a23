//! Snapshot fixtures for unit tests across the workspace.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::types::{HvInfo, MarketSnapshot, Momentum, OptionQuote, OptionType, TermPoint};

/// Fixed scan date so expiries and DTEs stay consistent.
pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 15, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn expiry_for(dte: i64) -> NaiveDate {
    as_of().date_naive() + Duration::days(dte)
}

pub struct SnapshotBuilder {
    snapshot: MarketSnapshot,
    chain_strikes: usize,
}

impl SnapshotBuilder {
    pub fn new(symbol: &str, price: f64) -> Self {
        Self {
            snapshot: MarketSnapshot {
                symbol: symbol.to_string(),
                as_of: as_of(),
                price,
                term: Vec::new(),
                hv: HvInfo {
                    current_hv: 0.20,
                    hv_rank: 40.0,
                    short_hv: None,
                },
                chain: Vec::new(),
                momentum: Some(Momentum::Quiet),
            },
            chain_strikes: 0,
        }
    }

    pub fn term(mut self, dte: i64, iv: f64) -> Self {
        self.snapshot.term.push(TermPoint {
            expiry: expiry_for(dte),
            dte,
            strike: self.snapshot.price.round(),
            iv,
            gamma: None,
            delta: Some(0.5),
            theta: None,
        });
        self
    }

    /// Set the quoted gamma of the term point at `dte`.
    pub fn gamma(mut self, dte: i64, gamma: f64) -> Self {
        if let Some(point) = self.snapshot.term.iter_mut().find(|p| p.dte == dte) {
            point.gamma = Some(gamma);
        }
        self
    }

    pub fn hv(mut self, current_hv: f64, hv_rank: f64) -> Self {
        self.snapshot.hv.current_hv = current_hv;
        self.snapshot.hv.hv_rank = hv_rank;
        self
    }

    pub fn short_hv(mut self, short_hv: f64) -> Self {
        self.snapshot.hv.short_hv = Some(short_hv);
        self
    }

    pub fn momentum(mut self, momentum: Option<Momentum>) -> Self {
        self.snapshot.momentum = momentum;
        self
    }

    /// Quote calls and puts for every term expiry, `strikes_each_side`
    /// strikes above and below the money.
    pub fn with_chain(mut self, strikes_each_side: usize) -> Self {
        self.chain_strikes = strikes_each_side;
        self
    }

    pub fn build(mut self) -> MarketSnapshot {
        if self.chain_strikes > 0 {
            let price = self.snapshot.price;
            let step = if price < 200.0 { 1.0 } else { 5.0 };
            let atm = (price / step).round() * step;
            let mut chain = Vec::new();
            for point in &self.snapshot.term {
                let iv = if point.iv >= 1.5 { point.iv / 100.0 } else { point.iv };
                let time_value = 0.4 * price * iv * (point.dte as f64 / 365.0).sqrt();
                let n = self.chain_strikes as i64;
                for i in -n..=n {
                    let strike = atm + i as f64 * step;
                    for option_type in [OptionType::Call, OptionType::Put] {
                        let intrinsic = match option_type {
                            OptionType::Call => (price - strike).max(0.0),
                            OptionType::Put => (strike - price).max(0.0),
                        };
                        let mid = intrinsic + time_value;
                        chain.push(OptionQuote {
                            expiry: point.expiry,
                            strike,
                            option_type,
                            bid: Some(mid * 0.97),
                            ask: Some(mid * 1.03),
                            last: Some(mid),
                        });
                    }
                }
            }
            self.snapshot.chain = chain;
        }
        self.snapshot
    }
}

/// A contango curve: short end cheap, month bid.
pub fn contango_snapshot(symbol: &str) -> MarketSnapshot {
    SnapshotBuilder::new(symbol, 200.0)
        .term(5, 0.20)
        .term(9, 0.205)
        .term(12, 0.21)
        .term(16, 0.22)
        .term(37, 0.25)
        .term(65, 0.26)
        .with_chain(6)
        .build()
}
