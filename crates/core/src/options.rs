//! Option contract and chain snapshot types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionRight {
    Call,
    Put,
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

/// A single listed contract from the chain snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    /// Exchange contract code, e.g. "SPXW250830C5900000".
    pub code: String,
    pub underlying: String,
    pub strike: Decimal,
    pub right: OptionRight,
    pub expiry: NaiveDate,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub last: Option<Decimal>,
    pub delta: Option<f64>,
    pub volume: Option<u64>,
    pub open_interest: Option<u64>,
}

impl OptionContract {
    /// Bid/ask spread width, when both sides are quoted.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Entry price estimate: mid, falling back to ask, then last.
    #[must_use]
    pub fn entry_estimate(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            (_, Some(ask)) => Some(ask),
            _ => self.last,
        }
    }
}

/// Point-in-time quote for the underlying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketQuote {
    pub ticker: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Chain snapshot for one underlying and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsChain {
    pub underlying: String,
    pub underlying_price: Decimal,
    pub expiry: NaiveDate,
    pub contracts: Vec<OptionContract>,
    pub fetched_at: DateTime<Utc>,
}

impl OptionsChain {
    /// Snapshot age at `now`, saturating at zero for clock skew.
    #[must_use]
    pub fn age_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.fetched_at).num_seconds().max(0) as u64
    }

    pub fn calls(&self) -> impl Iterator<Item = &OptionContract> {
        self.contracts
            .iter()
            .filter(|c| c.right == OptionRight::Call)
    }

    pub fn puts(&self) -> impl Iterator<Item = &OptionContract> {
        self.contracts.iter().filter(|c| c.right == OptionRight::Put)
    }

    /// Closest listed strike to the target delta, within `tolerance`.
    ///
    /// Equidistant-delta ties go to the tighter bid/ask spread, then
    /// the lower strike. Contracts without a delta are skipped.
    #[must_use]
    pub fn find_by_delta(
        &self,
        target_delta: f64,
        right: OptionRight,
        tolerance: f64,
    ) -> Option<&OptionContract> {
        let target = target_delta.abs();
        let mut best: Option<(&OptionContract, f64)> = None;

        for contract in self.contracts.iter().filter(|c| c.right == right) {
            let Some(delta) = contract.delta else {
                continue;
            };
            let distance = (delta.abs() - target).abs();
            if distance > tolerance {
                continue;
            }
            best = match best {
                None => Some((contract, distance)),
                Some((current, current_distance)) => {
                    if distance < current_distance {
                        Some((contract, distance))
                    } else if distance > current_distance {
                        Some((current, current_distance))
                    } else if prefer_on_tie(contract, current) {
                        Some((contract, distance))
                    } else {
                        Some((current, current_distance))
                    }
                }
            };
        }

        best.map(|(contract, _)| contract)
    }

    /// Contract whose strike is closest to the underlying price.
    #[must_use]
    pub fn find_atm(&self, right: OptionRight) -> Option<&OptionContract> {
        self.contracts
            .iter()
            .filter(|c| c.right == right)
            .min_by_key(|c| (c.strike - self.underlying_price).abs())
    }
}

/// Tie-break for equidistant deltas: tighter spread wins, then lower strike.
fn prefer_on_tie(candidate: &OptionContract, current: &OptionContract) -> bool {
    match (candidate.spread(), current.spread()) {
        (Some(a), Some(b)) if a != b => a < b,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        _ => candidate.strike < current.strike,
    }
}
