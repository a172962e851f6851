//! Derived trade proposal handed from the suggester to the order manager.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::options::OptionContract;
use crate::session::SessionPhase;
use crate::signal::AlertSignal;

/// Option structure the suggestion trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeType {
    LongCall,
    LongPut,
    CallDebitSpread,
    PutDebitSpread,
    CallCreditSpread,
    PutCreditSpread,
}

impl TradeType {
    /// Credit structures collect premium; target/stop math differs.
    #[must_use]
    pub fn is_credit(&self) -> bool {
        matches!(self, Self::CallCreditSpread | Self::PutCreditSpread)
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LongCall => write!(f, "long_call"),
            Self::LongPut => write!(f, "long_put"),
            Self::CallDebitSpread => write!(f, "call_debit_spread"),
            Self::PutDebitSpread => write!(f, "put_debit_spread"),
            Self::CallCreditSpread => write!(f, "call_credit_spread"),
            Self::PutCreditSpread => write!(f, "put_credit_spread"),
        }
    }
}

/// Immutable, fully-priced trade proposal. One suggestion produces at
/// most one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSuggestion {
    pub id: Uuid,
    pub signal: AlertSignal,
    pub trade_type: TradeType,
    /// Instrument legs; single-leg for long options.
    pub legs: Vec<OptionContract>,
    pub quantity: u32,
    pub entry_price: Decimal,
    pub target_price: Decimal,
    pub stop_loss: Decimal,
    /// Dollar risk at the stop for the full size.
    pub max_loss: Decimal,
    /// Dollar reward at the target for the full size.
    pub max_profit: Decimal,
    pub risk_reward: f64,
    pub account_risk_pct: f64,
    /// Deterministic confidence score in [0, 1].
    pub confidence: f64,
    pub session_phase: SessionPhase,
    pub minutes_to_close: i64,
    pub reasoning: String,
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl TradeSuggestion {
    /// Stable key identifying the instrument-leg set; the order book
    /// allows one non-terminal order per key.
    #[must_use]
    pub fn proposal_key(&self) -> String {
        let mut codes: Vec<&str> = self.legs.iter().map(|l| l.code.as_str()).collect();
        codes.sort_unstable();
        format!("{}:{}", self.signal.ticker, codes.join("/"))
    }

    /// Flag for the operator surface: proposals worth a second look.
    #[must_use]
    pub fn is_high_risk(&self) -> bool {
        self.session_phase == SessionPhase::DangerZone
            || self.minutes_to_close < 30
            || self.confidence < 0.35
            || self.warnings.len() > 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionRight;
    use crate::signal::{SignalAction, SignalType};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn leg(code: &str) -> OptionContract {
        OptionContract {
            code: code.to_string(),
            underlying: "SPX".to_string(),
            strike: dec!(5900),
            right: OptionRight::Call,
            expiry: NaiveDate::from_ymd_opt(2026, 8, 28).unwrap(),
            bid: Some(dec!(12)),
            ask: Some(dec!(12.5)),
            last: None,
            delta: Some(0.5),
            volume: None,
            open_interest: None,
        }
    }

    fn suggestion(legs: Vec<OptionContract>) -> TradeSuggestion {
        TradeSuggestion {
            id: Uuid::new_v4(),
            signal: AlertSignal {
                passphrase: String::new(),
                signal_type: SignalType::VDipLong,
                action: SignalAction::Buy,
                price: dec!(5900),
                ticker: "SPX".to_string(),
                time: Utc::now(),
                rsi: None,
                pivot_level: None,
                vwap_distance: None,
            },
            trade_type: TradeType::LongCall,
            legs,
            quantity: 1,
            entry_price: dec!(12.25),
            target_price: dec!(17.76),
            stop_loss: dec!(8.94),
            max_loss: dec!(1225),
            max_profit: dec!(551),
            risk_reward: 1.66,
            account_risk_pct: 0.049,
            confidence: 0.6,
            session_phase: SessionPhase::PrimeTime,
            minutes_to_close: 300,
            reasoning: String::new(),
            warnings: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn proposal_key_is_order_independent() {
        let a = suggestion(vec![leg("A"), leg("B")]);
        let b = suggestion(vec![leg("B"), leg("A")]);
        assert_eq!(a.proposal_key(), b.proposal_key());
    }

    #[test]
    fn high_risk_flags_danger_zone_and_weak_confidence() {
        let mut s = suggestion(vec![leg("A")]);
        assert!(!s.is_high_risk());
        s.confidence = 0.2;
        assert!(s.is_high_risk());
        s.confidence = 0.6;
        s.session_phase = SessionPhase::DangerZone;
        assert!(s.is_high_risk());
    }
}
