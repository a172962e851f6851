//! Shared fixtures for unit tests.

use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use zero_dte_core::options::{OptionContract, OptionRight};
use zero_dte_core::session::SessionPhase;
use zero_dte_core::signal::{AlertSignal, SignalAction, SignalType};
use zero_dte_core::suggestion::{TradeSuggestion, TradeType};

pub(crate) fn sample_signal() -> AlertSignal {
    AlertSignal {
        passphrase: "secret".to_string(),
        signal_type: SignalType::VDipLong,
        action: SignalAction::Buy,
        price: dec!(5900),
        ticker: "SPX".to_string(),
        time: Utc::now(),
        rsi: Some(24.0),
        pivot_level: None,
        vwap_distance: None,
    }
}

pub(crate) fn sample_leg(code: &str) -> OptionContract {
    OptionContract {
        code: code.to_string(),
        underlying: "SPX".to_string(),
        strike: dec!(5900),
        right: OptionRight::Call,
        expiry: NaiveDate::from_ymd_opt(2026, 8, 28).unwrap(),
        bid: Some(dec!(2.40)),
        ask: Some(dec!(2.60)),
        last: None,
        delta: Some(0.51),
        volume: None,
        open_interest: None,
    }
}

pub(crate) fn sample_suggestion() -> TradeSuggestion {
    suggestion_for_leg("SPXW5900C")
}

pub(crate) fn suggestion_for_leg(code: &str) -> TradeSuggestion {
    TradeSuggestion {
        id: Uuid::new_v4(),
        signal: sample_signal(),
        trade_type: TradeType::LongCall,
        legs: vec![sample_leg(code)],
        quantity: 2,
        entry_price: dec!(2.50),
        target_price: dec!(3.63),
        stop_loss: dec!(1.83),
        max_loss: dec!(500),
        max_profit: dec!(226),
        risk_reward: 1.66,
        account_risk_pct: 0.02,
        confidence: 0.6,
        session_phase: SessionPhase::PrimeTime,
        minutes_to_close: 300,
        reasoning: String::new(),
        warnings: vec![],
        created_at: Utc::now(),
    }
}
