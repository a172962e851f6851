//! Maps a classified alert plus a chain snapshot to a trade proposal.
//!
//! Fails closed: anything that prevents a well-priced proposal yields
//! `NoTrade` with a reason, never an error.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use zero_dte_core::config::TradingConfig;
use zero_dte_core::options::{OptionContract, OptionRight, OptionsChain};
use zero_dte_core::session::SessionPhase;
use zero_dte_core::signal::AlertSignal;
use zero_dte_core::suggestion::{TradeSuggestion, TradeType};

use crate::risk::{self, RiskParams, CONTRACT_MULTIPLIER};

#[derive(Debug, Clone)]
pub struct SuggesterConfig {
    /// Target delta for directional (debit) structures.
    pub target_delta: f64,
    /// Target short-leg delta for credit structures.
    pub credit_target_delta: f64,
    pub delta_tolerance: f64,
    pub max_snapshot_age: Duration,
}

impl SuggesterConfig {
    #[must_use]
    pub fn from_config(trading: &TradingConfig) -> Self {
        Self {
            target_delta: trading.target_delta,
            credit_target_delta: trading.credit_target_delta,
            delta_tolerance: trading.delta_tolerance,
            max_snapshot_age: Duration::seconds(trading.max_snapshot_age_secs as i64),
        }
    }
}

/// Why no proposal was generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoTradeReason {
    /// Snapshot older than the configured maximum.
    StaleSnapshot { age_secs: u64 },
    /// No listed strike within the delta tolerance of the target.
    NoMatchingStrike,
    /// The selected contract carried no usable price.
    NoPriceData,
    /// Risk budget affords zero contracts at this price.
    ZeroSize,
}

impl std::fmt::Display for NoTradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaleSnapshot { age_secs } => write!(f, "stale snapshot ({age_secs}s old)"),
            Self::NoMatchingStrike => write!(f, "no strike within delta tolerance"),
            Self::NoPriceData => write!(f, "no usable price on selected contract"),
            Self::ZeroSize => write!(f, "risk budget affords zero contracts"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SuggestOutcome {
    Trade(Box<TradeSuggestion>),
    NoTrade(NoTradeReason),
}

pub struct TradeSuggester {
    config: SuggesterConfig,
    risk: RiskParams,
}

impl TradeSuggester {
    #[must_use]
    pub fn new(config: SuggesterConfig, risk: RiskParams) -> Self {
        Self { config, risk }
    }

    /// Build a proposal for the alert against the given snapshot.
    ///
    /// Pure: `now`, the phase, and minutes-to-close come from the
    /// caller so identical inputs always yield identical output.
    #[must_use]
    pub fn suggest(
        &self,
        signal: &AlertSignal,
        chain: &OptionsChain,
        phase: SessionPhase,
        minutes_to_close: i64,
        now: DateTime<Utc>,
    ) -> SuggestOutcome {
        let age_secs = chain.age_secs(now);
        if age_secs > self.config.max_snapshot_age.num_seconds().max(0) as u64 {
            debug!(age_secs, "Snapshot too old for a suggestion");
            return SuggestOutcome::NoTrade(NoTradeReason::StaleSnapshot { age_secs });
        }

        let (right, trade_type) = if signal.signal_type.is_bullish() {
            (OptionRight::Call, TradeType::LongCall)
        } else {
            (OptionRight::Put, TradeType::LongPut)
        };

        let contract = match chain.find_by_delta(
            self.config.target_delta,
            right,
            self.config.delta_tolerance,
        ) {
            Some(c) => c,
            None => match chain.find_atm(right) {
                Some(c) => c,
                None => return SuggestOutcome::NoTrade(NoTradeReason::NoMatchingStrike),
            },
        };

        let Some(entry) = contract.entry_estimate() else {
            return SuggestOutcome::NoTrade(NoTradeReason::NoPriceData);
        };

        let (target, stop) = risk::targets(entry, trade_type, &self.risk);
        let per_contract_max_loss = entry * Decimal::from(CONTRACT_MULTIPLIER);
        let quantity = risk::contracts_for_risk(
            self.risk.account_size,
            self.risk.max_risk_per_trade,
            per_contract_max_loss,
        );
        if quantity == 0 {
            debug!(%entry, "No affordable size at this premium");
            return SuggestOutcome::NoTrade(NoTradeReason::ZeroSize);
        }

        let size = Decimal::from(quantity);
        let max_loss = per_contract_max_loss * size;
        let max_profit = (target - entry) * Decimal::from(CONTRACT_MULTIPLIER) * size;
        let rr = risk::risk_reward(entry, target, stop);
        let risk_pct = risk::account_risk_pct(max_loss, self.risk.account_size);
        let confidence = risk::confidence(signal.signal_type, contract.delta, phase, rr);
        let warnings = risk::warnings(
            phase,
            minutes_to_close,
            rr,
            risk_pct,
            self.risk.max_risk_per_trade,
        );
        let reasoning = build_reasoning(signal, contract, rr);

        SuggestOutcome::Trade(Box::new(TradeSuggestion {
            id: Uuid::new_v4(),
            signal: signal.clone(),
            trade_type,
            legs: vec![contract.clone()],
            quantity,
            entry_price: entry,
            target_price: target,
            stop_loss: stop,
            max_loss,
            max_profit,
            risk_reward: rr,
            account_risk_pct: risk_pct,
            confidence,
            session_phase: phase,
            minutes_to_close,
            reasoning,
            warnings,
            created_at: now,
        }))
    }
}

fn build_reasoning(signal: &AlertSignal, contract: &OptionContract, rr: f64) -> String {
    let mut parts = vec![signal.signal_type.description().to_string()];
    if let Some(rsi) = signal.rsi {
        parts.push(format!("RSI {rsi:.1}"));
    }
    if let Some(level) = &signal.pivot_level {
        parts.push(format!("at {level}"));
    }
    match contract.delta {
        Some(delta) => parts.push(format!("Strike {} (delta {delta:.2})", contract.strike)),
        None => parts.push(format!("Strike {}", contract.strike)),
    }
    parts.push(format!("R:R {rr:.1}:1"));
    parts.join(". ") + "."
}
