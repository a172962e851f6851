//! Position sizing, target/stop computation, and confidence scoring.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use zero_dte_core::config::{AccountConfig, TradingConfig};
use zero_dte_core::session::SessionPhase;
use zero_dte_core::signal::SignalType;
use zero_dte_core::suggestion::TradeType;

/// Long-option target: 45% gain on the debit paid.
const DEBIT_TARGET_GAIN: f64 = 0.45;
/// Long-option stop: 27% loss on the debit paid.
const DEBIT_STOP_FRAC: f64 = 0.27;

/// Options contract multiplier.
pub const CONTRACT_MULTIPLIER: u32 = 100;

#[derive(Debug, Clone)]
pub struct RiskParams {
    pub account_size: Decimal,
    pub max_risk_per_trade: f64,
    /// Fraction of credit captured before closing a winner.
    pub profit_capture: f64,
    /// Stop as a multiple of credit received.
    pub stop_multiple: f64,
}

impl RiskParams {
    #[must_use]
    pub fn from_config(account: &AccountConfig, trading: &TradingConfig) -> Self {
        Self {
            account_size: account.account_size,
            max_risk_per_trade: account.max_risk_per_trade,
            profit_capture: trading.profit_capture,
            stop_multiple: trading.stop_multiple,
        }
    }
}

/// Contracts affordable within the per-trade risk budget.
///
/// `floor(account_size * max_risk_fraction / per_contract_max_loss)`,
/// floored at zero: zero means "no size affordable", a recoverable
/// condition the suggester turns into a NoTrade, not an error.
#[must_use]
pub fn contracts_for_risk(
    account_size: Decimal,
    max_risk_fraction: f64,
    per_contract_max_loss: Decimal,
) -> u32 {
    if per_contract_max_loss <= Decimal::ZERO || account_size <= Decimal::ZERO {
        return 0;
    }
    let fraction = Decimal::try_from(max_risk_fraction).unwrap_or(Decimal::ZERO);
    let budget = account_size * fraction;
    (budget / per_contract_max_loss)
        .floor()
        .to_u32()
        .unwrap_or(0)
}

/// Profit target and stop for an entry price.
///
/// Credit structures close the winner at `profit_capture` of the credit
/// and stop out at `stop_multiple` times the credit. Long (debit)
/// structures use fixed 45%-gain / 27%-loss brackets.
#[must_use]
pub fn targets(
    entry: Decimal,
    trade_type: TradeType,
    params: &RiskParams,
) -> (Decimal, Decimal) {
    if trade_type.is_credit() {
        let capture = Decimal::try_from(params.profit_capture).unwrap_or(Decimal::ZERO);
        let multiple = Decimal::try_from(params.stop_multiple).unwrap_or(Decimal::ONE);
        // Credit positions are closed by buying back: target cheaper,
        // stop at a multiple of the credit received.
        let target = entry - entry * capture;
        let stop = entry + entry * (multiple - Decimal::ONE);
        (target, stop)
    } else {
        let gain = Decimal::try_from(1.0 + DEBIT_TARGET_GAIN).unwrap_or(Decimal::ONE);
        let loss = Decimal::try_from(1.0 - DEBIT_STOP_FRAC).unwrap_or(Decimal::ONE);
        (entry * gain, entry * loss)
    }
}

/// Reward multiple per unit of risk. Zero when the stop sits on the entry.
#[must_use]
pub fn risk_reward(entry: Decimal, target: Decimal, stop: Decimal) -> f64 {
    let risk = (entry - stop).abs();
    let reward = (target - entry).abs();
    if risk <= Decimal::ZERO {
        return 0.0;
    }
    (reward / risk).to_f64().unwrap_or(0.0)
}

/// Fraction of the account at risk for a sized position.
#[must_use]
pub fn account_risk_pct(total_max_loss: Decimal, account_size: Decimal) -> f64 {
    if account_size <= Decimal::ZERO {
        return 0.0;
    }
    (total_max_loss / account_size).to_f64().unwrap_or(0.0)
}

/// Historical base rate per setup. Policy table, not a promise; the
/// point is that two identical inputs always score identically.
fn base_rate(signal_type: SignalType) -> f64 {
    match signal_type {
        SignalType::VDipLong => 0.62,
        SignalType::RsiOversoldLong => 0.58,
        SignalType::PivotSupport => 0.57,
        SignalType::RsiOverboughtShort => 0.56,
        SignalType::RubberbandLong => 0.55,
        SignalType::VwapBounce => 0.54,
        SignalType::RubberbandShort => 0.53,
        SignalType::ShootingStar => 0.52,
    }
}

fn phase_factor(phase: SessionPhase) -> f64 {
    match phase {
        SessionPhase::PrimeTime => 1.10,
        SessionPhase::MidSession => 1.00,
        SessionPhase::LunchDoldrums => 0.85,
        SessionPhase::PreMarket | SessionPhase::DangerZone | SessionPhase::AfterHours => 0.70,
    }
}

/// Deterministic confidence score in [0, 1].
///
/// Blends the setup's base rate with delta-derived probability-ITM,
/// scaled by session phase and a risk/reward bonus. Monotonic in both
/// delta and base rate.
#[must_use]
pub fn confidence(
    signal_type: SignalType,
    delta: Option<f64>,
    phase: SessionPhase,
    rr: f64,
) -> f64 {
    let prob_itm = delta.map_or(0.5, |d| d.abs().clamp(0.0, 1.0));
    let raw = 0.5 * base_rate(signal_type) + 0.5 * prob_itm;
    let rr_bonus = if rr >= 2.0 {
        0.10
    } else if rr >= 1.5 {
        0.05
    } else {
        0.0
    };
    (raw * phase_factor(phase) + rr_bonus).clamp(0.0, 1.0)
}

/// Operator-facing risk warnings for a sized proposal.
#[must_use]
pub fn warnings(
    phase: SessionPhase,
    minutes_to_close: i64,
    rr: f64,
    risk_pct: f64,
    max_risk_per_trade: f64,
) -> Vec<String> {
    let mut out = Vec::new();

    if minutes_to_close <= 30 {
        out.push("Less than 30 minutes to close - extreme gamma risk".to_string());
    } else if minutes_to_close <= 60 {
        out.push("Less than 1 hour to close - elevated gamma risk".to_string());
    }

    if phase == SessionPhase::LunchDoldrums {
        out.push("Lunch doldrums - lower volatility, wider spreads".to_string());
    }

    if rr < 1.5 {
        out.push(format!("R:R ratio ({rr:.1}) below recommended 1.5"));
    }

    if risk_pct > max_risk_per_trade {
        out.push(format!(
            "Account risk ({:.1}%) exceeds max ({:.1}%)",
            risk_pct * 100.0,
            max_risk_per_trade * 100.0
        ));
    }

    out
}
