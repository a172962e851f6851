use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub account: AccountConfig,
    pub trading: TradingConfig,
    pub session: SessionConfig,
    pub gateway: GatewayConfig,
    pub tracker: TrackerConfig,
}

/// Account-level risk parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account equity in USD.
    pub account_size: Decimal,
    /// Fraction of equity risked per trade (0.0-1.0).
    pub max_risk_per_trade: f64,
    /// Fraction of equity that may be lost in one day before the
    /// engine halts new orders (0.0-1.0).
    pub max_daily_risk: f64,
    /// Maximum concurrent non-terminal orders plus open positions.
    pub max_positions: usize,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            account_size: Decimal::from(25_000),
            max_risk_per_trade: 0.02,
            max_daily_risk: 0.06,
            max_positions: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Target delta for directional (debit) structures.
    pub target_delta: f64,
    /// Target short-leg delta for credit structures.
    pub credit_target_delta: f64,
    /// Acceptable distance from the target delta.
    pub delta_tolerance: f64,
    /// Fraction of credit captured before closing a winner.
    pub profit_capture: f64,
    /// Stop as a multiple of credit received.
    pub stop_multiple: f64,
    /// Skip manual approval and submit orders as soon as they are created.
    pub auto_execute: bool,
    /// Force-close all open positions in the danger zone. Disabling
    /// this is a documented safety override, not a default.
    pub auto_exit_enabled: bool,
    /// Reject market snapshots older than this.
    pub max_snapshot_age_secs: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            target_delta: 0.50,
            credit_target_delta: 0.225,
            delta_tolerance: 0.10,
            profit_capture: 0.55,
            stop_multiple: 2.25,
            auto_execute: false,
            auto_exit_enabled: true,
            max_snapshot_age_secs: 60,
        }
    }
}

/// Session phase boundaries, local market time, "HH:MM".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub market_open: String,
    pub prime_time_end: String,
    pub lunch_end: String,
    pub danger_zone_start: String,
    pub market_close: String,
    /// Market timezone as a fixed offset from UTC in hours
    /// (e.g. -5 for US Eastern standard time).
    pub utc_offset_hours: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            market_open: "09:30".to_string(),
            prime_time_end: "11:00".to_string(),
            lunch_end: "13:30".to_string(),
            danger_zone_start: "15:30".to_string(),
            market_close: "16:00".to_string(),
            utc_offset_hours: -5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// "paper" or "live". Passed through to the gateway opaquely;
    /// the engine never branches on it.
    pub mode: String,
    /// Shared secret expected on inbound alert payloads.
    pub webhook_passphrase: String,
    /// Timeout for a single submit/cancel call.
    pub submit_timeout_secs: u64,
    /// Retries for a new-order submission before the order is
    /// cancelled with the failure recorded.
    pub submit_max_retries: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: "paper".to_string(),
            webhook_passphrase: String::new(),
            submit_timeout_secs: 10,
            submit_max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Monitoring loop tick interval.
    pub tick_secs: u64,
    /// Deadline for a single position price refresh.
    pub price_timeout_secs: u64,
    /// Interval between forced-close retries.
    pub close_retry_secs: u64,
    /// Forced-close attempts before escalating a fatal alert.
    pub close_retry_max: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 30,
            price_timeout_secs: 5,
            close_retry_secs: 3,
            close_retry_max: 5,
        }
    }
}
