//! Inbound alert payload.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Closed set of alert setups the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    RsiOversoldLong,
    RsiOverboughtShort,
    RubberbandLong,
    RubberbandShort,
    VDipLong,
    PivotSupport,
    VwapBounce,
    ShootingStar,
}

impl SignalType {
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        matches!(
            self,
            Self::RsiOversoldLong
                | Self::RubberbandLong
                | Self::VDipLong
                | Self::PivotSupport
                | Self::VwapBounce
        )
    }

    #[must_use]
    pub fn is_bearish(&self) -> bool {
        !self.is_bullish()
    }

    /// One-line description used in suggestion reasoning.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::RsiOversoldLong => "RSI oversold - potential bounce",
            Self::RsiOverboughtShort => "RSI overbought - potential pullback",
            Self::RubberbandLong => "Rubberband reversal after red candles",
            Self::RubberbandShort => "Rubberband reversal after green candles",
            Self::VDipLong => "V-dip reversal at support",
            Self::PivotSupport => "Bounce off pivot support",
            Self::VwapBounce => "Mean reversion to VWAP",
            Self::ShootingStar => "Shooting star - bearish reversal",
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RsiOversoldLong => write!(f, "rsi_oversold_long"),
            Self::RsiOverboughtShort => write!(f, "rsi_overbought_short"),
            Self::RubberbandLong => write!(f, "rubberband_long"),
            Self::RubberbandShort => write!(f, "rubberband_short"),
            Self::VDipLong => write!(f, "v_dip_long"),
            Self::PivotSupport => write!(f, "pivot_support"),
            Self::VwapBounce => write!(f, "vwap_bounce"),
            Self::ShootingStar => write!(f, "shooting_star"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    Buy,
    Sell,
}

/// Immutable inbound alert event, created at ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSignal {
    /// Shared secret checked before anything else happens.
    pub passphrase: String,
    pub signal_type: SignalType,
    pub action: SignalAction,
    /// Reference underlying price at alert time.
    pub price: Decimal,
    #[serde(default = "default_ticker")]
    pub ticker: String,
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
    /// Optional indicator context carried for confidence scoring.
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub pivot_level: Option<String>,
    #[serde(default)]
    pub vwap_distance: Option<f64>,
}

fn default_ticker() -> String {
    "SPX".to_string()
}
