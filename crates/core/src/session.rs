//! Trading-session clock.
//!
//! Maps wall-clock time to a session phase from a fixed policy table.
//! The six half-open windows partition the 24h domain; the same table
//! gates new entries and triggers the danger-zone forced exit, so this
//! is the single source of truth for both.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::{EngineError, Result};

/// Session phase per the 0DTE playbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    PreMarket,
    /// 09:30-11:00: most of the daily range forms here.
    PrimeTime,
    /// 11:00-13:30: volatility drops, spreads widen.
    LunchDoldrums,
    /// 13:30-15:30: post-lunch repositioning.
    MidSession,
    /// 15:30-16:00: gamma risk extreme; exit only.
    DangerZone,
    AfterHours,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreMarket => write!(f, "pre_market"),
            Self::PrimeTime => write!(f, "prime_time"),
            Self::LunchDoldrums => write!(f, "lunch_doldrums"),
            Self::MidSession => write!(f, "mid_session"),
            Self::DangerZone => write!(f, "danger_zone"),
            Self::AfterHours => write!(f, "after_hours"),
        }
    }
}

impl SessionPhase {
    /// Operator-facing description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::PreMarket => "Market not yet open",
            Self::PrimeTime => "Prime trading hours - best liquidity",
            Self::LunchDoldrums => "Lunch doldrums - low volatility, wider spreads",
            Self::MidSession => "Mid session - post-lunch repositioning",
            Self::DangerZone => "Danger zone - exit all positions, no new trades",
            Self::AfterHours => "Market closed",
        }
    }
}

/// Whether a new entry is permitted in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryGate {
    Allowed,
    /// Allowed, but flagged for low liquidity (lunch doldrums).
    AllowedLowLiquidity,
    Closed,
}

impl EntryGate {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// Phase boundary times. Invariant: strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub market_open: NaiveTime,
    pub prime_time_end: NaiveTime,
    pub lunch_end: NaiveTime,
    pub danger_zone_start: NaiveTime,
    pub market_close: NaiveTime,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            market_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            prime_time_end: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            lunch_end: NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
            danger_zone_start: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            market_close: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        }
    }
}

fn parse_hhmm(text: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M")
        .map_err(|e| EngineError::Configuration(format!("invalid session time {text:?}: {e}")))
}

impl SessionPolicy {
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let policy = Self {
            market_open: parse_hhmm(&config.market_open)?,
            prime_time_end: parse_hhmm(&config.prime_time_end)?,
            lunch_end: parse_hhmm(&config.lunch_end)?,
            danger_zone_start: parse_hhmm(&config.danger_zone_start)?,
            market_close: parse_hhmm(&config.market_close)?,
        };
        let boundaries = [
            policy.market_open,
            policy.prime_time_end,
            policy.lunch_end,
            policy.danger_zone_start,
            policy.market_close,
        ];
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EngineError::Configuration(
                "session boundaries must be strictly increasing".to_string(),
            ));
        }
        Ok(policy)
    }
}

/// Pure mapping from wall-clock time to session phase.
#[derive(Debug, Clone)]
pub struct SessionClock {
    policy: SessionPolicy,
    offset: FixedOffset,
    /// When set, `now_market` reports this instant instead of the wall
    /// clock. Test affordance.
    frozen_at: Option<DateTime<Utc>>,
}

impl SessionClock {
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600).ok_or_else(|| {
            EngineError::Configuration(format!(
                "invalid utc offset: {} hours",
                config.utc_offset_hours
            ))
        })?;
        Ok(Self {
            policy: SessionPolicy::from_config(config)?,
            offset,
            frozen_at: None,
        })
    }

    #[must_use]
    pub fn new(policy: SessionPolicy, offset: FixedOffset) -> Self {
        Self {
            policy,
            offset,
            frozen_at: None,
        }
    }

    /// Pin the clock to a fixed instant. Everything that reads the
    /// current time goes through `now_market`, so freezing it makes
    /// phase-dependent behavior reproducible under test.
    #[must_use]
    pub fn frozen_at(mut self, at: DateTime<Utc>) -> Self {
        self.frozen_at = Some(at);
        self
    }

    /// Phase for a local market time. Total over the 24h domain;
    /// windows are half-open `[start, end)`.
    #[must_use]
    pub fn phase_at(&self, time: NaiveTime) -> SessionPhase {
        let p = &self.policy;
        if time < p.market_open {
            SessionPhase::PreMarket
        } else if time < p.prime_time_end {
            SessionPhase::PrimeTime
        } else if time < p.lunch_end {
            SessionPhase::LunchDoldrums
        } else if time < p.danger_zone_start {
            SessionPhase::MidSession
        } else if time < p.market_close {
            SessionPhase::DangerZone
        } else {
            SessionPhase::AfterHours
        }
    }

    /// Current time in the market timezone.
    #[must_use]
    pub fn now_market(&self) -> DateTime<FixedOffset> {
        self.frozen_at
            .unwrap_or_else(Utc::now)
            .with_timezone(&self.offset)
    }

    /// Market-local time for an arbitrary UTC instant.
    #[must_use]
    pub fn to_market(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }

    #[must_use]
    pub fn phase_now(&self) -> SessionPhase {
        self.phase_at(self.now_market().time())
    }

    /// Whether a new trade may be entered in the given phase.
    #[must_use]
    pub fn entry_gate(&self, phase: SessionPhase) -> EntryGate {
        match phase {
            SessionPhase::PrimeTime | SessionPhase::MidSession => EntryGate::Allowed,
            SessionPhase::LunchDoldrums => EntryGate::AllowedLowLiquidity,
            SessionPhase::PreMarket | SessionPhase::DangerZone | SessionPhase::AfterHours => {
                EntryGate::Closed
            }
        }
    }

    /// Minutes until market close, clamped to zero after close.
    #[must_use]
    pub fn minutes_to_close(&self, time: NaiveTime) -> i64 {
        let delta = self.policy.market_close.signed_duration_since(time);
        delta.num_minutes().max(0)
    }

    /// Calendar date in the market timezone; the ledger rolls over
    /// when this changes between ticks.
    #[must_use]
    pub fn trading_day(&self) -> NaiveDate {
        self.now_market().date_naive()
    }

    #[must_use]
    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }
}
