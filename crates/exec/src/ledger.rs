//! Daily risk ledger: realized P&L for the current trading day and the
//! loss-limit halt gate.
//!
//! One ledger per running process. Written only by the position
//! tracker; the order manager reads the halt flag before authorizing
//! new orders.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug)]
pub struct DailyRiskLedger {
    trading_day: NaiveDate,
    realized_pnl: Decimal,
    wins: u32,
    losses: u32,
    /// Positive dollar amount; halt once realized P&L <= -loss_limit.
    loss_limit: Decimal,
    halted: bool,
}

/// Snapshot for the operator's daily summary.
#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub trading_day: NaiveDate,
    pub realized_pnl: Decimal,
    pub wins: u32,
    pub losses: u32,
    pub halted: bool,
}

impl DailyRiskLedger {
    #[must_use]
    pub fn new(trading_day: NaiveDate, loss_limit: Decimal) -> Self {
        Self {
            trading_day,
            realized_pnl: Decimal::ZERO,
            wins: 0,
            losses: 0,
            loss_limit,
            halted: false,
        }
    }

    #[must_use]
    pub fn trading_day(&self) -> NaiveDate {
        self.trading_day
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    #[must_use]
    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Fold one closed position's realized P&L into the day. Returns
    /// true when this close tripped the halt.
    pub fn record_close(&mut self, pnl: Decimal) -> bool {
        self.realized_pnl += pnl;
        if pnl > Decimal::ZERO {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        info!(pnl = %pnl, daily_pnl = %self.realized_pnl, "Recorded closed position");

        if !self.halted && self.realized_pnl <= -self.loss_limit {
            self.halted = true;
            warn!(
                daily_pnl = %self.realized_pnl,
                loss_limit = %self.loss_limit,
                "Daily loss limit breached - halting new orders"
            );
            return true;
        }
        false
    }

    /// Reset for a new trading day. Un-halts.
    pub fn roll_over(&mut self, trading_day: NaiveDate) {
        info!(%trading_day, "Daily risk ledger reset");
        self.trading_day = trading_day;
        self.realized_pnl = Decimal::ZERO;
        self.wins = 0;
        self.losses = 0;
        self.halted = false;
    }

    #[must_use]
    pub fn summary(&self) -> DailySummary {
        DailySummary {
            trading_day: self.trading_day,
            realized_pnl: self.realized_pnl,
            wins: self.wins,
            losses: self.losses,
            halted: self.halted,
        }
    }
}
