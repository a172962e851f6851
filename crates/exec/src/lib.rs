//! Order lifecycle, position supervision, and signal intake for the
//! 0DTE engine.

pub mod gateway;
pub mod ledger;
pub mod manager;
pub mod order;
pub mod paper;
pub mod processor;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testutil;

pub use gateway::{CancelOutcome, ExecutionGateway, ExecutionMode, GatewayStatus, MarketData, OrderTicket};
pub use ledger::{DailyRiskLedger, DailySummary};
pub use manager::{ManagerSettings, OrderManager};
pub use order::{CloseReason, Order, OrderState, Position, PositionState};
pub use paper::{PaperGateway, PaperMarketData};
pub use processor::{ProcessOutcome, SignalProcessor};
pub use tracker::{EngineAlert, PositionTracker, TrackerSettings};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Acquire a std mutex, recovering the guard if a panicking holder
/// poisoned it.
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
