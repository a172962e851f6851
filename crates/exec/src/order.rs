//! Order and position entities with explicit state machines.
//!
//! States are tagged enums; transitions happen only inside the order
//! manager's critical sections. Terminal orders and closed positions
//! are retained for the session's reporting window, never purged
//! intraday.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use zero_dte_core::suggestion::TradeSuggestion;
use zero_dte_suggest::risk::CONTRACT_MULTIPLIER;

use crate::gateway::{ExecutionMode, OrderTicket, TicketKind, TicketSide};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    PendingApproval,
    Submitted,
    Filled,
    Rejected,
    Cancelled,
}

impl OrderState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Rejected | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingApproval => write!(f, "pending_approval"),
            Self::Submitted => write!(f, "submitted"),
            Self::Filled => write!(f, "filled"),
            Self::Rejected => write!(f, "rejected"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Entry order derived from exactly one suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub suggestion: TradeSuggestion,
    pub quantity: u32,
    pub limit_price: Decimal,
    pub state: OrderState,
    /// Why the order left the happy path, when it did.
    pub state_reason: Option<String>,
    pub gateway_id: Option<String>,
    pub fill_price: Option<Decimal>,
    /// Operator asked to cancel while the submission was in flight.
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn from_suggestion(suggestion: TradeSuggestion, now: DateTime<Utc>) -> Self {
        let quantity = suggestion.quantity;
        let limit_price = suggestion.entry_price;
        Self {
            id: Uuid::new_v4(),
            suggestion,
            quantity,
            limit_price,
            state: OrderState::PendingApproval,
            state_reason: None,
            gateway_id: None,
            fill_price: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Key identifying the instrument-leg set; at most one non-terminal
    /// order may exist per key.
    #[must_use]
    pub fn proposal_key(&self) -> String {
        self.suggestion.proposal_key()
    }

    /// Gateway instruction for this entry order.
    #[must_use]
    pub fn ticket(&self, mode: ExecutionMode) -> OrderTicket {
        OrderTicket {
            order_id: self.id,
            ticker: self.suggestion.signal.ticker.clone(),
            code: self
                .suggestion
                .legs
                .first()
                .map(|l| l.code.clone())
                .unwrap_or_default(),
            side: TicketSide::Buy,
            quantity: self.quantity,
            kind: TicketKind::Limit {
                price: self.limit_price,
            },
            mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Open,
    Closing,
    Closed,
}

impl std::fmt::Display for PositionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Reason a close was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Operator close-at-market.
    Manual,
    /// Mandatory danger-zone exit, unconditional of P&L.
    DangerZone,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::DangerZone => write!(f, "danger_zone"),
        }
    }
}

/// Live holding created when its entry order fills. Exactly one per
/// filled order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub order_id: Uuid,
    pub ticker: String,
    pub code: String,
    pub quantity: u32,
    pub entry_price: Decimal,
    pub target_price: Decimal,
    pub stop_price: Decimal,
    pub state: PositionState,
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub exit_gateway_id: Option<String>,
    pub close_reason: Option<CloseReason>,
    pub exit_price: Option<Decimal>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Set once the tracker has folded the realized P&L into the
    /// daily ledger; keeps ledger recording exactly-once.
    pub ledger_recorded: bool,
}

impl Position {
    #[must_use]
    pub fn from_fill(order: &Order, fill_price: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            ticker: order.suggestion.signal.ticker.clone(),
            code: order
                .suggestion
                .legs
                .first()
                .map(|l| l.code.clone())
                .unwrap_or_default(),
            quantity: order.quantity,
            entry_price: fill_price,
            target_price: order.suggestion.target_price,
            stop_price: order.suggestion.stop_loss,
            state: PositionState::Open,
            mark_price: fill_price,
            unrealized_pnl: Decimal::ZERO,
            opened_at: now,
            exit_gateway_id: None,
            close_reason: None,
            exit_price: None,
            closed_at: None,
            ledger_recorded: false,
        }
    }

    /// Recompute unrealized P&L from a fresh mark.
    pub fn mark(&mut self, price: Decimal) {
        self.mark_price = price;
        self.unrealized_pnl =
            (price - self.entry_price) * Decimal::from(self.quantity) * multiplier();
    }

    /// Realized P&L, defined only once closed.
    #[must_use]
    pub fn realized_pnl(&self) -> Option<Decimal> {
        self.exit_price
            .map(|exit| (exit - self.entry_price) * Decimal::from(self.quantity) * multiplier())
    }

    /// Exit instruction: close the full size at market.
    #[must_use]
    pub fn exit_ticket(&self, mode: ExecutionMode) -> OrderTicket {
        OrderTicket {
            order_id: self.order_id,
            ticker: self.ticker.clone(),
            code: self.code.clone(),
            side: TicketSide::Sell,
            quantity: self.quantity,
            kind: TicketKind::Market,
            mode,
        }
    }
}

fn multiplier() -> Decimal {
    Decimal::from(CONTRACT_MULTIPLIER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::sample_suggestion;
    use rust_decimal_macros::dec;

    #[test]
    fn new_order_is_pending_approval() {
        let order = Order::from_suggestion(sample_suggestion(), Utc::now());
        assert_eq!(order.state, OrderState::PendingApproval);
        assert!(!order.state.is_terminal());
        assert_eq!(order.quantity, 2);
        assert_eq!(order.limit_price, dec!(2.50));
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(OrderState::Filled.is_terminal());
        assert!(OrderState::Rejected.is_terminal());
        assert!(OrderState::Cancelled.is_terminal());
        assert!(!OrderState::PendingApproval.is_terminal());
        assert!(!OrderState::Submitted.is_terminal());
    }

    #[test]
    fn position_pnl_uses_contract_multiplier() {
        let order = Order::from_suggestion(sample_suggestion(), Utc::now());
        let mut position = Position::from_fill(&order, dec!(2.50), Utc::now());
        assert_eq!(position.unrealized_pnl, dec!(0));

        position.mark(dec!(3.00));
        // (3.00 - 2.50) * 2 contracts * 100 = 100
        assert_eq!(position.unrealized_pnl, dec!(100));

        position.exit_price = Some(dec!(2.00));
        assert_eq!(position.realized_pnl(), Some(dec!(-100)));
    }

    #[test]
    fn exit_ticket_sells_full_size_at_market() {
        let order = Order::from_suggestion(sample_suggestion(), Utc::now());
        let position = Position::from_fill(&order, dec!(2.50), Utc::now());
        let ticket = position.exit_ticket(ExecutionMode::Paper);
        assert_eq!(ticket.side, TicketSide::Sell);
        assert_eq!(ticket.quantity, 2);
        assert!(matches!(ticket.kind, TicketKind::Market));
    }
}
