//! Order manager: owns the order/position book and every state
//! transition in it.
//!
//! Concurrency discipline: one mutex over the whole book. Every read
//! that informs a transition and the transition's write happen inside
//! a single critical section, and the lock is never held across an
//! `.await`; gateway calls run between two short critical sections
//! with the state reserved in the first.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use zero_dte_core::config::AppConfig;
use zero_dte_core::error::{EngineError, Result};
use zero_dte_core::session::{SessionClock, SessionPhase};
use zero_dte_core::suggestion::TradeSuggestion;

use crate::gateway::{CancelOutcome, ExecutionGateway, ExecutionMode, OrderTicket};
use crate::ledger::{DailyRiskLedger, DailySummary};
use crate::lock_or_recover;
use crate::order::{CloseReason, Order, OrderState, Position, PositionState};

/// Delay between submit retries for a new order.
const SUBMIT_RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub max_positions: usize,
    pub auto_execute: bool,
    pub submit_timeout: Duration,
    pub submit_max_retries: u32,
    pub mode: ExecutionMode,
}

impl ManagerSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            max_positions: config.account.max_positions,
            auto_execute: config.trading.auto_execute,
            submit_timeout: Duration::from_secs(config.gateway.submit_timeout_secs),
            submit_max_retries: config.gateway.submit_max_retries,
            mode: config.gateway.mode.parse()?,
        })
    }
}

/// What to do with a freshly created order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    AwaitApproval,
    AutoSubmit,
}

#[derive(Default)]
struct Book {
    orders: HashMap<Uuid, Order>,
    positions: HashMap<Uuid, Position>,
}

impl Book {
    /// Non-terminal orders plus open/closing positions: the quantity
    /// the concurrency cap bounds.
    fn open_exposure(&self) -> usize {
        let live_orders = self
            .orders
            .values()
            .filter(|o| !o.state.is_terminal())
            .count();
        let live_positions = self
            .positions
            .values()
            .filter(|p| p.state != PositionState::Closed)
            .count();
        live_orders + live_positions
    }

    fn has_live_proposal(&self, key: &str) -> bool {
        self.orders
            .values()
            .any(|o| !o.state.is_terminal() && o.proposal_key() == key)
    }
}

pub struct OrderManager {
    book: Mutex<Book>,
    ledger: Arc<Mutex<DailyRiskLedger>>,
    clock: SessionClock,
    gateway: Arc<dyn ExecutionGateway>,
    settings: ManagerSettings,
}

impl OrderManager {
    #[must_use]
    pub fn new(
        settings: ManagerSettings,
        clock: SessionClock,
        gateway: Arc<dyn ExecutionGateway>,
        ledger: Arc<Mutex<DailyRiskLedger>>,
    ) -> Self {
        Self {
            book: Mutex::new(Book::default()),
            ledger,
            clock,
            gateway,
            settings,
        }
    }

    fn decide(&self, _order: &Order) -> Disposition {
        if self.settings.auto_execute {
            Disposition::AutoSubmit
        } else {
            Disposition::AwaitApproval
        }
    }

    /// Create an order from a suggestion.
    ///
    /// Session gate, halt flag, concurrency cap, and the one-live-order-
    /// per-proposal invariant are all enforced here; the cap check and
    /// the insert share one critical section so concurrent creates can
    /// never jointly exceed the cap.
    pub async fn create(&self, suggestion: TradeSuggestion) -> Result<Order> {
        let phase = self.clock.phase_now();
        if !self.clock.entry_gate(phase).is_allowed() {
            return Err(EngineError::session_closed(phase));
        }

        {
            let ledger = lock_or_recover(&self.ledger);
            if ledger.is_halted() {
                return Err(EngineError::RiskHalted {
                    daily_pnl: ledger.realized_pnl().to_string(),
                });
            }
        }

        let order = {
            let mut book = lock_or_recover(&self.book);
            let exposure = book.open_exposure();
            if exposure >= self.settings.max_positions {
                return Err(EngineError::LimitExceeded {
                    current: exposure,
                    max: self.settings.max_positions,
                });
            }
            let key = suggestion.proposal_key();
            if book.has_live_proposal(&key) {
                return Err(EngineError::DuplicateProposal { proposal_key: key });
            }
            let order = Order::from_suggestion(suggestion, Utc::now());
            book.orders.insert(order.id, order.clone());
            order
        };

        info!(
            order_id = %order.id,
            code = order
                .suggestion
                .legs
                .first()
                .map(|l| l.code.as_str())
                .unwrap_or("?"),
            quantity = order.quantity,
            limit = %order.limit_price,
            "Order created, pending approval"
        );

        match self.decide(&order) {
            Disposition::AwaitApproval => Ok(order),
            Disposition::AutoSubmit => self.approve(order.id).await,
        }
    }

    /// Approve a pending order and submit it to the gateway.
    ///
    /// The state moves to Submitted before the gateway call so a
    /// concurrent reject sees the order already gone from
    /// PendingApproval. Exhausted submit retries fail the order to
    /// Cancelled with the reason recorded.
    pub async fn approve(&self, order_id: Uuid) -> Result<Order> {
        let ticket = {
            let mut book = lock_or_recover(&self.book);
            let order = book
                .orders
                .get_mut(&order_id)
                .ok_or(EngineError::NotFound { id: order_id })?;
            if order.state != OrderState::PendingApproval {
                return Err(EngineError::invalid_state(
                    order_id,
                    "pending_approval",
                    order.state,
                ));
            }
            order.state = OrderState::Submitted;
            order.updated_at = Utc::now();
            order.ticket(self.settings.mode)
        };

        info!(order_id = %order_id, "Order approved, submitting");

        match self.submit_with_retries(&ticket).await {
            Ok(gateway_id) => {
                let (order, cancel_requested) = {
                    let mut book = lock_or_recover(&self.book);
                    let order = book
                        .orders
                        .get_mut(&order_id)
                        .ok_or(EngineError::NotFound { id: order_id })?;
                    order.gateway_id = Some(gateway_id.clone());
                    order.updated_at = Utc::now();
                    (order.clone(), order.cancel_requested)
                };
                info!(order_id = %order_id, gateway_id, "Order submitted");
                if cancel_requested {
                    // Operator cancelled while the submission was in
                    // flight; honor it now that we have a gateway id.
                    return self.cancel(order_id).await;
                }
                Ok(order)
            }
            Err(e) => {
                let mut book = lock_or_recover(&self.book);
                if let Some(order) = book.orders.get_mut(&order_id) {
                    order.state = OrderState::Cancelled;
                    order.state_reason = Some(format!("submission failed: {e}"));
                    order.updated_at = Utc::now();
                }
                error!(order_id = %order_id, error = %e, "Submission failed, order cancelled");
                Err(e)
            }
        }
    }

    async fn submit_with_retries(&self, ticket: &OrderTicket) -> Result<String> {
        let attempts = self.settings.submit_max_retries.saturating_add(1);
        let mut last_err = EngineError::gateway("submit not attempted");
        for attempt in 1..=attempts {
            match tokio::time::timeout(self.settings.submit_timeout, self.gateway.submit(ticket))
                .await
            {
                Ok(Ok(gateway_id)) => return Ok(gateway_id),
                Ok(Err(e)) if e.is_retryable() && attempt < attempts => {
                    warn!(order_id = %ticket.order_id, attempt, error = %e, "Submit failed, retrying");
                    last_err = e;
                    tokio::time::sleep(SUBMIT_RETRY_DELAY).await;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    last_err = EngineError::timeout("gateway submit");
                    if attempt < attempts {
                        warn!(order_id = %ticket.order_id, attempt, "Submit timed out, retrying");
                        tokio::time::sleep(SUBMIT_RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(last_err)
    }

    /// Reject a pending order. Valid only from PendingApproval.
    pub fn reject(&self, order_id: Uuid, reason: &str) -> Result<Order> {
        let mut book = lock_or_recover(&self.book);
        let order = book
            .orders
            .get_mut(&order_id)
            .ok_or(EngineError::NotFound { id: order_id })?;
        if order.state != OrderState::PendingApproval {
            return Err(EngineError::invalid_state(
                order_id,
                "pending_approval",
                order.state,
            ));
        }
        order.state = OrderState::Rejected;
        order.state_reason = Some(reason.to_string());
        order.updated_at = Utc::now();
        info!(order_id = %order_id, reason, "Order rejected");
        Ok(order.clone())
    }

    /// Best-effort cancel. A fill that races the cancel wins: the
    /// order ends Filled with its position created and the cancel
    /// fails with `AlreadyFilled`.
    pub async fn cancel(&self, order_id: Uuid) -> Result<Order> {
        enum Plan {
            Done(Order),
            Deferred(Order),
            CallGateway(String),
        }

        let plan = {
            let mut book = lock_or_recover(&self.book);
            let order = book
                .orders
                .get_mut(&order_id)
                .ok_or(EngineError::NotFound { id: order_id })?;
            match order.state {
                OrderState::PendingApproval => {
                    order.state = OrderState::Cancelled;
                    order.state_reason = Some("cancelled before submission".to_string());
                    order.updated_at = Utc::now();
                    Plan::Done(order.clone())
                }
                OrderState::Submitted => match order.gateway_id.clone() {
                    Some(gateway_id) => Plan::CallGateway(gateway_id),
                    None => {
                        // Submission in flight; approve() honors the
                        // request once the gateway id arrives.
                        order.cancel_requested = true;
                        Plan::Deferred(order.clone())
                    }
                },
                OrderState::Filled => return Err(EngineError::AlreadyFilled { id: order_id }),
                other => {
                    return Err(EngineError::invalid_state(
                        order_id,
                        "pending_approval or submitted",
                        other,
                    ))
                }
            }
        };

        match plan {
            Plan::Done(order) => {
                info!(order_id = %order_id, "Order cancelled");
                Ok(order)
            }
            Plan::Deferred(order) => {
                info!(order_id = %order_id, "Cancel requested while submission in flight");
                Ok(order)
            }
            Plan::CallGateway(gateway_id) => {
                let outcome = tokio::time::timeout(
                    self.settings.submit_timeout,
                    self.gateway.cancel(&gateway_id),
                )
                .await
                .map_err(|_| EngineError::timeout("gateway cancel"))??;

                match outcome {
                    CancelOutcome::Cancelled => {
                        let mut book = lock_or_recover(&self.book);
                        let order = book
                            .orders
                            .get_mut(&order_id)
                            .ok_or(EngineError::NotFound { id: order_id })?;
                        if order.state == OrderState::Submitted {
                            order.state = OrderState::Cancelled;
                            order.state_reason = Some("cancelled in flight".to_string());
                            order.updated_at = Utc::now();
                        }
                        info!(order_id = %order_id, "Order cancelled at gateway");
                        Ok(order.clone())
                    }
                    CancelOutcome::AlreadyFilled { fill_price } => {
                        warn!(order_id = %order_id, %fill_price, "Cancel lost the race to a fill");
                        self.on_gateway_fill(order_id, fill_price)?;
                        Err(EngineError::AlreadyFilled { id: order_id })
                    }
                }
            }
        }
    }

    /// Record a gateway fill. Valid only from Submitted; the order's
    /// transition to Filled and the position creation happen in the
    /// same critical section, so no observable state has one without
    /// the other. Re-delivery of the same fill is a no-op.
    pub fn on_gateway_fill(&self, order_id: Uuid, fill_price: Decimal) -> Result<Option<Position>> {
        let mut guard = lock_or_recover(&self.book);
        let Book { orders, positions } = &mut *guard;
        let order = orders
            .get_mut(&order_id)
            .ok_or(EngineError::NotFound { id: order_id })?;

        match order.state {
            OrderState::Filled if order.fill_price == Some(fill_price) => Ok(None),
            OrderState::Submitted => {
                let now = Utc::now();
                order.state = OrderState::Filled;
                order.fill_price = Some(fill_price);
                order.updated_at = now;
                let position = Position::from_fill(order, fill_price, now);
                positions.insert(position.id, position.clone());
                info!(
                    order_id = %order_id,
                    position_id = %position.id,
                    %fill_price,
                    quantity = position.quantity,
                    "Order filled, position opened"
                );
                Ok(Some(position))
            }
            other => Err(EngineError::invalid_state(order_id, "submitted", other)),
        }
    }

    /// Request a close-at-market for an open position.
    ///
    /// Open -> Closing with the exit order submitted; Closed follows on
    /// gateway confirmation (see `mark_closed`). Calling again while
    /// Closing is a no-op, which keeps tracker ticks idempotent. A
    /// failed submit reverts the position to Open so it can be retried.
    pub async fn request_close(&self, position_id: Uuid, reason: CloseReason) -> Result<()> {
        let ticket = {
            let mut book = lock_or_recover(&self.book);
            let position = book
                .positions
                .get_mut(&position_id)
                .ok_or(EngineError::NotFound { id: position_id })?;
            match position.state {
                PositionState::Open => {
                    position.state = PositionState::Closing;
                    position.close_reason = Some(reason);
                    position.exit_ticket(self.settings.mode)
                }
                PositionState::Closing => return Ok(()),
                PositionState::Closed => {
                    return Err(EngineError::invalid_state(position_id, "open", "closed"))
                }
            }
        };

        info!(position_id = %position_id, %reason, "Closing position at market");

        match tokio::time::timeout(self.settings.submit_timeout, self.gateway.submit(&ticket))
            .await
            .map_err(|_| EngineError::timeout("gateway submit"))
            .and_then(|r| r)
        {
            Ok(gateway_id) => {
                let mut book = lock_or_recover(&self.book);
                if let Some(position) = book.positions.get_mut(&position_id) {
                    position.exit_gateway_id = Some(gateway_id);
                }
                Ok(())
            }
            Err(e) => {
                let mut book = lock_or_recover(&self.book);
                if let Some(position) = book.positions.get_mut(&position_id) {
                    if position.state == PositionState::Closing {
                        position.state = PositionState::Open;
                    }
                }
                error!(position_id = %position_id, error = %e, "Exit order submission failed");
                Err(e)
            }
        }
    }

    /// Confirm the exit fill: Closing -> Closed with realized P&L.
    pub fn mark_closed(&self, position_id: Uuid, exit_price: Decimal) -> Result<Position> {
        let mut book = lock_or_recover(&self.book);
        let position = book
            .positions
            .get_mut(&position_id)
            .ok_or(EngineError::NotFound { id: position_id })?;
        if position.state != PositionState::Closing {
            return Err(EngineError::invalid_state(
                position_id,
                "closing",
                position.state,
            ));
        }
        position.state = PositionState::Closed;
        position.exit_price = Some(exit_price);
        position.closed_at = Some(Utc::now());
        let pnl = position.realized_pnl().unwrap_or(Decimal::ZERO);
        info!(position_id = %position_id, %exit_price, %pnl, "Position closed");
        Ok(position.clone())
    }

    /// Refresh a position's mark price and unrealized P&L.
    pub fn mark_position(&self, position_id: Uuid, price: Decimal) -> Result<()> {
        let mut book = lock_or_recover(&self.book);
        let position = book
            .positions
            .get_mut(&position_id)
            .ok_or(EngineError::NotFound { id: position_id })?;
        position.mark(price);
        Ok(())
    }

    /// Closed positions not yet folded into the daily ledger. Marks
    /// them recorded, so each close is returned exactly once.
    pub fn drain_unrecorded_closes(&self) -> Vec<Position> {
        let mut book = lock_or_recover(&self.book);
        book.positions
            .values_mut()
            .filter(|p| p.state == PositionState::Closed && !p.ledger_recorded)
            .map(|p| {
                p.ledger_recorded = true;
                p.clone()
            })
            .collect()
    }

    // --- operator read surface ---

    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        let book = lock_or_recover(&self.book);
        let mut orders: Vec<Order> = book.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }

    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        let book = lock_or_recover(&self.book);
        let mut positions: Vec<Position> = book.positions.values().cloned().collect();
        positions.sort_by_key(|p| p.opened_at);
        positions
    }

    #[must_use]
    pub fn pending_approval(&self) -> Vec<Order> {
        self.orders()
            .into_iter()
            .filter(|o| o.state == OrderState::PendingApproval)
            .collect()
    }

    #[must_use]
    pub fn submitted_orders(&self) -> Vec<Order> {
        self.orders()
            .into_iter()
            .filter(|o| o.state == OrderState::Submitted)
            .collect()
    }

    #[must_use]
    pub fn open_positions(&self) -> Vec<Position> {
        self.positions()
            .into_iter()
            .filter(|p| p.state == PositionState::Open)
            .collect()
    }

    #[must_use]
    pub fn closing_positions(&self) -> Vec<Position> {
        self.positions()
            .into_iter()
            .filter(|p| p.state == PositionState::Closing)
            .collect()
    }

    pub fn get_order(&self, order_id: Uuid) -> Result<Order> {
        let book = lock_or_recover(&self.book);
        book.orders
            .get(&order_id)
            .cloned()
            .ok_or(EngineError::NotFound { id: order_id })
    }

    pub fn get_position(&self, position_id: Uuid) -> Result<Position> {
        let book = lock_or_recover(&self.book);
        book.positions
            .get(&position_id)
            .cloned()
            .ok_or(EngineError::NotFound { id: position_id })
    }

    #[must_use]
    pub fn open_exposure(&self) -> usize {
        lock_or_recover(&self.book).open_exposure()
    }

    #[must_use]
    pub fn session_phase(&self) -> SessionPhase {
        self.clock.phase_now()
    }

    #[must_use]
    pub fn daily_summary(&self) -> DailySummary {
        lock_or_recover(&self.ledger).summary()
    }

    #[must_use]
    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::PaperGateway;
    use crate::testutil::suggestion_for_leg;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use zero_dte_core::session::SessionPolicy;

    fn prime_time_clock() -> SessionClock {
        // 15:15 UTC at UTC-5 is 10:15 local, prime time.
        let at = chrono::Utc.with_ymd_and_hms(2026, 8, 28, 15, 15, 0).unwrap();
        SessionClock::new(
            SessionPolicy::default(),
            chrono::FixedOffset::west_opt(5 * 3600).unwrap(),
        )
        .frozen_at(at)
    }

    fn danger_zone_clock() -> SessionClock {
        // 20:45 UTC at UTC-5 is 15:45 local, danger zone.
        let at = chrono::Utc.with_ymd_and_hms(2026, 8, 28, 20, 45, 0).unwrap();
        SessionClock::new(
            SessionPolicy::default(),
            chrono::FixedOffset::west_opt(5 * 3600).unwrap(),
        )
        .frozen_at(at)
    }

    fn settings(max_positions: usize) -> ManagerSettings {
        ManagerSettings {
            max_positions,
            auto_execute: false,
            submit_timeout: Duration::from_secs(2),
            submit_max_retries: 0,
            mode: ExecutionMode::Paper,
        }
    }

    fn ledger() -> Arc<Mutex<DailyRiskLedger>> {
        Arc::new(Mutex::new(DailyRiskLedger::new(
            NaiveDate::from_ymd_opt(2026, 8, 28).unwrap(),
            dec!(1500),
        )))
    }

    fn manager_with(
        max_positions: usize,
        clock: SessionClock,
        gateway: Arc<PaperGateway>,
    ) -> Arc<OrderManager> {
        Arc::new(OrderManager::new(
            settings(max_positions),
            clock,
            gateway,
            ledger(),
        ))
    }

    #[tokio::test]
    async fn create_approve_fill_opens_a_position() {
        let gateway = Arc::new(PaperGateway::new());
        let manager = manager_with(2, prime_time_clock(), gateway);

        let order = manager.create(suggestion_for_leg("LEG-A")).await.unwrap();
        assert_eq!(order.state, OrderState::PendingApproval);

        let order = manager.approve(order.id).await.unwrap();
        assert_eq!(order.state, OrderState::Submitted);
        assert!(order.gateway_id.is_some());

        let position = manager
            .on_gateway_fill(order.id, dec!(2.50))
            .unwrap()
            .expect("position created");
        assert_eq!(position.entry_price, dec!(2.50));
        assert_eq!(manager.get_order(order.id).unwrap().state, OrderState::Filled);
        assert_eq!(manager.open_positions().len(), 1);
    }

    #[tokio::test]
    async fn create_is_rejected_in_the_danger_zone() {
        let gateway = Arc::new(PaperGateway::new());
        let manager = manager_with(2, danger_zone_clock(), gateway);
        let err = manager
            .create(suggestion_for_leg("LEG-A"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SessionClosed { .. }));
        assert!(manager.orders().is_empty());
    }

    #[tokio::test]
    async fn create_is_rejected_when_halted() {
        let gateway = Arc::new(PaperGateway::new());
        let ledger = ledger();
        lock_or_recover(&ledger).record_close(dec!(-2000));
        let manager = OrderManager::new(settings(2), prime_time_clock(), gateway, ledger);
        let err = manager
            .create(suggestion_for_leg("LEG-A"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RiskHalted { .. }));
    }

    #[tokio::test]
    async fn concurrency_cap_counts_orders_and_positions() {
        let gateway = Arc::new(PaperGateway::new());
        let manager = manager_with(2, prime_time_clock(), gateway);

        manager.create(suggestion_for_leg("LEG-A")).await.unwrap();
        manager.create(suggestion_for_leg("LEG-B")).await.unwrap();

        let err = manager
            .create(suggestion_for_leg("LEG-C"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::LimitExceeded { current: 2, max: 2 }
        ));
    }

    #[tokio::test]
    async fn concurrent_creates_never_exceed_the_cap() {
        let gateway = Arc::new(PaperGateway::new());
        let manager = manager_with(2, prime_time_clock(), gateway);

        let mut tasks = Vec::new();
        for i in 0..8 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                manager.create(suggestion_for_leg(&format!("LEG-{i}"))).await
            }));
        }

        let mut ok = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 2);
        assert!(manager.open_exposure() <= 2);
    }

    #[tokio::test]
    async fn duplicate_live_proposal_is_rejected() {
        let gateway = Arc::new(PaperGateway::new());
        let manager = manager_with(4, prime_time_clock(), gateway);

        manager.create(suggestion_for_leg("LEG-A")).await.unwrap();
        let err = manager
            .create(suggestion_for_leg("LEG-A"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateProposal { .. }));
    }

    #[tokio::test]
    async fn approve_and_reject_race_resolves_to_one_winner() {
        for _ in 0..20 {
            let gateway = Arc::new(PaperGateway::new());
            let manager = manager_with(2, prime_time_clock(), gateway);
            let order = manager.create(suggestion_for_leg("LEG-A")).await.unwrap();

            let approver = {
                let manager = Arc::clone(&manager);
                let id = order.id;
                tokio::spawn(async move { manager.approve(id).await })
            };
            let rejecter = {
                let manager = Arc::clone(&manager);
                let id = order.id;
                tokio::spawn(async move { manager.reject(id, "operator rejected") })
            };

            let approved = approver.await.unwrap();
            let rejected = rejecter.await.unwrap();
            assert!(
                approved.is_ok() ^ rejected.is_ok(),
                "exactly one transition must win"
            );
            let final_state = manager.get_order(order.id).unwrap().state;
            assert!(
                final_state == OrderState::Submitted || final_state == OrderState::Rejected
            );
        }
    }

    #[tokio::test]
    async fn fill_is_idempotent_for_the_same_price() {
        let gateway = Arc::new(PaperGateway::new());
        let manager = manager_with(2, prime_time_clock(), gateway);
        let order = manager.create(suggestion_for_leg("LEG-A")).await.unwrap();
        manager.approve(order.id).await.unwrap();

        let first = manager.on_gateway_fill(order.id, dec!(2.50)).unwrap();
        assert!(first.is_some());
        let second = manager.on_gateway_fill(order.id, dec!(2.50)).unwrap();
        assert!(second.is_none());
        assert_eq!(manager.positions().len(), 1);
    }

    #[tokio::test]
    async fn fill_from_pending_is_a_state_conflict() {
        let gateway = Arc::new(PaperGateway::new());
        let manager = manager_with(2, prime_time_clock(), gateway);
        let order = manager.create(suggestion_for_leg("LEG-A")).await.unwrap();
        let err = manager.on_gateway_fill(order.id, dec!(2.50)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn cancel_pending_order_is_terminal() {
        let gateway = Arc::new(PaperGateway::new());
        let manager = manager_with(2, prime_time_clock(), gateway);
        let order = manager.create(suggestion_for_leg("LEG-A")).await.unwrap();
        let cancelled = manager.cancel(order.id).await.unwrap();
        assert_eq!(cancelled.state, OrderState::Cancelled);
        // The slot is freed.
        assert_eq!(manager.open_exposure(), 0);
    }

    #[tokio::test]
    async fn cancel_after_gateway_fill_reports_already_filled() {
        // Auto-fill gateway: the order fills the moment it is accepted,
        // so the later cancel must lose the race.
        let gateway = Arc::new(PaperGateway::new());
        let manager = manager_with(2, prime_time_clock(), Arc::clone(&gateway));
        let order = manager.create(suggestion_for_leg("LEG-A")).await.unwrap();
        manager.approve(order.id).await.unwrap();

        let err = manager.cancel(order.id).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyFilled { .. }));
        assert_eq!(manager.get_order(order.id).unwrap().state, OrderState::Filled);
        assert_eq!(manager.positions().len(), 1);
    }

    #[tokio::test]
    async fn cancel_working_order_succeeds() {
        let gateway = Arc::new(PaperGateway::manual());
        let manager = manager_with(2, prime_time_clock(), gateway);
        let order = manager.create(suggestion_for_leg("LEG-A")).await.unwrap();
        manager.approve(order.id).await.unwrap();

        let cancelled = manager.cancel(order.id).await.unwrap();
        assert_eq!(cancelled.state, OrderState::Cancelled);
    }

    #[tokio::test]
    async fn exhausted_submit_retries_cancel_the_order() {
        let gateway = Arc::new(PaperGateway::new());
        gateway.inject_submit_failures(5);
        let manager = manager_with(2, prime_time_clock(), Arc::clone(&gateway));
        let order = manager.create(suggestion_for_leg("LEG-A")).await.unwrap();

        let err = manager.approve(order.id).await.unwrap_err();
        assert!(err.is_retryable());
        let order = manager.get_order(order.id).unwrap();
        assert_eq!(order.state, OrderState::Cancelled);
        assert!(order.state_reason.unwrap().contains("submission failed"));
    }

    #[tokio::test]
    async fn close_lifecycle_reaches_closed_with_pnl() {
        let gateway = Arc::new(PaperGateway::new());
        gateway.set_price("LEG-A", dec!(3.00));
        let manager = manager_with(2, prime_time_clock(), Arc::clone(&gateway));
        let order = manager.create(suggestion_for_leg("LEG-A")).await.unwrap();
        manager.approve(order.id).await.unwrap();
        let position = manager
            .on_gateway_fill(order.id, dec!(2.50))
            .unwrap()
            .unwrap();

        manager
            .request_close(position.id, CloseReason::Manual)
            .await
            .unwrap();
        assert_eq!(manager.closing_positions().len(), 1);
        // Second request while closing is a no-op.
        manager
            .request_close(position.id, CloseReason::Manual)
            .await
            .unwrap();

        let closed = manager.mark_closed(position.id, dec!(3.00)).unwrap();
        // (3.00 - 2.50) * 2 * 100
        assert_eq!(closed.realized_pnl(), Some(dec!(100)));
        assert_eq!(manager.open_exposure(), 0);

        let drained = manager.drain_unrecorded_closes();
        assert_eq!(drained.len(), 1);
        assert!(manager.drain_unrecorded_closes().is_empty());
    }

    #[tokio::test]
    async fn auto_execute_submits_on_create() {
        let gateway = Arc::new(PaperGateway::new());
        let mut s = settings(2);
        s.auto_execute = true;
        let manager = OrderManager::new(s, prime_time_clock(), gateway, ledger());
        let order = manager.create(suggestion_for_leg("LEG-A")).await.unwrap();
        assert_eq!(order.state, OrderState::Submitted);
        assert!(order.gateway_id.is_some());
    }
}
