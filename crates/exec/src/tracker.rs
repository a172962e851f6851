//! Background position tracker.
//!
//! One task, one tick loop. Each tick: roll the ledger on a new
//! trading day, poll submitted orders for fills, refresh open position
//! marks, confirm exits, fold freshly closed positions into the daily
//! ledger, and force-close everything still open once the danger zone
//! starts. It is the only writer of the ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use zero_dte_core::config::AppConfig;
use zero_dte_core::session::{SessionClock, SessionPhase};

use crate::gateway::{ExecutionGateway, GatewayStatus, MarketData};
use crate::ledger::DailyRiskLedger;
use crate::lock_or_recover;
use crate::manager::OrderManager;
use crate::order::CloseReason;

/// Out-of-band conditions the operator must see even without a UI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAlert {
    /// The daily loss limit was crossed; no new orders until rollover.
    DailyHalt { realized_pnl: Decimal },
    /// A danger-zone forced close could not be submitted after
    /// exhausting retries. The position is still open at the broker.
    ForcedCloseFailed { position_id: Uuid, attempts: u32 },
}

impl std::fmt::Display for EngineAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DailyHalt { realized_pnl } => {
                write!(f, "daily loss limit hit (realized {realized_pnl}), trading halted")
            }
            Self::ForcedCloseFailed {
                position_id,
                attempts,
            } => write!(
                f,
                "forced close of position {position_id} failed after {attempts} attempts, manual intervention required"
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub tick: Duration,
    pub price_timeout: Duration,
    pub close_retry: Duration,
    pub close_retry_max: u32,
    pub auto_exit_enabled: bool,
}

impl TrackerSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            tick: Duration::from_secs(config.tracker.tick_secs),
            price_timeout: Duration::from_secs(config.tracker.price_timeout_secs),
            close_retry: Duration::from_secs(config.tracker.close_retry_secs),
            close_retry_max: config.tracker.close_retry_max,
            auto_exit_enabled: config.trading.auto_exit_enabled,
        }
    }
}

pub struct PositionTracker {
    manager: Arc<OrderManager>,
    gateway: Arc<dyn ExecutionGateway>,
    market: Arc<dyn MarketData>,
    ledger: Arc<Mutex<DailyRiskLedger>>,
    clock: SessionClock,
    settings: TrackerSettings,
    alerts: mpsc::Sender<EngineAlert>,
    /// Forced-close attempts per position, so the retry ceiling and the
    /// escalation fire once per position, not once per tick.
    close_attempts: HashMap<Uuid, u32>,
}

impl PositionTracker {
    #[must_use]
    pub fn new(
        manager: Arc<OrderManager>,
        gateway: Arc<dyn ExecutionGateway>,
        market: Arc<dyn MarketData>,
        ledger: Arc<Mutex<DailyRiskLedger>>,
        clock: SessionClock,
        settings: TrackerSettings,
        alerts: mpsc::Sender<EngineAlert>,
    ) -> Self {
        Self {
            manager,
            gateway,
            market,
            ledger,
            clock,
            settings,
            alerts,
            close_attempts: HashMap::new(),
        }
    }

    /// Run the tick loop until `shutdown` flips true.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.settings.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(tick_secs = self.settings.tick.as_secs(), "Position tracker started");
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Position tracker stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One supervision pass. Public so tests can drive the tracker
    /// deterministically without the interval.
    pub async fn tick(&mut self) {
        self.roll_ledger_day();
        self.poll_submitted_orders().await;
        self.refresh_marks().await;
        self.confirm_exits().await;
        self.record_closes().await;
        if self.clock.phase_now() == SessionPhase::DangerZone && self.settings.auto_exit_enabled {
            self.force_close_open_positions().await;
        }
    }

    /// A new market-timezone calendar date resets the ledger, clearing
    /// any halt from the previous day.
    fn roll_ledger_day(&mut self) {
        let today = self.clock.trading_day();
        let mut ledger = lock_or_recover(&self.ledger);
        if ledger.trading_day() != today {
            info!(%today, "New trading day, resetting daily risk ledger");
            ledger.roll_over(today);
            self.close_attempts.clear();
        }
    }

    async fn poll_submitted_orders(&self) {
        for order in self.manager.submitted_orders() {
            let Some(gateway_id) = order.gateway_id.clone() else {
                // Submission still in flight; pick it up next tick.
                continue;
            };
            let status = tokio::time::timeout(
                self.settings.price_timeout,
                self.gateway.query_status(&gateway_id),
            )
            .await;
            match status {
                Ok(Ok(GatewayStatus::Filled { price })) => {
                    if let Err(e) = self.manager.on_gateway_fill(order.id, price) {
                        warn!(order_id = %order.id, error = %e, "Fill could not be recorded");
                    }
                }
                Ok(Ok(GatewayStatus::Working)) => {}
                Ok(Ok(GatewayStatus::Cancelled)) => {
                    warn!(order_id = %order.id, "Gateway reports order cancelled out of band");
                }
                Ok(Err(e)) => {
                    warn!(order_id = %order.id, error = %e, "Status query failed, re-checking next tick");
                }
                Err(_) => {
                    warn!(order_id = %order.id, "Status query timed out, re-checking next tick");
                }
            }
        }
    }

    /// Refresh marks for open positions. A missed quote is logged and
    /// skipped; the position keeps its previous mark.
    async fn refresh_marks(&self) {
        for position in self.manager.open_positions() {
            let quote = tokio::time::timeout(
                self.settings.price_timeout,
                self.market.option_quote(&position.code),
            )
            .await;
            match quote {
                Ok(Ok(quote)) => {
                    if let Err(e) = self.manager.mark_position(position.id, quote.price) {
                        warn!(position_id = %position.id, error = %e, "Mark update failed");
                    }
                }
                Ok(Err(e)) => {
                    debug!(position_id = %position.id, code = %position.code, error = %e, "No quote, re-checking next tick");
                }
                Err(_) => {
                    debug!(position_id = %position.id, code = %position.code, "Quote timed out, re-checking next tick");
                }
            }
        }
    }

    /// Confirm exit fills for positions in Closing.
    async fn confirm_exits(&self) {
        for position in self.manager.closing_positions() {
            let Some(gateway_id) = position.exit_gateway_id.clone() else {
                continue;
            };
            let status = tokio::time::timeout(
                self.settings.price_timeout,
                self.gateway.query_status(&gateway_id),
            )
            .await;
            match status {
                Ok(Ok(GatewayStatus::Filled { price })) => {
                    if let Err(e) = self.manager.mark_closed(position.id, price) {
                        warn!(position_id = %position.id, error = %e, "Exit confirmation failed");
                    }
                }
                Ok(Ok(GatewayStatus::Working)) => {}
                Ok(Ok(GatewayStatus::Cancelled)) => {
                    warn!(position_id = %position.id, "Exit order cancelled at gateway, position stuck in closing");
                }
                Ok(Err(e)) => {
                    warn!(position_id = %position.id, error = %e, "Exit status query failed");
                }
                Err(_) => {
                    warn!(position_id = %position.id, "Exit status query timed out");
                }
            }
        }
    }

    /// Fold newly closed positions into the daily ledger. Single
    /// writer: only this method calls `record_close`.
    async fn record_closes(&self) {
        for position in self.manager.drain_unrecorded_closes() {
            let Some(pnl) = position.realized_pnl() else {
                continue;
            };
            let newly_halted = {
                let mut ledger = lock_or_recover(&self.ledger);
                ledger.record_close(pnl)
            };
            info!(position_id = %position.id, %pnl, "Close recorded in daily ledger");
            if newly_halted {
                let realized_pnl = lock_or_recover(&self.ledger).realized_pnl();
                warn!(%realized_pnl, "Daily loss limit hit, trading halted for the day");
                self.send_alert(EngineAlert::DailyHalt { realized_pnl }).await;
            }
        }
    }

    /// Danger zone: force-close every open position at market, with a
    /// bounded retry loop per position. Exhaustion escalates once.
    async fn force_close_open_positions(&mut self) {
        for position in self.manager.open_positions() {
            let attempts = self.close_attempts.entry(position.id).or_insert(0);
            if *attempts > self.settings.close_retry_max {
                continue;
            }
            warn!(position_id = %position.id, code = %position.code, "Danger zone, force-closing position");
            let mut closed = false;
            while *attempts <= self.settings.close_retry_max {
                *attempts += 1;
                match self
                    .manager
                    .request_close(position.id, CloseReason::DangerZone)
                    .await
                {
                    Ok(()) => {
                        closed = true;
                        break;
                    }
                    Err(e) => {
                        warn!(
                            position_id = %position.id,
                            attempt = *attempts,
                            error = %e,
                            "Forced close attempt failed"
                        );
                        if *attempts <= self.settings.close_retry_max {
                            tokio::time::sleep(self.settings.close_retry).await;
                        }
                    }
                }
            }
            if !closed {
                let attempts = *attempts;
                error!(
                    position_id = %position.id,
                    attempts,
                    "Forced close exhausted retries, position remains open"
                );
                self.send_alert(EngineAlert::ForcedCloseFailed {
                    position_id: position.id,
                    attempts,
                })
                .await;
                // Past the ceiling now, so later ticks skip this
                // position instead of re-escalating.
            }
        }
    }

    async fn send_alert(&self, alert: EngineAlert) {
        if self.alerts.send(alert.clone()).await.is_err() {
            error!(%alert, "Alert channel closed, dropping alert");
        }
    }
}
